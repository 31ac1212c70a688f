use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use deadpool_lapin::Pool;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicConsumeOptions, BasicRejectOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::Consumer;
use log::{error, info, warn};

use super::publisher::broker_pool;
use crate::application::index_sync::{IndexJob, IndexSync};
use crate::config::QueueNames;
use crate::domain::errors::DomainError;

/// Queue each index worker listens on. Upserts and status patches read the
/// queues the order service itself publishes to.
pub fn queue_for(queues: &QueueNames, job: IndexJob) -> &str {
    match job {
        IndexJob::Upsert => &queues.order_created,
        IndexJob::PatchStatus => &queues.index_status_patch,
        IndexJob::Delete => &queues.order_deleted,
    }
}

/// What to tell the broker once a message has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    /// Drop without requeueing; redelivery would fail the same way.
    Reject,
}

impl Settlement {
    /// Malformed messages are rejected. Everything else is acknowledged, index
    /// failures included, so one bad write never blocks the queue.
    pub fn of(outcome: &Result<(), DomainError>) -> Self {
        match outcome {
            Err(DomainError::InvalidInput(_)) => Settlement::Reject,
            _ => Settlement::Ack,
        }
    }
}

/// Long-running RabbitMQ consumer feeding one queue into `IndexSync`.
/// Reconnects with exponential backoff whenever the broker goes away.
pub struct AmqpIndexConsumer {
    pool: Pool,
    queue: String,
    job: IndexJob,
    sync: Arc<IndexSync>,
}

impl AmqpIndexConsumer {
    pub fn new(
        url: &str,
        queue: impl Into<String>,
        job: IndexJob,
        sync: Arc<IndexSync>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            pool: broker_pool(url)?,
            queue: queue.into(),
            job,
            sync,
        })
    }

    fn tag(&self) -> String {
        format!("order-worker-{}", self.job.as_str())
    }

    /// Consume until the process stops.
    pub async fn run(&self) {
        let backoff_builder = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(30))
            .with_jitter();
        let mut backoff = backoff_builder.build();

        loop {
            match self.subscribe().await {
                Ok(mut consumer) => {
                    info!("[Worker:{}] consuming {}", self.job.as_str(), self.queue);
                    backoff = backoff_builder.build();

                    while let Some(delivery) = consumer.next().await {
                        match delivery {
                            Ok(delivery) => self.process(delivery).await,
                            Err(e) => {
                                error!(
                                    "[Worker:{}] delivery error, reconnecting: {}",
                                    self.job.as_str(),
                                    e
                                );
                                break;
                            }
                        }
                    }
                    warn!("[Worker:{}] consumer stream ended", self.job.as_str());
                }
                Err(e) => {
                    error!(
                        "[Worker:{}] failed to subscribe to {}: {}",
                        self.job.as_str(),
                        self.queue,
                        e
                    );
                }
            }

            let delay = backoff.next().unwrap_or(Duration::from_secs(30));
            tokio::time::sleep(delay).await;
        }
    }

    async fn subscribe(&self) -> Result<Consumer, DomainError> {
        let conn = self.pool.get().await?;
        let channel = conn.create_channel().await?;
        channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        let consumer = channel
            .basic_consume(
                &self.queue,
                &self.tag(),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }

    async fn process(&self, delivery: Delivery) {
        let outcome = self.sync.handle(self.job, &delivery.data).await;
        if let Err(e) = &outcome {
            error!("[Worker:{}] {}", self.job.as_str(), e);
        }

        let settled = match Settlement::of(&outcome) {
            Settlement::Ack => delivery.ack(Default::default()).await,
            Settlement::Reject => delivery.reject(BasicRejectOptions { requeue: false }).await,
        };
        if let Err(e) = settled {
            error!("[Worker:{}] failed to settle message: {}", self.job.as_str(), e);
        }
    }
}
