use async_trait::async_trait;
use deadpool_lapin::{Manager, Pool, PoolError};
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, ConnectionProperties};
use log::{debug, info};

use crate::config::QueueNames;
use crate::domain::errors::DomainError;
use crate::domain::events::{Channel, OrderEvent};
use crate::domain::ports::EventPublisher;

impl From<lapin::Error> for DomainError {
    fn from(e: lapin::Error) -> Self {
        DomainError::UpstreamUnavailable(format!("broker: {}", e))
    }
}

impl From<PoolError> for DomainError {
    fn from(e: PoolError) -> Self {
        DomainError::UpstreamUnavailable(format!("broker pool: {}", e))
    }
}

/// Publishes events as persistent JSON messages on durable RabbitMQ queues
/// through the default exchange.
pub struct AmqpPublisher {
    pool: Pool,
    queues: QueueNames,
}

/// Connection pool shared by publishers and consumers. No connection is
/// opened until the first checkout.
pub fn broker_pool(url: &str) -> Result<Pool, DomainError> {
    let manager = Manager::new(url.to_string(), ConnectionProperties::default());
    Pool::builder(manager)
        .max_size(10)
        .build()
        .map_err(|e| DomainError::Internal(format!("failed to create broker pool: {}", e)))
}

impl AmqpPublisher {
    pub fn new(url: &str, queues: QueueNames) -> Result<Self, DomainError> {
        let pool = broker_pool(url)?;
        info!("[Publisher] broker pool ready");
        Ok(Self { pool, queues })
    }

    pub fn queue_for(&self, event: &OrderEvent) -> &str {
        route(&self.queues, event)
    }
}

fn route<'a>(queues: &'a QueueNames, event: &OrderEvent) -> &'a str {
    match event {
        OrderEvent::OrderCreated(_) => &queues.order_created,
        OrderEvent::StockDecrement { .. } => &queues.stock_decrement,
        OrderEvent::Notify(n) => match n.channel {
            Channel::Email => &queues.email_notification,
            Channel::Push => &queues.push_notification,
        },
        OrderEvent::IndexStatusPatch { .. } => &queues.index_status_patch,
    }
}

#[async_trait]
impl EventPublisher for AmqpPublisher {
    async fn publish(&self, event: &OrderEvent) -> Result<(), DomainError> {
        let queue = self.queue_for(event);
        let payload = event.payload()?;
        let body = serde_json::to_vec(&payload)
            .map_err(|e| DomainError::Internal(format!("failed to encode {}: {}", event.name(), e)))?;

        let conn = self.pool.get().await?;
        let channel = conn.create_channel().await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2);

        channel
            .basic_publish("", queue, BasicPublishOptions::default(), &body, properties)
            .await?
            .await?;

        debug!("[Publisher] {} -> {} ({} bytes)", event.name(), queue, body.len());
        Ok(())
    }
}
