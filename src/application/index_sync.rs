use std::sync::Arc;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::errors::DomainError;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::ports::OrderIndexWriter;

/// The three index workers. Each consumes one queue and applies one kind of
/// write to the search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexJob {
    /// Full order document from the order-created queue.
    Upsert,
    /// `{"orderID", "status"}` from the status-patch queue.
    PatchStatus,
    /// `{"orderID"}` from the order-deleted queue.
    Delete,
}

impl IndexJob {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexJob::Upsert => "order",
            IndexJob::PatchStatus => "update-status",
            IndexJob::Delete => "delete-order",
        }
    }
}

/// Order ids travel as strings on the wire; numbers are accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    fn value(&self) -> Result<i64, DomainError> {
        match self {
            WireId::Number(id) => Ok(*id),
            WireId::Text(raw) => raw
                .trim()
                .parse()
                .map_err(|_| DomainError::InvalidInput(format!("orderID '{}' is not a number", raw))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusPatch {
    #[serde(rename = "orderID")]
    order_id: WireId,
    status: String,
}

#[derive(Debug, Deserialize)]
struct OrderRef {
    #[serde(rename = "orderID")]
    order_id: WireId,
}

fn decode<T: DeserializeOwned>(job: IndexJob, body: &[u8]) -> Result<T, DomainError> {
    serde_json::from_slice(body).map_err(|e| {
        DomainError::InvalidInput(format!("malformed {} message: {}", job.as_str(), e))
    })
}

/// Applies broker messages to the search index so it converges on the store.
pub struct IndexSync {
    writer: Arc<dyn OrderIndexWriter>,
}

impl IndexSync {
    pub fn new(writer: Arc<dyn OrderIndexWriter>) -> Self {
        Self { writer }
    }

    /// Decode `body` for `job` and apply it. Messages that cannot be decoded
    /// fail with `InvalidInput` before anything is written.
    pub async fn handle(&self, job: IndexJob, body: &[u8]) -> Result<(), DomainError> {
        debug!("[IndexSync] {} message ({} bytes)", job.as_str(), body.len());
        match job {
            IndexJob::Upsert => {
                let order: Order = decode(job, body)?;
                self.writer.upsert(&order).await?;
                info!("[IndexSync] order {} indexed", order.id);
            }
            IndexJob::PatchStatus => {
                let patch: StatusPatch = decode(job, body)?;
                let order_id = patch.order_id.value()?;
                let status: OrderStatus = patch.status.parse().map_err(|_| {
                    DomainError::InvalidInput(format!("unknown status '{}'", patch.status))
                })?;
                self.writer.patch_status(order_id, status).await?;
                info!("[IndexSync] order {} now {}", order_id, status);
            }
            IndexJob::Delete => {
                let order_id = decode::<OrderRef>(job, body)?.order_id.value()?;
                self.writer.delete(order_id).await?;
                info!("[IndexSync] order {} removed from the index", order_id);
            }
        }
        Ok(())
    }
}
