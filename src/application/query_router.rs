use std::sync::Arc;

use log::{error, warn};

use crate::domain::errors::DomainError;
use crate::domain::order::{OrderPage, QueryFilter};
use crate::domain::ports::{OrderRepository, OrderSearchIndex};

/// Serves listing queries from the search index, falling back to the store
/// only when the index call itself fails. An empty index answer is final.
pub struct QueryRouter {
    index: Arc<dyn OrderSearchIndex>,
    store: Arc<dyn OrderRepository>,
}

impl QueryRouter {
    pub fn new(index: Arc<dyn OrderSearchIndex>, store: Arc<dyn OrderRepository>) -> Self {
        Self { index, store }
    }

    /// Admin listing across all buyers.
    pub async fn search_all(&self, filter: QueryFilter) -> Result<OrderPage, DomainError> {
        self.search(filter.unscoped()).await
    }

    /// Customer listing restricted to one buyer.
    pub async fn search_for_buyer(
        &self,
        buyer_id: i64,
        filter: QueryFilter,
    ) -> Result<OrderPage, DomainError> {
        self.search(filter.for_buyer(buyer_id)).await
    }

    async fn search(&self, filter: QueryFilter) -> Result<OrderPage, DomainError> {
        match self.index.search(&filter).await {
            Ok(page) => Ok(page),
            Err(e) => {
                warn!(
                    "order search index failed ({}), falling back to the store (buyer={:?}, page={})",
                    e, filter.buyer_id, filter.page
                );
                self.store.search(&filter).await.map_err(|e| {
                    error!("order store search failed after index fallback: {}", e);
                    DomainError::Internal(format!("order lookup failed: {}", e))
                })
            }
        }
    }
}
