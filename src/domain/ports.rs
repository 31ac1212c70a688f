use std::collections::HashMap;

use async_trait::async_trait;

use super::enrichment::{CustomerProfile, ProductSummary};
use super::errors::DomainError;
use super::events::OrderEvent;
use super::identity::Principal;
use super::order::{Order, OrderPage, OrderStatus, PlacedOrder, QueryFilter, StatusChange};

/// Relational source of truth for orders.
#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    async fn search(&self, filter: &QueryFilter) -> Result<OrderPage, DomainError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, DomainError>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Order>, DomainError>;
    async fn create(&self, order: PlacedOrder) -> Result<i64, DomainError>;
    /// Validate `current -> target` against the status graph and persist it in
    /// one step. Invalid moves fail with `InvalidTransition` and change nothing.
    async fn update_status(
        &self,
        id: i64,
        target: OrderStatus,
        remarks: Option<String>,
    ) -> Result<StatusChange, DomainError>;
}

/// Eventually-consistent full-text index over orders.
#[async_trait]
pub trait OrderSearchIndex: Send + Sync + 'static {
    async fn search(&self, filter: &QueryFilter) -> Result<OrderPage, DomainError>;
}

/// Write side of the search index, driven by the index workers.
#[async_trait]
pub trait OrderIndexWriter: Send + Sync + 'static {
    /// Store the full order document under its id, replacing any earlier copy.
    async fn upsert(&self, order: &Order) -> Result<(), DomainError>;
    async fn patch_status(&self, order_id: i64, status: OrderStatus) -> Result<(), DomainError>;
    /// Removing a document that is already gone succeeds.
    async fn delete(&self, order_id: i64) -> Result<(), DomainError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn get_profile(
        &self,
        buyer_id: i64,
        caller: &Principal,
    ) -> Result<CustomerProfile, DomainError>;

    async fn get_profiles(
        &self,
        buyer_ids: &[i64],
        caller: &Principal,
    ) -> Result<HashMap<i64, CustomerProfile>, DomainError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync + 'static {
    async fn get_product(
        &self,
        product_id: i64,
        caller: &Principal,
    ) -> Result<ProductSummary, DomainError>;

    async fn get_products(
        &self,
        product_ids: &[i64],
        caller: &Principal,
    ) -> Result<HashMap<i64, ProductSummary>, DomainError>;
}

/// Delivers one event to the broker and reports the outcome.
#[async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    async fn publish(&self, event: &OrderEvent) -> Result<(), DomainError>;
}

/// Hands an event off for background delivery. Must return without waiting
/// for the publish to happen; failures are never reported back to the caller.
pub trait EventDispatcher: Send + Sync + 'static {
    fn dispatch(&self, event: OrderEvent);
}
