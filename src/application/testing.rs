//! In-memory port implementations shared by the application tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};

use crate::domain::enrichment::{CustomerProfile, ProductSummary};
use crate::domain::errors::DomainError;
use crate::domain::events::OrderEvent;
use crate::domain::identity::{Principal, Role};
use crate::domain::order::{
    BuyerDetails, Order, OrderItem, OrderPage, OrderStatus, PlacedOrder, ProductDetails,
    QueryFilter, StatusChange,
};
use crate::domain::ports::{
    EventDispatcher, EventPublisher, OrderIndexWriter, OrderRepository, OrderSearchIndex,
    ProductCatalog, UserDirectory,
};

pub fn admin() -> Principal {
    Principal {
        user_id: 1,
        role: Role::Admin,
        token: "admin-token".to_string(),
    }
}

pub fn customer(user_id: i64) -> Principal {
    Principal {
        user_id,
        role: Role::Customer,
        token: format!("customer-{}-token", user_id),
    }
}

pub fn sample_order(id: i64, buyer_id: i64, product_ids: &[i64]) -> Order {
    Order {
        id,
        order_code: format!("ORD-TEST-{}", id),
        status: OrderStatus::Pending,
        buyer_id,
        order_date: NaiveDate::from_ymd_opt(2026, 4, 1).expect("valid date"),
        order_time: "12:00".to_string(),
        total_amount: BigDecimal::from(10_000 * id),
        shipping_type: "Pickup".to_string(),
        shipping_fee: BigDecimal::from(0),
        payment_method: None,
        remarks: None,
        created_at: Utc::now(),
        buyer: BuyerDetails::default(),
        items: product_ids
            .iter()
            .enumerate()
            .map(|(n, product_id)| OrderItem {
                id: id * 100 + n as i64,
                product_id: *product_id,
                quantity: 2,
                product: ProductDetails::default(),
            })
            .collect(),
    }
}

fn unavailable(what: &str) -> DomainError {
    DomainError::UpstreamUnavailable(format!("{} is down", what))
}

// ── Store ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeStore {
    orders: Mutex<Vec<Order>>,
    searches: Mutex<Vec<QueryFilter>>,
    fail_search: bool,
    fail_updates: bool,
}

impl FakeStore {
    pub fn with_orders(orders: Vec<Order>) -> Self {
        Self {
            orders: Mutex::new(orders),
            ..Default::default()
        }
    }

    pub fn failing_search() -> Self {
        Self {
            fail_search: true,
            ..Default::default()
        }
    }

    pub fn failing_updates() -> Self {
        Self {
            fail_updates: true,
            ..Default::default()
        }
    }

    pub fn search_calls(&self) -> Vec<QueryFilter> {
        self.searches.lock().expect("lock").clone()
    }

    pub fn order(&self, id: i64) -> Option<Order> {
        self.orders
            .lock()
            .expect("lock")
            .iter()
            .find(|o| o.id == id)
            .cloned()
    }

    pub fn status_of(&self, id: i64) -> Option<OrderStatus> {
        self.order(id).map(|o| o.status)
    }
}

fn matches_filter(order: &Order, filter: &QueryFilter) -> bool {
    let search = filter.search.to_lowercase();
    let search_ok = search.is_empty()
        || order.order_code.to_lowercase().contains(&search)
        || order.status.as_str().to_lowercase().contains(&search);
    let status_ok =
        filter.status.is_empty() || order.status.as_str().eq_ignore_ascii_case(&filter.status);
    let buyer_ok = filter.buyer_id.map_or(true, |b| order.buyer_id == b);
    search_ok && status_ok && buyer_ok
}

#[async_trait]
impl OrderRepository for FakeStore {
    async fn search(&self, filter: &QueryFilter) -> Result<OrderPage, DomainError> {
        self.searches.lock().expect("lock").push(filter.clone());
        if self.fail_search {
            return Err(DomainError::Internal("connection refused".to_string()));
        }
        let matching: Vec<Order> = self
            .orders
            .lock()
            .expect("lock")
            .iter()
            .filter(|o| matches_filter(o, filter))
            .cloned()
            .collect();
        let total_count = matching.len() as i64;
        Ok(OrderPage {
            orders: matching
                .into_iter()
                .skip(filter.offset() as usize)
                .take(filter.per_page as usize)
                .collect(),
            total_count,
            total_pages: filter.total_pages(total_count),
        })
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, DomainError> {
        Ok(self.order(id))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Order>, DomainError> {
        Ok(self
            .orders
            .lock()
            .expect("lock")
            .iter()
            .find(|o| o.order_code == code)
            .cloned())
    }

    async fn create(&self, placed: PlacedOrder) -> Result<i64, DomainError> {
        let mut orders = self.orders.lock().expect("lock");
        let id = orders.iter().map(|o| o.id).max().unwrap_or(0) + 1;
        orders.push(Order {
            id,
            order_code: placed.order_code,
            status: placed.status,
            buyer_id: placed.order.buyer_id,
            order_date: placed.order.order_date,
            order_time: placed.order.order_time,
            total_amount: placed.order.total_amount,
            shipping_type: placed.order.shipping_type,
            shipping_fee: placed.shipping_fee,
            payment_method: placed.order.payment_method,
            remarks: placed.order.remarks,
            created_at: Utc::now(),
            buyer: BuyerDetails::default(),
            items: placed
                .order
                .items
                .iter()
                .enumerate()
                .map(|(n, i)| OrderItem {
                    id: id * 100 + n as i64,
                    product_id: i.product_id,
                    quantity: i.quantity,
                    product: ProductDetails::default(),
                })
                .collect(),
        });
        Ok(id)
    }

    async fn update_status(
        &self,
        id: i64,
        target: OrderStatus,
        remarks: Option<String>,
    ) -> Result<StatusChange, DomainError> {
        if self.fail_updates {
            return Err(DomainError::Internal("connection refused".to_string()));
        }
        let mut orders = self.orders.lock().expect("lock");
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(DomainError::NotFound)?;
        let previous = order.status;
        previous.ensure_transition(target)?;
        order.status = target;
        if remarks.is_some() {
            order.remarks = remarks;
        }
        Ok(StatusChange {
            order_id: id,
            order_code: order.order_code.clone(),
            buyer_id: order.buyer_id,
            previous,
            current: target,
        })
    }
}

// ── Search index ─────────────────────────────────────────────────────────────

pub struct FakeIndex {
    answer: Option<OrderPage>,
    calls: AtomicUsize,
}

impl FakeIndex {
    pub fn answering(page: OrderPage) -> Self {
        Self {
            answer: Some(page),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderSearchIndex for FakeIndex {
    async fn search(&self, _filter: &QueryFilter) -> Result<OrderPage, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .ok_or_else(|| unavailable("search index"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexWrite {
    Upsert(Order),
    Patch(i64, OrderStatus),
    Delete(i64),
}

#[derive(Default)]
pub struct FakeIndexWriter {
    writes: Mutex<Vec<IndexWrite>>,
    fail: bool,
}

impl FakeIndexWriter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<IndexWrite> {
        self.writes.lock().expect("lock").clone()
    }

    fn record(&self, write: IndexWrite) -> Result<(), DomainError> {
        self.writes.lock().expect("lock").push(write);
        if self.fail {
            return Err(unavailable("search index"));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderIndexWriter for FakeIndexWriter {
    async fn upsert(&self, order: &Order) -> Result<(), DomainError> {
        self.record(IndexWrite::Upsert(order.clone()))
    }

    async fn patch_status(&self, order_id: i64, status: OrderStatus) -> Result<(), DomainError> {
        self.record(IndexWrite::Patch(order_id, status))
    }

    async fn delete(&self, order_id: i64) -> Result<(), DomainError> {
        self.record(IndexWrite::Delete(order_id))
    }
}

// ── Downstream services ──────────────────────────────────────────────────────

#[derive(Default)]
struct CallLog {
    bulk: Mutex<Vec<Vec<i64>>>,
    single: AtomicUsize,
    finished: AtomicUsize,
    roles: Mutex<Vec<Role>>,
}

impl CallLog {
    fn record_bulk(&self, ids: &[i64], caller: &Principal) {
        self.bulk.lock().expect("lock").push(ids.to_vec());
        self.roles.lock().expect("lock").push(caller.role);
    }

    fn record_single(&self, caller: &Principal) {
        self.single.fetch_add(1, Ordering::SeqCst);
        self.roles.lock().expect("lock").push(caller.role);
    }

    /// Wait out the configured delay; only calls that survive it count as finished.
    async fn settle(&self, delay: Option<Duration>) {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeUsers {
    profiles: HashMap<i64, CustomerProfile>,
    fail: bool,
    delay: Option<Duration>,
    log: CallLog,
}

impl FakeUsers {
    pub fn with_buyers(ids: &[i64]) -> Self {
        Self {
            profiles: ids
                .iter()
                .map(|id| {
                    (
                        *id,
                        CustomerProfile {
                            id: *id,
                            name: format!("buyer-{}", id),
                            email: format!("buyer-{}@example.com", id),
                            phone: format!("555-{}", id),
                            address: format!("{} Market St", id),
                        },
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn bulk_calls(&self) -> Vec<Vec<i64>> {
        self.log.bulk.lock().expect("lock").clone()
    }

    pub fn single_calls(&self) -> usize {
        self.log.single.load(Ordering::SeqCst)
    }

    pub fn finished_calls(&self) -> usize {
        self.log.finished.load(Ordering::SeqCst)
    }

    pub fn roles(&self) -> Vec<Role> {
        self.log.roles.lock().expect("lock").clone()
    }
}

#[async_trait]
impl UserDirectory for FakeUsers {
    async fn get_profile(
        &self,
        buyer_id: i64,
        caller: &Principal,
    ) -> Result<CustomerProfile, DomainError> {
        self.log.record_single(caller);
        self.log.settle(self.delay).await;
        if self.fail {
            return Err(unavailable("user service"));
        }
        self.profiles
            .get(&buyer_id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn get_profiles(
        &self,
        buyer_ids: &[i64],
        caller: &Principal,
    ) -> Result<HashMap<i64, CustomerProfile>, DomainError> {
        self.log.record_bulk(buyer_ids, caller);
        self.log.settle(self.delay).await;
        if self.fail {
            return Err(unavailable("user service"));
        }
        Ok(buyer_ids
            .iter()
            .filter_map(|id| self.profiles.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}

#[derive(Default)]
pub struct FakeProducts {
    products: HashMap<i64, ProductSummary>,
    fail: bool,
    delay: Option<Duration>,
    log: CallLog,
}

impl FakeProducts {
    pub fn with_products(ids: &[i64]) -> Self {
        Self {
            products: ids
                .iter()
                .map(|id| {
                    (
                        *id,
                        ProductSummary {
                            id: *id,
                            product_name: format!("product-{}", id),
                            product_image: format!("product-{}.png", id),
                            sale_price: id * 1000,
                            weight: 250,
                            unit: "pcs".to_string(),
                        },
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn bulk_calls(&self) -> Vec<Vec<i64>> {
        self.log.bulk.lock().expect("lock").clone()
    }

    pub fn single_calls(&self) -> usize {
        self.log.single.load(Ordering::SeqCst)
    }

    pub fn finished_calls(&self) -> usize {
        self.log.finished.load(Ordering::SeqCst)
    }

    pub fn roles(&self) -> Vec<Role> {
        self.log.roles.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ProductCatalog for FakeProducts {
    async fn get_product(
        &self,
        product_id: i64,
        caller: &Principal,
    ) -> Result<ProductSummary, DomainError> {
        self.log.record_single(caller);
        self.log.settle(self.delay).await;
        if self.fail {
            return Err(unavailable("product catalog"));
        }
        self.products
            .get(&product_id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn get_products(
        &self,
        product_ids: &[i64],
        caller: &Principal,
    ) -> Result<HashMap<i64, ProductSummary>, DomainError> {
        self.log.record_bulk(product_ids, caller);
        self.log.settle(self.delay).await;
        if self.fail {
            return Err(unavailable("product catalog"));
        }
        Ok(product_ids
            .iter()
            .filter_map(|id| self.products.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}

// ── Events ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<OrderEvent>>,
}

impl RecordingDispatcher {
    pub fn events(&self) -> Vec<OrderEvent> {
        self.events.lock().expect("lock").clone()
    }
}

impl EventDispatcher for RecordingDispatcher {
    fn dispatch(&self, event: OrderEvent) {
        self.events.lock().expect("lock").push(event);
    }
}

/// Publisher that takes `delay` to deliver each event.
pub struct SlowPublisher {
    delay: Duration,
    completed: AtomicUsize,
}

impl SlowPublisher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            completed: AtomicUsize::new(0),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for SlowPublisher {
    async fn publish(&self, _event: &OrderEvent) -> Result<(), DomainError> {
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
