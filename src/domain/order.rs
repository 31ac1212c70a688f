use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;

/// Flat fee charged when an order is shipped by courier.
pub const DELIVERY_FEE: i64 = 5000;
pub const DELIVERY_SHIPPING_TYPE: &str = "Delivery";

// ── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// States reachable in one step from `self`. Terminal states have none.
    pub fn next_states(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Completed],
            OrderStatus::Completed | OrderStatus::Cancelled => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.next_states().contains(&target)
    }

    pub fn ensure_transition(&self, target: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(target) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition(format!(
                "{} -> {}",
                self, target
            )))
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::InvalidTransition(format!(
                "unknown status '{}'",
                other
            ))),
        }
    }
}

// ── Order ────────────────────────────────────────────────────────────────────

/// Buyer display fields, filled in by enrichment only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuyerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Product display fields, filled in by enrichment only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub image: String,
    pub unit_price: i64,
    pub weight: i64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub product: ProductDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_code: String,
    pub status: OrderStatus,
    pub buyer_id: i64,
    pub order_date: NaiveDate,
    #[serde(default)]
    pub order_time: String,
    pub total_amount: BigDecimal,
    #[serde(default)]
    pub shipping_type: String,
    pub shipping_fee: BigDecimal,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub buyer: BuyerDetails,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
}

/// An order as requested by a buyer, before a code and fee are assigned.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub buyer_id: i64,
    pub order_date: NaiveDate,
    pub order_time: String,
    pub total_amount: BigDecimal,
    pub shipping_type: String,
    pub payment_method: Option<String>,
    pub remarks: Option<String>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.items.is_empty() {
            return Err(DomainError::InvalidInput(
                "an order needs at least one item".to_string(),
            ));
        }
        if let Some(item) = self.items.iter().find(|i| i.quantity <= 0) {
            return Err(DomainError::InvalidInput(format!(
                "quantity for product {} must be positive",
                item.product_id
            )));
        }
        Ok(())
    }

    pub fn shipping_fee(&self) -> BigDecimal {
        if self.shipping_type == DELIVERY_SHIPPING_TYPE {
            BigDecimal::from(DELIVERY_FEE)
        } else {
            BigDecimal::from(0)
        }
    }
}

/// Row ready to be inserted: the new order plus everything the service assigns.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_code: String,
    pub status: OrderStatus,
    pub shipping_fee: BigDecimal,
    pub order: NewOrder,
}

impl PlacedOrder {
    pub fn place(order: NewOrder, today: NaiveDate) -> Self {
        Self {
            order_code: generate_order_code(today),
            status: OrderStatus::Pending,
            shipping_fee: order.shipping_fee(),
            order,
        }
    }
}

/// `ORD-<yyyymmdd>-<8 upper-case hex chars>`.
pub fn generate_order_code(today: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase();
    format!("ORD-{}-{}", today.format("%Y%m%d"), suffix)
}

/// What the store hands back after persisting a status change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub order_id: i64,
    pub order_code: String,
    pub buyer_id: i64,
    pub previous: OrderStatus,
    pub current: OrderStatus,
}

// ── Query filter ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    OrderDate,
    Id,
    OrderCode,
    Status,
    TotalAmount,
}

impl SortField {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "id" => SortField::Id,
            "order_code" => SortField::OrderCode,
            "status" => SortField::Status,
            "total_amount" => SortField::TotalAmount,
            _ => SortField::OrderDate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::OrderDate => "order_date",
            SortField::Id => "id",
            SortField::OrderCode => "order_code",
            SortField::Status => "status",
            SortField::TotalAmount => "total_amount",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Per-request listing criteria. Always normalized: `page` is >= 1 and
/// `per_page` lies in `1..=MAX_PER_PAGE`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub search: String,
    pub status: String,
    pub buyer_id: Option<i64>,
    pub page: i64,
    pub per_page: i64,
    pub order_by: SortField,
    pub order_type: SortDirection,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: String::new(),
            buyer_id: None,
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            order_by: SortField::default(),
            order_type: SortDirection::default(),
        }
    }
}

impl QueryFilter {
    /// Build a filter from raw request values, resetting anything out of range
    /// to its default instead of rejecting it.
    pub fn normalized(
        search: Option<String>,
        status: Option<String>,
        page: Option<i64>,
        per_page: Option<i64>,
        order_by: Option<&str>,
        order_type: Option<&str>,
    ) -> Self {
        Self {
            search: search.map(|s| s.trim().to_string()).unwrap_or_default(),
            status: status.map(|s| s.trim().to_string()).unwrap_or_default(),
            buyer_id: None,
            page: page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE),
            per_page: per_page
                .filter(|p| *p > 0)
                .map(|p| p.min(MAX_PER_PAGE))
                .unwrap_or(DEFAULT_PER_PAGE),
            order_by: order_by.map(SortField::parse).unwrap_or_default(),
            order_type: order_type.map(SortDirection::parse).unwrap_or_default(),
        }
    }

    /// Restrict to one buyer. Zero means unrestricted.
    pub fn for_buyer(mut self, buyer_id: i64) -> Self {
        self.buyer_id = (buyer_id != 0).then_some(buyer_id);
        self
    }

    pub fn unscoped(mut self) -> Self {
        self.buyer_id = None;
        self
    }

    /// Rows to skip. Saturates for page numbers past any real result set.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.per_page.max(0))
    }

    pub fn total_pages(&self, total_count: i64) -> i64 {
        let per_page = self.per_page.max(1);
        if total_count <= 0 {
            0
        } else {
            total_count / per_page + i64::from(total_count % per_page != 0)
        }
    }
}

/// One page of orders plus the counts needed for pagination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total_count: i64,
    pub total_pages: i64,
}

impl OrderPage {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
