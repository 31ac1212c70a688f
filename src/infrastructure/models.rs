use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use crate::domain::errors::DomainError;
use crate::domain::order::{Order, OrderItem, OrderStatus, PlacedOrder};
use crate::schema::{order_items, orders};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: i64,
    pub order_code: String,
    pub buyer_id: i64,
    pub order_date: NaiveDate,
    pub order_time: String,
    pub status: String,
    pub total_amount: BigDecimal,
    pub shipping_type: String,
    pub shipping_fee: BigDecimal,
    pub payment_method: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    /// Rows carry the status as text; anything unparsable is a data error.
    pub fn into_order(self, items: Vec<OrderItemRow>) -> Result<Order, DomainError> {
        let status: OrderStatus = self.status.parse().map_err(|_| {
            DomainError::Internal(format!(
                "order {} has unknown status '{}'",
                self.id, self.status
            ))
        })?;
        Ok(Order {
            id: self.id,
            order_code: self.order_code,
            status,
            buyer_id: self.buyer_id,
            order_date: self.order_date,
            order_time: self.order_time,
            total_amount: self.total_amount,
            shipping_type: self.shipping_type,
            shipping_fee: self.shipping_fee,
            payment_method: self.payment_method,
            remarks: self.remarks,
            created_at: self.created_at,
            buyer: Default::default(),
            items: items.into_iter().map(OrderItem::from).collect(),
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub order_code: String,
    pub buyer_id: i64,
    pub order_date: NaiveDate,
    pub order_time: String,
    pub status: String,
    pub total_amount: BigDecimal,
    pub shipping_type: String,
    pub shipping_fee: BigDecimal,
    pub payment_method: Option<String>,
    pub remarks: Option<String>,
}

impl From<&PlacedOrder> for NewOrderRow {
    fn from(placed: &PlacedOrder) -> Self {
        Self {
            order_code: placed.order_code.clone(),
            buyer_id: placed.order.buyer_id,
            order_date: placed.order.order_date,
            order_time: placed.order.order_time.clone(),
            status: placed.status.as_str().to_string(),
            total_amount: placed.order.total_amount.clone(),
            shipping_type: placed.order.shipping_type.clone(),
            shipping_fee: placed.shipping_fee.clone(),
            payment_method: placed.order.payment_method.clone(),
            remarks: placed.order.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            product: Default::default(),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItemRow {
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
}
