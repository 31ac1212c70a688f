use serde_json::{json, Value};

use super::errors::DomainError;
use super::order::{Order, OrderStatus};

pub const NOTIFICATION_SUBJECT: &str = "Update Status Order";
pub const NOTIFICATION_TYPE: &str = "UPDATE_STATUS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Push,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "EMAIL",
            Channel::Push => "PUSH",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub channel: Channel,
    pub receiver_id: i64,
    /// Empty for push notifications.
    pub receiver_email: String,
    pub message: String,
}

/// Everything the order service publishes to the broker.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    OrderCreated(Box<Order>),
    StockDecrement { product_id: i64, quantity: i64 },
    Notify(Notification),
    IndexStatusPatch { order_id: i64, status: OrderStatus },
}

impl OrderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "order_created",
            OrderEvent::StockDecrement { .. } => "stock_decrement",
            OrderEvent::Notify(n) => match n.channel {
                Channel::Email => "email_notification",
                Channel::Push => "push_notification",
            },
            OrderEvent::IndexStatusPatch { .. } => "index_status_patch",
        }
    }

    /// JSON body placed on the queue.
    pub fn payload(&self) -> Result<Value, DomainError> {
        let body = match self {
            OrderEvent::OrderCreated(order) => serde_json::to_value(order.as_ref()).map_err(|e| {
                DomainError::Internal(format!("failed to encode order {}: {}", order.id, e))
            })?,
            OrderEvent::StockDecrement {
                product_id,
                quantity,
            } => json!({
                "product_id": product_id,
                "quantity": quantity,
            }),
            OrderEvent::Notify(n) => json!({
                "receiver_email": n.receiver_email,
                "message": n.message,
                "subject": NOTIFICATION_SUBJECT,
                "type": NOTIFICATION_TYPE,
                "receiver_id": n.receiver_id,
                "notification_type": n.channel.as_str(),
            }),
            OrderEvent::IndexStatusPatch { order_id, status } => json!({
                "orderID": order_id.to_string(),
                "status": status.as_str(),
            }),
        };
        Ok(body)
    }
}

/// Human-readable text sent to the buyer when their order changes status.
pub fn status_message(order_code: &str, status: OrderStatus) -> String {
    match status {
        OrderStatus::Pending => format!("Your order {} has been received.", order_code),
        OrderStatus::Processing => format!("Your order {} is being processed.", order_code),
        OrderStatus::Shipped => format!("Your order {} has been shipped.", order_code),
        OrderStatus::Completed => format!("Your order {} has been completed.", order_code),
        OrderStatus::Cancelled => format!("Your order {} has been cancelled.", order_code),
    }
}
