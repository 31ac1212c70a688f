use std::sync::Arc;

use log::{info, warn};

use crate::domain::errors::DomainError;
use crate::domain::events::{status_message, Channel, Notification, OrderEvent};
use crate::domain::identity::Principal;
use crate::domain::order::{OrderStatus, StatusChange};
use crate::domain::ports::{EventDispatcher, OrderRepository, UserDirectory};

/// Persists an order status change, then hands three notifications to the
/// dispatcher: buyer email, buyer push, search-index patch.
///
/// A successful return only certifies the store write. Delivery of the
/// notifications is best-effort and never reported back.
pub struct StatusWorkflow {
    store: Arc<dyn OrderRepository>,
    users: Arc<dyn UserDirectory>,
    dispatcher: Arc<dyn EventDispatcher>,
}

impl StatusWorkflow {
    pub fn new(
        store: Arc<dyn OrderRepository>,
        users: Arc<dyn UserDirectory>,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Self {
        Self {
            store,
            users,
            dispatcher,
        }
    }

    pub async fn update_status(
        &self,
        order_id: i64,
        target: OrderStatus,
        remarks: Option<String>,
        caller: &Principal,
    ) -> Result<StatusChange, DomainError> {
        let change = self.store.update_status(order_id, target, remarks).await?;
        info!(
            "order {} ({}) moved {} -> {}",
            change.order_id, change.order_code, change.previous, change.current
        );

        let message = status_message(&change.order_code, change.current);

        // The write above is committed; a failed profile lookup only costs the email.
        match self.users.get_profile(change.buyer_id, caller).await {
            Ok(profile) => self.dispatcher.dispatch(OrderEvent::Notify(Notification {
                channel: Channel::Email,
                receiver_id: change.buyer_id,
                receiver_email: profile.email,
                message: message.clone(),
            })),
            Err(e) => warn!(
                "skipping email for order {}: buyer {} profile lookup failed: {}",
                change.order_id, change.buyer_id, e
            ),
        }

        self.dispatcher.dispatch(OrderEvent::Notify(Notification {
            channel: Channel::Push,
            receiver_id: change.buyer_id,
            receiver_email: String::new(),
            message,
        }));
        self.dispatcher.dispatch(OrderEvent::IndexStatusPatch {
            order_id: change.order_id,
            status: change.current,
        });

        Ok(change)
    }
}
