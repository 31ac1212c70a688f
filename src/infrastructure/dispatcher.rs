use std::sync::Arc;

use log::{debug, error};

use crate::domain::events::OrderEvent;
use crate::domain::ports::{EventDispatcher, EventPublisher};

/// Publishes each event on its own tokio task so the request that produced
/// it never waits on the broker. Delivery failures are logged and dropped.
pub struct BackgroundDispatcher {
    publisher: Arc<dyn EventPublisher>,
}

impl BackgroundDispatcher {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }
}

impl EventDispatcher for BackgroundDispatcher {
    fn dispatch(&self, event: OrderEvent) {
        let publisher = Arc::clone(&self.publisher);
        tokio::spawn(async move {
            match publisher.publish(&event).await {
                Ok(()) => debug!("[Dispatcher] published {}", event.name()),
                Err(e) => error!("[Dispatcher] failed to publish {}: {}", event.name(), e),
            }
        });
    }
}
