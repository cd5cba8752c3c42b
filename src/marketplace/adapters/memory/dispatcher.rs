//! Dispatcher that records deliveries instead of sending them.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::marketplace::ports::{
    NotificationDelivery, NotificationDispatchError, NotificationDispatcher,
};

/// Records every delivery it is asked to make.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    deliveries: Arc<Mutex<Vec<NotificationDelivery>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingDispatcher {
    /// Creates a dispatcher that accepts every delivery.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent deliveries fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the deliveries accepted so far.
    #[must_use]
    pub fn deliveries(&self) -> Vec<NotificationDelivery> {
        self.deliveries
            .lock()
            .map(|recorded| recorded.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn trigger(
        &self,
        delivery: &NotificationDelivery,
    ) -> Result<(), NotificationDispatchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationDispatchError::Transport(
                "recording dispatcher set to fail".to_owned(),
            ));
        }
        self.deliveries
            .lock()
            .map_err(|err| NotificationDispatchError::Transport(err.to_string()))?
            .push(delivery.clone());
        Ok(())
    }
}
