//! Notifications Module
//!
//! Broadcasts `records-changed` and `operation-failed` to whoever renders the
//! inventory. Subscribers that lag simply miss older notifications.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::InventoryError;

/// Buffered notifications per subscriber
const CHANNEL_CAPACITY: usize = 64;

/// A notification emitted to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    /// A store transaction committed; the UI should re-query the list
    RecordsChanged,
    /// A UI-triggered operation failed
    OperationFailed { kind: String, message: String },
}

impl Notification {
    /// SSE event name for this notification.
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::RecordsChanged => "records-changed",
            Notification::OperationFailed { .. } => "operation-failed",
        }
    }
}

impl From<&InventoryError> for Notification {
    fn from(err: &InventoryError) -> Self {
        Notification::OperationFailed {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Cloneable sender side of the notification channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Returns a receiver for notifications sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn records_changed(&self) {
        self.send(Notification::RecordsChanged);
    }

    pub fn operation_failed(&self, err: &InventoryError) {
        self.send(Notification::from(err));
    }

    fn send(&self, notification: Notification) {
        // No subscribers is not an error
        if self.tx.send(notification).is_err() {
            debug!("No notification subscribers");
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_records_changed() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.records_changed();

        assert_eq!(rx.recv().await.unwrap(), Notification::RecordsChanged);
    }

    #[tokio::test]
    async fn test_operation_failed_carries_kind() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.operation_failed(&InventoryError::NotFound(42));

        match rx.recv().await.unwrap() {
            Notification::OperationFailed { kind, message } => {
                assert_eq!(kind, "not_found");
                assert!(message.contains("42"));
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[test]
    fn test_send_without_subscribers() {
        let notifier = Notifier::new();
        notifier.records_changed();
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_string(&Notification::RecordsChanged).unwrap();
        assert_eq!(json, r#"{"type":"records-changed"}"#);
    }
}
