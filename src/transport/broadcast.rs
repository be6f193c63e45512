use crate::transport::{NotificationTransport, WidgetNotification};
use tokio::sync::broadcast;
use tracing::trace;

/// Publishes widget notifications on a bounded broadcast channel.
///
/// Slow receivers lose the oldest notifications rather than blocking the publisher; with no
/// receiver at all notifications are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastTransport {
    sender: broadcast::Sender<WidgetNotification>,
}

impl BroadcastTransport {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        BroadcastTransport { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetNotification> {
        self.sender.subscribe()
    }
}

impl NotificationTransport for BroadcastTransport {
    fn notify(&self, notification: WidgetNotification) {
        let event = notification.event_name();
        if self.sender.send(notification).is_err() {
            trace!(event, "No receivers, dropped notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Value;
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn delivers_to_every_receiver() {
        let transport = BroadcastTransport::new(8);
        let mut rx1 = transport.subscribe();
        let mut rx2 = transport.subscribe();
        let notification = WidgetNotification::device_update("w1", "devA", "onoff", Value::Boolean(true));

        transport.notify(notification.clone());

        assert_eq!(rx1.recv().await.unwrap(), notification);
        assert_eq!(rx2.recv().await.unwrap(), notification);
    }

    #[test]
    fn notify_without_receivers_does_not_fail() {
        let transport = BroadcastTransport::new(8);

        transport.notify(WidgetNotification::device_update("w1", "devA", "onoff", Value::Boolean(true)));
    }

    #[tokio::test]
    async fn slow_receivers_lag_instead_of_blocking() {
        let transport = BroadcastTransport::new(1);
        let mut rx = transport.subscribe();

        transport.notify(WidgetNotification::device_update("w1", "devA", "onoff", Value::Boolean(true)));
        transport.notify(WidgetNotification::device_update("w1", "devA", "onoff", Value::Boolean(false)));

        assert_eq!(rx.recv().await, Err(RecvError::Lagged(1)));
        assert_eq!(rx.recv().await.unwrap().update.value, Value::Boolean(false));
    }
}
