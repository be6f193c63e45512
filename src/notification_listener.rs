use crate::transport::WidgetNotification;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, instrument, warn};

/// Drains the broadcast transport and logs what each widget is sent. Returns once every sender
/// is gone.
#[instrument(skip_all)]
pub async fn notification_listener(mut rx: Receiver<WidgetNotification>) -> usize {
    let mut delivered = 0;
    loop {
        match rx.recv().await {
            Ok(notification) => {
                delivered += 1;
                match notification.payload_json() {
                    Ok(payload) => info!("📣 {} {}", notification.event_name(), payload),
                    Err(error) => warn!("⚠️ Could not encode {}: {}", notification.event_name(), error),
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!("⚠️ Notification listener fell behind, skipped {} update(s)", skipped),
            Err(RecvError::Closed) => return delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Value;
    use crate::transport::{BroadcastTransport, NotificationTransport};
    use test_log::test;

    #[test(tokio::test)]
    async fn drains_until_the_transport_is_dropped() {
        let transport = BroadcastTransport::new(8);
        let listener = tokio::spawn(notification_listener(transport.subscribe()));

        transport.notify(WidgetNotification::device_update("w1", "lamp", "onoff", Value::Boolean(true)));
        transport.notify(WidgetNotification::device_update("w2", "lamp", "onoff", Value::Boolean(true)));
        drop(transport);

        assert_eq!(listener.await.unwrap(), 2);
    }

    #[test(tokio::test)]
    async fn keeps_going_after_lagging() {
        let transport = BroadcastTransport::new(1);
        let rx = transport.subscribe();

        for level in [0.1, 0.2, 0.3] {
            transport.notify(WidgetNotification::device_update("w1", "lamp", "dim", Value::Number(level)));
        }
        drop(transport);

        assert_eq!(notification_listener(rx).await, 1);
    }
}
