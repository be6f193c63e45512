mod broadcast;

pub use broadcast::BroadcastTransport;

use crate::domain::{Value, WidgetId};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Delivers device updates to individual widgets. Delivery is fire-and-forget: at most once
/// per call, no acknowledgement, never blocks the caller.
pub trait NotificationTransport: Debug + Send + Sync {
    fn notify(&self, notification: WidgetNotification);
}

/// Payload of a `widget:{widgetId}:deviceUpdate` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    pub device_id: String,
    pub capability: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetNotification {
    pub widget_id: WidgetId,
    pub update: DeviceUpdate,
}

impl WidgetNotification {
    pub fn device_update(widget_id: impl Into<WidgetId>, device_id: impl Into<String>, capability: impl Into<String>, value: Value) -> Self {
        WidgetNotification {
            widget_id: widget_id.into(),
            update: DeviceUpdate {
                device_id: device_id.into(),
                capability: capability.into(),
                value,
            },
        }
    }

    pub fn event_name(&self) -> String {
        format!("widget:{}:deviceUpdate", self.widget_id)
    }

    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.update)
    }
}

#[cfg(test)]
pub use recording::RecordingTransport;
