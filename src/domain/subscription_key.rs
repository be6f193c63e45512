use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub type WidgetId = String;

/// A (device, capability) pair widgets subscribe to. Equality is exact on both parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionKey {
    pub device_id: String,
    pub capability: String,
}

impl SubscriptionKey {
    pub fn new(device_id: impl Into<String>, capability: impl Into<String>) -> Self {
        SubscriptionKey {
            device_id: device_id.into(),
            capability: capability.into(),
        }
    }
}

impl Display for SubscriptionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device_id, self.capability)
    }
}
