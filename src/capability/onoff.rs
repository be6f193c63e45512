use crate::capability::{CapabilityError, CapabilityHandler, CapabilityValue, SetValue};
use crate::directory::DeviceDirectory;
use crate::domain::{CapabilityKind, DeviceTarget, Value};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const ONOFF: &str = "onoff";

#[derive(Debug)]
pub struct OnOffHandler {
    directory: Arc<dyn DeviceDirectory>,
}

impl OnOffHandler {
    pub fn new(directory: Arc<dyn DeviceDirectory>) -> Self {
        OnOffHandler { directory }
    }
}

#[async_trait]
impl CapabilityHandler for OnOffHandler {
    fn id(&self) -> &str {
        CapabilityKind::OnOff.as_str()
    }

    async fn get(&self, target: &DeviceTarget) -> Result<CapabilityValue, CapabilityError> {
        let device = self.directory.get_device(target.device_id()).await?;
        let on = device.capability_value(ONOFF).and_then(|value| value.as_bool()).unwrap_or(false);
        Ok(CapabilityValue::Boolean(on))
    }

    async fn set(&self, target: &DeviceTarget, value: SetValue) -> Result<(), CapabilityError> {
        let SetValue::Boolean(on) = value else {
            return Err(CapabilityError::InvalidValue {
                capability: self.id().to_string(),
                reason: format!("expected a boolean, got {:?}", value),
            });
        };

        let device_id = target.device_id();
        self.directory.set_capability_value(device_id, ONOFF, Value::Boolean(on)).await?;
        info!(device_id, "🟢 Turned device {}", if on { "on" } else { "off" });
        Ok(())
    }
}
