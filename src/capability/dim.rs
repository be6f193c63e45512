use crate::capability::{CapabilityError, CapabilityHandler, CapabilityValue, DimState, DimUpdate, SetValue};
use crate::directory::{DeviceDirectory, DeviceRef, DirectoryError};
use crate::domain::{CapabilityKind, DeviceTarget, Value};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

const DIM: &str = "dim";
const ONOFF: &str = "onoff";
const FULL_BRIGHTNESS: f64 = 1.0;

/// Couples the `dim` and `onoff` device capabilities into one logical capability: every write
/// writes both.
#[derive(Debug)]
pub struct DimHandler {
    directory: Arc<dyn DeviceDirectory>,
    // Last non-zero level seen per device, restored when the light is switched back on.
    last_levels: Mutex<HashMap<String, f64>>,
}

impl DimHandler {
    pub fn new(directory: Arc<dyn DeviceDirectory>) -> Self {
        DimHandler {
            directory,
            last_levels: Mutex::new(HashMap::new()),
        }
    }

    fn remember(&self, device_id: &str, level: f64) {
        if level > 0.0 {
            self.last_levels
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(device_id.to_string(), level);
        }
    }

    fn remembered(&self, device_id: &str) -> Option<f64> {
        self.last_levels.lock().unwrap_or_else(PoisonError::into_inner).get(device_id).copied()
    }

    fn invalid(&self, reason: impl Into<String>) -> CapabilityError {
        CapabilityError::InvalidValue {
            capability: self.id().to_string(),
            reason: reason.into(),
        }
    }

    /// Looks the device up and makes sure it has both halves of the pair before anything is written.
    async fn dimmable(&self, device_id: &str) -> Result<Arc<dyn DeviceRef>, CapabilityError> {
        let device = self.directory.get_device(device_id).await?;
        match [DIM, ONOFF].into_iter().find(|capability| !device.has_capability(capability)) {
            Some(missing) => Err(DirectoryError::CapabilityNotFound {
                device_id: device_id.to_string(),
                capability: missing.to_string(),
            }
            .into()),
            None => Ok(device),
        }
    }

    async fn set_level(&self, device_id: &str, level: f64) -> Result<(), CapabilityError> {
        if !(0.0..=1.0).contains(&level) {
            return Err(self.invalid(format!("dim level {} is outside [0, 1]", level)));
        }

        self.dimmable(device_id).await?;
        self.directory.set_capability_value(device_id, DIM, Value::Number(level)).await?;
        self.directory.set_capability_value(device_id, ONOFF, Value::Boolean(level > 0.0)).await?;
        self.remember(device_id, level);

        info!(device_id, "🟢 Dimmed device to {}%", (level * 100.0).round());
        Ok(())
    }

    async fn switch(&self, device_id: &str, on: bool) -> Result<(), CapabilityError> {
        let device = self.dimmable(device_id).await?;
        if !on {
            self.directory.set_capability_value(device_id, ONOFF, Value::Boolean(false)).await?;
            info!(device_id, "🟢 Turned dimmable device off");
            return Ok(());
        }

        let level = device
            .capability_value(DIM)
            .and_then(|value| value.as_f64())
            .filter(|level| *level > 0.0)
            .or_else(|| self.remembered(device_id))
            .unwrap_or(FULL_BRIGHTNESS);

        self.directory.set_capability_value(device_id, DIM, Value::Number(level)).await?;
        self.directory.set_capability_value(device_id, ONOFF, Value::Boolean(true)).await?;
        self.remember(device_id, level);

        info!(device_id, "🟢 Turned dimmable device on at {}%", (level * 100.0).round());
        Ok(())
    }
}

#[async_trait]
impl CapabilityHandler for DimHandler {
    fn id(&self) -> &str {
        CapabilityKind::Dim.as_str()
    }

    async fn get(&self, target: &DeviceTarget) -> Result<CapabilityValue, CapabilityError> {
        let device = self.directory.get_device(target.device_id()).await?;
        let dim = device.capability_value(DIM).and_then(|value| value.as_f64()).unwrap_or(0.0);
        let onoff = device.capability_value(ONOFF).and_then(|value| value.as_bool()).unwrap_or(false);

        self.remember(target.device_id(), dim);
        Ok(CapabilityValue::Dim(DimState { dim, onoff }))
    }

    async fn set(&self, target: &DeviceTarget, value: SetValue) -> Result<(), CapabilityError> {
        let device_id = target.device_id();
        match value {
            SetValue::Number(level) => self.set_level(device_id, level).await,
            SetValue::Boolean(on) => self.switch(device_id, on).await,
            SetValue::Dim(DimUpdate { dim: Some(level), .. }) => self.set_level(device_id, level).await,
            SetValue::Dim(DimUpdate { dim: None, onoff: Some(on) }) => self.switch(device_id, on).await,
            SetValue::Dim(DimUpdate { dim: None, onoff: None }) => Err(self.invalid("expected 'dim' or 'onoff'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryDirectory, SimulatedDevice};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const LAMP: &str = "lamp";

    fn setup(dim: f64, onoff: bool) -> (InMemoryDirectory, DimHandler, DeviceTarget) {
        let directory = InMemoryDirectory::from_devices([SimulatedDevice::new(LAMP, "Lamp").with(DIM, dim).with(ONOFF, onoff)]);
        let handler = DimHandler::new(Arc::new(directory.clone()));
        (directory, handler, DeviceTarget::parse(LAMP))
    }

    fn state(directory: &InMemoryDirectory) -> (Option<Value>, Option<Value>) {
        (directory.value(LAMP, DIM), directory.value(LAMP, ONOFF))
    }

    #[rstest]
    #[case(0.0, false)]
    #[case(0.5, true)]
    #[case(1.0, true)]
    #[tokio::test]
    async fn setting_dim_also_writes_onoff(#[case] level: f64, #[case] expected_on: bool) {
        let (directory, handler, target) = setup(0.3, !expected_on);

        handler.set(&target, SetValue::Number(level)).await.unwrap();

        assert_eq!(state(&directory), (Some(Value::Number(level)), Some(Value::Boolean(expected_on))));
    }

    #[tokio::test]
    async fn switching_on_keeps_a_non_zero_level() {
        let (directory, handler, target) = setup(0.4, false);

        handler.set(&target, SetValue::Boolean(true)).await.unwrap();

        assert_eq!(state(&directory), (Some(Value::Number(0.4)), Some(Value::Boolean(true))));
    }

    #[tokio::test]
    async fn switching_on_restores_the_last_non_zero_level() {
        let (directory, handler, target) = setup(0.7, true);

        handler.set(&target, SetValue::Number(0.6)).await.unwrap();
        handler.set(&target, SetValue::Number(0.0)).await.unwrap();
        handler.set(&target, SetValue::Boolean(true)).await.unwrap();

        assert_eq!(state(&directory), (Some(Value::Number(0.6)), Some(Value::Boolean(true))));
    }

    #[tokio::test]
    async fn switching_on_without_history_uses_full_brightness() {
        let (directory, handler, target) = setup(0.0, false);

        handler.set(&target, SetValue::Dim(DimUpdate { dim: None, onoff: Some(true) })).await.unwrap();

        assert_eq!(state(&directory), (Some(Value::Number(1.0)), Some(Value::Boolean(true))));
    }

    #[tokio::test]
    async fn switching_off_leaves_the_level_untouched() {
        let (directory, handler, target) = setup(0.8, true);

        handler.set(&target, SetValue::Boolean(false)).await.unwrap();

        assert_eq!(state(&directory), (Some(Value::Number(0.8)), Some(Value::Boolean(false))));
        assert_eq!(handler.get(&target).await, Ok(CapabilityValue::Dim(DimState { dim: 0.8, onoff: false })));
    }

    #[rstest]
    #[case(SetValue::Number(1.5))]
    #[case(SetValue::Number(-0.1))]
    #[case(SetValue::Dim(DimUpdate { dim: None, onoff: None }))]
    #[tokio::test]
    async fn invalid_values_are_rejected_without_writing(#[case] value: SetValue) {
        let (directory, handler, target) = setup(0.3, true);

        let result = handler.set(&target, value).await;

        assert!(matches!(result, Err(CapabilityError::InvalidValue { .. })));
        assert_eq!(state(&directory), (Some(Value::Number(0.3)), Some(Value::Boolean(true))));
    }

    #[rstest]
    #[case(SetValue::Number(0.9))]
    #[case(SetValue::Boolean(true))]
    #[case(SetValue::Boolean(false))]
    #[tokio::test]
    async fn devices_missing_half_of_the_pair_are_left_untouched(#[case] value: SetValue) {
        let directory = InMemoryDirectory::from_devices([SimulatedDevice::new(LAMP, "Lamp").with(DIM, 0.2)]);
        let handler = DimHandler::new(Arc::new(directory.clone()));

        let result = handler.set(&DeviceTarget::parse(LAMP), value).await;

        assert_eq!(
            result,
            Err(CapabilityError::Directory(DirectoryError::CapabilityNotFound {
                device_id: LAMP.to_string(),
                capability: ONOFF.to_string(),
            }))
        );
        assert_eq!(state(&directory), (Some(Value::Number(0.2)), None));
    }
}
