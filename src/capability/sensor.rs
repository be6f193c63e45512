use crate::capability::{CapabilityError, CapabilityHandler, CapabilityValue, SetValue};
use crate::directory::DeviceDirectory;
use crate::domain::{CapabilityKind, DeviceTarget};
use async_trait::async_trait;
use std::sync::Arc;

const ALARMS: [&str; 2] = ["alarm_contact", "alarm_motion"];

#[derive(Debug)]
pub struct SensorHandler {
    directory: Arc<dyn DeviceDirectory>,
}

impl SensorHandler {
    pub fn new(directory: Arc<dyn DeviceDirectory>) -> Self {
        SensorHandler { directory }
    }
}

#[async_trait]
impl CapabilityHandler for SensorHandler {
    fn id(&self) -> &str {
        CapabilityKind::Sensor.as_str()
    }

    async fn get(&self, target: &DeviceTarget) -> Result<CapabilityValue, CapabilityError> {
        let device = self.directory.get_device(target.device_id()).await?;

        let requested = match target {
            DeviceTarget::SensorFacet { alarm_type, .. } => Some(alarm_type.as_str()),
            _ => None,
        };

        // The requested alarm wins, then contact before motion
        let alarm = requested
            .into_iter()
            .chain(ALARMS)
            .find_map(|capability| device.capability_value(capability).and_then(|value| value.as_bool()))
            .unwrap_or(false);

        Ok(CapabilityValue::Boolean(alarm))
    }

    async fn set(&self, _target: &DeviceTarget, _value: SetValue) -> Result<(), CapabilityError> {
        Err(CapabilityError::ReadOnlyCapability(self.id().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryDirectory, SimulatedDevice};
    use crate::domain::Value;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn handler(device: SimulatedDevice) -> SensorHandler {
        SensorHandler::new(Arc::new(InMemoryDirectory::from_devices([device])))
    }

    #[rstest]
    #[case(SimulatedDevice::new("door", "Door").with("alarm_contact", true), true)]
    #[case(SimulatedDevice::new("door", "Door").with("alarm_motion", true), true)]
    #[case(SimulatedDevice::new("door", "Door").with("alarm_contact", false).with("alarm_motion", true), false)]
    #[case(SimulatedDevice::new("door", "Door"), false)]
    #[tokio::test]
    async fn get_reads_contact_before_motion(#[case] device: SimulatedDevice, #[case] expected: bool) {
        let value = handler(device).get(&DeviceTarget::parse("door")).await;

        assert_eq!(value, Ok(CapabilityValue::Boolean(expected)));
    }

    #[tokio::test]
    async fn get_prefers_the_facet_alarm() {
        let device = SimulatedDevice::new("hall", "Hall").with("alarm_contact", false).with("alarm_motion", true);

        let value = handler(device).get(&DeviceTarget::parse("hall-sensor-alarm_motion")).await;

        assert_eq!(value, Ok(CapabilityValue::Boolean(true)));
    }

    #[rstest]
    #[case(SetValue::Boolean(true))]
    #[case(SetValue::Number(1.0))]
    #[tokio::test]
    async fn set_is_always_rejected(#[case] value: SetValue) {
        let handler = handler(SimulatedDevice::new("door", "Door").with("alarm_contact", false));

        let result = handler.set(&DeviceTarget::parse("door"), value).await;

        assert_eq!(result, Err(CapabilityError::ReadOnlyCapability("sensor".to_string())));
    }

    #[tokio::test]
    async fn non_boolean_alarms_fall_back_to_the_next_candidate() {
        let device = SimulatedDevice::new("hall", "Hall").with("alarm_tamper", Value::Text("unknown".to_string())).with("alarm_contact", true);

        let value = handler(device).get(&DeviceTarget::parse("hall-sensor-alarm_tamper")).await;

        assert_eq!(value, Ok(CapabilityValue::Boolean(true)));
    }
}
