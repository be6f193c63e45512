use crate::capability::{CapabilityError, CapabilityHandler, CapabilityValue, MeasureReading, SetValue};
use crate::directory::DeviceDirectory;
use crate::domain::{CapabilityKind, DeviceTarget};
use async_trait::async_trait;
use std::sync::Arc;

const TEMPERATURE: &str = "measure_temperature";
const HUMIDITY: &str = "measure_humidity";

fn unit_for(measure_type: &str) -> &'static str {
    match measure_type {
        TEMPERATURE => "°C",
        HUMIDITY => "%",
        _ => "",
    }
}

fn companion(measure_type: &str) -> Option<&'static str> {
    match measure_type {
        TEMPERATURE => Some(HUMIDITY),
        HUMIDITY => Some(TEMPERATURE),
        _ => None,
    }
}

/// Reads one measurement of a device addressed as `<device>-measure-<type>`. Climate sensors
/// exposing both temperature and humidity report the other one as a secondary reading.
#[derive(Debug)]
pub struct MeasureHandler {
    directory: Arc<dyn DeviceDirectory>,
}

impl MeasureHandler {
    pub fn new(directory: Arc<dyn DeviceDirectory>) -> Self {
        MeasureHandler { directory }
    }
}

#[async_trait]
impl CapabilityHandler for MeasureHandler {
    fn id(&self) -> &str {
        CapabilityKind::Measure.as_str()
    }

    async fn get(&self, target: &DeviceTarget) -> Result<CapabilityValue, CapabilityError> {
        let DeviceTarget::MeasureFacet { device_id, measure_type } = target else {
            return Err(CapabilityError::MissingMeasureType(target.to_string()));
        };

        let device = self.directory.get_device(device_id).await?;
        let value = device.capability_value(measure_type).and_then(|value| value.as_f64());

        let secondary = companion(measure_type)
            .filter(|_| device.has_capability(measure_type))
            .and_then(|other| device.capability_value(other).map(|value| (other, value.as_f64())));

        Ok(CapabilityValue::Measure(MeasureReading {
            value,
            measure_type: measure_type.clone(),
            unit: unit_for(measure_type),
            secondary_value: secondary.and_then(|(_, value)| value),
            secondary_type: secondary.map(|(other, _)| other.to_string()),
            secondary_unit: secondary.map(|(other, _)| unit_for(other)),
        }))
    }

    async fn set(&self, _target: &DeviceTarget, _value: SetValue) -> Result<(), CapabilityError> {
        Err(CapabilityError::ReadOnlyCapability(self.id().to_string()))
    }
}
