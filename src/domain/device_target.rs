use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const SENSOR_MARKER: &str = "-sensor-";
const MEASURE_MARKER: &str = "-measure-";

/// The device a capability request addresses.
///
/// Widgets address sub-capabilities of a single physical device through facet ids such as
/// `{deviceId}-sensor-{alarmType}` or `{deviceId}-measure-{measureType}`. They are parsed once
/// when a request enters the dashboard so handlers never match on strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceTarget {
    Physical(String),
    SensorFacet { device_id: String, alarm_type: String },
    MeasureFacet { device_id: String, measure_type: String },
}

impl DeviceTarget {
    pub fn parse(id: &str) -> Self {
        if let Some((device_id, measure_type)) = split_facet(id, MEASURE_MARKER) {
            return DeviceTarget::MeasureFacet {
                device_id: device_id.to_string(),
                measure_type: measure_type.to_string(),
            };
        }

        if let Some((device_id, alarm_type)) = split_facet(id, SENSOR_MARKER) {
            return DeviceTarget::SensorFacet {
                device_id: device_id.to_string(),
                alarm_type: alarm_type.to_string(),
            };
        }

        DeviceTarget::Physical(id.to_string())
    }

    /// The id of the physical device behind this target.
    pub fn device_id(&self) -> &str {
        match self {
            DeviceTarget::Physical(device_id) => device_id,
            DeviceTarget::SensorFacet { device_id, .. } => device_id,
            DeviceTarget::MeasureFacet { device_id, .. } => device_id,
        }
    }
}

fn split_facet<'a>(id: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    id.split_once(marker).filter(|(device_id, facet)| !device_id.is_empty() && !facet.is_empty())
}

impl FromStr for DeviceTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DeviceTarget::parse(s))
    }
}

impl Display for DeviceTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceTarget::Physical(device_id) => write!(f, "{}", device_id),
            DeviceTarget::SensorFacet { device_id, alarm_type } => write!(f, "{}{}{}", device_id, SENSOR_MARKER, alarm_type),
            DeviceTarget::MeasureFacet { device_id, measure_type } => write!(f, "{}{}{}", device_id, MEASURE_MARKER, measure_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("dev1", DeviceTarget::Physical("dev1".to_string()))]
    #[case("dev1-sensor-alarm_motion", DeviceTarget::SensorFacet { device_id: "dev1".to_string(), alarm_type: "alarm_motion".to_string() })]
    #[case("dev1-measure-measure_temperature", DeviceTarget::MeasureFacet { device_id: "dev1".to_string(), measure_type: "measure_temperature".to_string() })]
    #[case(
        "0b2c7f4e-1a2b-4c3d-9e8f-001122334455-measure-measure_humidity",
        DeviceTarget::MeasureFacet { device_id: "0b2c7f4e-1a2b-4c3d-9e8f-001122334455".to_string(), measure_type: "measure_humidity".to_string() }
    )]
    #[case("-measure-measure_humidity", DeviceTarget::Physical("-measure-measure_humidity".to_string()))]
    #[case("dev1-sensor-", DeviceTarget::Physical("dev1-sensor-".to_string()))]
    fn parse_recognizes_facets(#[case] id: &str, #[case] expected: DeviceTarget) {
        assert_eq!(DeviceTarget::parse(id), expected);
    }

    #[rstest]
    #[case("dev1")]
    #[case("dev1-sensor-alarm_contact")]
    #[case("dev1-measure-measure_temperature")]
    fn display_restores_the_wire_id(#[case] id: &str) {
        assert_eq!(DeviceTarget::parse(id).to_string(), id);
    }

    #[test]
    fn device_id_is_the_physical_device() {
        assert_eq!(DeviceTarget::parse("dev1-measure-measure_humidity").device_id(), "dev1");
    }
}
