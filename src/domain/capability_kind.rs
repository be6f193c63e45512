use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The logical capabilities the dashboard ships handlers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    OnOff,
    Dim,
    Sensor,
    Measure,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::OnOff => "onoff",
            CapabilityKind::Dim => "dim",
            CapabilityKind::Sensor => "sensor",
            CapabilityKind::Measure => "measure",
        }
    }
}

impl FromStr for CapabilityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onoff" => Ok(CapabilityKind::OnOff),
            "dim" => Ok(CapabilityKind::Dim),
            "sensor" => Ok(CapabilityKind::Sensor),
            "measure" => Ok(CapabilityKind::Measure),
            other => Err(format!("unknown capability '{}'", other)),
        }
    }
}

impl Display for CapabilityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
