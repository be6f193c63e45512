mod dim;
mod measure;
mod onoff;
mod registry;
mod sensor;

pub use dim::DimHandler;
pub use measure::MeasureHandler;
pub use onoff::OnOffHandler;
pub use registry::CapabilityHandlerRegistry;
pub use sensor::SensorHandler;

use crate::directory::DirectoryError;
use crate::domain::DeviceTarget;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// Uniform value access for one logical capability.
#[async_trait]
pub trait CapabilityHandler: Debug + Send + Sync {
    fn id(&self) -> &str;

    async fn get(&self, target: &DeviceTarget) -> Result<CapabilityValue, CapabilityError>;

    async fn set(&self, target: &DeviceTarget, value: SetValue) -> Result<(), CapabilityError>;
}

/// What a handler reports for a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    Boolean(bool),
    Dim(DimState),
    Measure(MeasureReading),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DimState {
    pub dim: f64,
    pub onoff: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureReading {
    pub value: Option<f64>,
    pub measure_type: String,
    pub unit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_unit: Option<&'static str>,
}

/// What a widget asks a handler to write.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SetValue {
    Boolean(bool),
    Number(f64),
    Dim(DimUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DimUpdate {
    pub dim: Option<f64>,
    pub onoff: Option<bool>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    #[error("unknown capability '{0}'")]
    UnknownCapability(String),
    #[error("device '{0}' not found")]
    DeviceNotFound(String),
    #[error("capability '{0}' is read-only")]
    ReadOnlyCapability(String),
    #[error("invalid value for capability '{capability}': {reason}")]
    InvalidValue { capability: String, reason: String },
    #[error("'{0}' does not name a measurement, expected '<device>-measure-<type>'")]
    MissingMeasureType(String),
    #[error("device directory error: {0}")]
    Directory(DirectoryError),
}

impl From<DirectoryError> for CapabilityError {
    fn from(error: DirectoryError) -> Self {
        match error {
            DirectoryError::DeviceNotFound(device_id) => CapabilityError::DeviceNotFound(device_id),
            other => CapabilityError::Directory(other),
        }
    }
}
