mod memory;

pub use memory::{InMemoryDirectory, SimulatedDevice};

use crate::domain::Value;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// Invoked by the directory every time the value of a listened capability changes.
pub type CapabilityCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// The smart-home host the dashboard runs in: device lookup and capability primitives.
#[async_trait]
pub trait DeviceDirectory: Debug + Send + Sync {
    async fn get_device(&self, device_id: &str) -> Result<Arc<dyn DeviceRef>, DirectoryError>;

    async fn list_devices(&self) -> Result<Vec<Arc<dyn DeviceRef>>, DirectoryError>;

    async fn set_capability_value(&self, device_id: &str, capability: &str, value: Value) -> Result<(), DirectoryError>;
}

#[async_trait]
pub trait DeviceRef: Debug + Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn capabilities(&self) -> Vec<String>;

    /// The current value of `capability`, `None` if the device does not expose it.
    fn capability_value(&self, capability: &str) -> Option<Value>;

    fn has_capability(&self, capability: &str) -> bool {
        self.capability_value(capability).is_some()
    }

    async fn create_capability_listener(&self, capability: &str, on_change: CapabilityCallback) -> Result<Box<dyn ListenerHandle>, DirectoryError>;
}

/// A live upstream listener. Destroying it more than once has no further effect.
#[async_trait]
pub trait ListenerHandle: Debug + Send + Sync {
    async fn destroy(&self) -> Result<(), DirectoryError>;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectoryError {
    #[error("device '{0}' not found")]
    DeviceNotFound(String),
    #[error("device '{device_id}' has no capability '{capability}'")]
    CapabilityNotFound { device_id: String, capability: String },
    #[error("upstream listener error: {0}")]
    Listener(String),
}
