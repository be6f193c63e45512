mod registry;

pub use registry::SubscriptionRegistry;

use crate::directory::DirectoryError;
use crate::domain::SubscriptionKey;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubscriptionError {
    #[error("device '{0}' not found")]
    DeviceNotFound(String),
    #[error("could not install a listener for '{key}': {source}")]
    UpstreamListener {
        key: SubscriptionKey,
        #[source]
        source: DirectoryError,
    },
    #[error("listener installation for '{0}' ended without a result")]
    Interrupted(SubscriptionKey),
}

impl SubscriptionError {
    fn from_directory(key: &SubscriptionKey, error: DirectoryError) -> Self {
        match error {
            DirectoryError::DeviceNotFound(device_id) => SubscriptionError::DeviceNotFound(device_id),
            source => SubscriptionError::UpstreamListener { key: key.clone(), source },
        }
    }
}
