use crate::capability::{CapabilityError, CapabilityHandlerRegistry, CapabilityValue, SetValue};
use crate::directory::{DeviceDirectory, DirectoryError};
use crate::domain::{DeviceTarget, SubscriptionKey};
use crate::floor_store::{FloorStore, FloorStoreError};
use crate::subscription::SubscriptionRegistry;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    fn ok() -> Self {
        SuccessResponse { success: true }
    }
}

/// Reply to `subscribeToDevices`. Keeps the `{success: true}` shape and only lists failures when
/// there are any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscribeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedSubscription>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSubscription {
    pub device_id: String,
    pub capability: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub id: String,
    pub name: String,
    pub capabilities: Vec<String>,
}

/// The operations widgets and the settings page call into.
#[derive(Debug, Clone)]
pub struct DashboardApi {
    directory: Arc<dyn DeviceDirectory>,
    capabilities: Arc<CapabilityHandlerRegistry>,
    subscriptions: SubscriptionRegistry,
    floors: Arc<FloorStore>,
}

impl DashboardApi {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        capabilities: Arc<CapabilityHandlerRegistry>,
        subscriptions: SubscriptionRegistry,
        floors: Arc<FloorStore>,
    ) -> Self {
        DashboardApi {
            directory,
            capabilities,
            subscriptions,
            floors,
        }
    }

    #[instrument(skip(self, devices), fields(devices = devices.len()))]
    pub async fn subscribe_to_devices(&self, widget_id: &str, devices: Vec<SubscriptionKey>) -> SubscribeResponse {
        let failed: Vec<FailedSubscription> = FuturesUnordered::from_iter(devices.into_iter().map(|key| async move {
            let result = self.subscriptions.subscribe_widget(widget_id, &key.device_id, &key.capability).await;
            (key, result)
        }))
        .filter_map(|(key, result)| async move {
            result.err().map(|error| FailedSubscription {
                device_id: key.device_id,
                capability: key.capability,
                reason: error.to_string(),
            })
        })
        .collect()
        .await;

        if !failed.is_empty() {
            warn!(widget_id, "⚠️ {} subscription(s) could not be set up", failed.len());
        }

        SubscribeResponse { success: true, failed }
    }

    #[instrument(skip(self))]
    pub async fn unsubscribe_widget(&self, widget_id: &str) -> SuccessResponse {
        self.subscriptions.unsubscribe_widget(widget_id).await;
        SuccessResponse::ok()
    }

    pub async fn get_device_state(&self, device_id: &str, capability_id: &str) -> Result<CapabilityValue, CapabilityError> {
        self.capabilities.get_value(capability_id, &DeviceTarget::parse(device_id)).await
    }

    pub async fn set_device_state(&self, device_id: &str, capability_id: &str, value: SetValue) -> Result<SuccessResponse, CapabilityError> {
        self.capabilities.set_value(capability_id, &DeviceTarget::parse(device_id), value).await?;
        Ok(SuccessResponse::ok())
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceSummary>, DirectoryError> {
        let devices = self.directory.list_devices().await?;
        Ok(devices
            .iter()
            .map(|device| DeviceSummary {
                id: device.id().to_string(),
                name: device.name().to_string(),
                capabilities: device.capabilities(),
            })
            .collect())
    }

    /// Points a widget at a floor: remembers the choice and moves the widget's subscriptions to
    /// the devices placed on that floor.
    #[instrument(skip(self))]
    pub async fn show_floor(&self, widget_id: &str, floor_id: &str) -> Result<SubscribeResponse, FloorStoreError> {
        let floor = self.floors.floor(floor_id).await?;
        self.floors.select_floor(widget_id, floor_id).await?;

        self.subscriptions.unsubscribe_widget(widget_id).await;
        let response = self.subscribe_to_devices(widget_id, floor.subscription_keys()).await;

        info!(widget_id, "🖼️ Widget shows floor '{}'", floor.name);
        Ok(response)
    }

    /// Re-subscribes every widget to the floor it showed before a restart.
    #[instrument(skip(self))]
    pub async fn restore_widgets(&self) -> Result<usize, FloorStoreError> {
        let selections = self.floors.selected_floors().await?;
        let mut restored = 0;

        for (widget_id, selected) in selections {
            match self.floors.floor(&selected.floor_id).await {
                Ok(floor) => {
                    self.subscribe_to_devices(&widget_id, floor.subscription_keys()).await;
                    restored += 1;
                }
                Err(FloorStoreError::FloorNotFound(floor_id)) => {
                    warn!(widget_id, "⚠️ Widget points at floor '{}' which no longer exists", floor_id);
                }
                Err(error) => return Err(error),
            }
        }

        info!("✅  Restored {} widget(s)", restored);
        Ok(restored)
    }

    pub async fn shutdown(&self) {
        self.subscriptions.unsubscribe_all().await;
    }
}
