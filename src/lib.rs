//! Host side of a floor-plan dashboard: widgets subscribe to device capabilities, read and
//! write device state, and are told about every change of the devices they show.

use crate::api::DashboardApi;
use crate::app_config::AppConfig;
use crate::capability::CapabilityHandlerRegistry;
use crate::directory::{DeviceDirectory, InMemoryDirectory};
use crate::floor_store::FloorStore;
use crate::settings::JsonFileSettings;
use crate::subscription::SubscriptionRegistry;
use crate::transport::BroadcastTransport;
use std::sync::Arc;

pub mod api;
pub mod app_config;
pub mod capability;
pub mod directory;
pub mod domain;
pub mod floor_store;
pub mod notification_listener;
pub mod settings;
pub mod simulation;
pub mod subscription;
pub mod transport;

/// The dashboard wired to a device directory, with the transport widgets are notified on.
pub struct App {
    pub api: DashboardApi,
    pub transport: BroadcastTransport,
}

pub fn assemble(config: &AppConfig, directory: InMemoryDirectory) -> App {
    let directory: Arc<dyn DeviceDirectory> = Arc::new(directory);
    let transport = BroadcastTransport::new(config.core().notification_buffer_size());

    let capabilities = Arc::new(CapabilityHandlerRegistry::with_default_handlers(directory.clone()));
    let subscriptions = SubscriptionRegistry::new(directory.clone(), Arc::new(transport.clone()));
    let floors = Arc::new(FloorStore::new(Arc::new(JsonFileSettings::new(config.settings().path()))));

    App {
        api: DashboardApi::new(directory, capabilities, subscriptions, floors),
        transport,
    }
}
