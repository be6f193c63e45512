use crate::capability::{CapabilityError, CapabilityHandler, CapabilityValue, DimHandler, MeasureHandler, OnOffHandler, SensorHandler, SetValue};
use crate::directory::DeviceDirectory;
use crate::domain::DeviceTarget;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Capability id → handler. Ids arrive from device metadata, so lookups are validated at runtime.
#[derive(Debug, Default)]
pub struct CapabilityHandlerRegistry {
    handlers: HashMap<String, Arc<dyn CapabilityHandler>>,
}

impl CapabilityHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_handlers(directory: Arc<dyn DeviceDirectory>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(OnOffHandler::new(directory.clone())));
        registry.register(Arc::new(DimHandler::new(directory.clone())));
        registry.register(Arc::new(SensorHandler::new(directory.clone())));
        registry.register(Arc::new(MeasureHandler::new(directory)));
        registry
    }

    /// Registers a handler under its id. A later registration for the same id replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn CapabilityHandler>) {
        debug!(capability = handler.id(), "Registered capability handler");
        self.handlers.insert(handler.id().to_string(), handler);
    }

    pub fn contains(&self, capability_id: &str) -> bool {
        self.handlers.contains_key(capability_id)
    }

    #[instrument(skip(self, target), fields(target = %target))]
    pub async fn get_value(&self, capability_id: &str, target: &DeviceTarget) -> Result<CapabilityValue, CapabilityError> {
        self.handler(capability_id)?.get(target).await
    }

    #[instrument(skip(self, target), fields(target = %target))]
    pub async fn set_value(&self, capability_id: &str, target: &DeviceTarget, value: SetValue) -> Result<(), CapabilityError> {
        self.handler(capability_id)?.set(target, value).await
    }

    fn handler(&self, capability_id: &str) -> Result<&Arc<dyn CapabilityHandler>, CapabilityError> {
        self.handlers
            .get(capability_id)
            .ok_or_else(|| CapabilityError::UnknownCapability(capability_id.to_string()))
    }
}
