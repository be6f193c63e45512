use crate::directory::{CapabilityCallback, DeviceDirectory, DeviceRef, DirectoryError, ListenerHandle};
use crate::domain::Value;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

#[cfg(test)]
use std::sync::atomic::AtomicBool;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatedDevice {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub capabilities: BTreeMap<String, Value>,
}

impl SimulatedDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        SimulatedDevice {
            id: id.into(),
            name: name.into(),
            capabilities: BTreeMap::new(),
        }
    }

    pub fn with(mut self, capability: impl Into<String>, value: impl Into<Value>) -> Self {
        self.capabilities.insert(capability.into(), value.into());
        self
    }
}

struct Listener {
    device_id: String,
    capability: String,
    callback: CapabilityCallback,
}

#[derive(Default)]
struct Shared {
    devices: RwLock<HashMap<String, SimulatedDevice>>,
    listeners: Mutex<HashMap<u64, Listener>>,
    next_listener_id: AtomicU64,
    destroyed: AtomicUsize,
    #[cfg(test)]
    reject_listeners: AtomicBool,
}

impl Shared {
    fn devices(&self) -> RwLockReadGuard<'_, HashMap<String, SimulatedDevice>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn devices_mut(&self) -> RwLockWriteGuard<'_, HashMap<String, SimulatedDevice>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<u64, Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for Shared {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("devices", &self.devices().len())
            .field("listeners", &self.listeners().len())
            .field("destroyed", &self.destroyed.load(Ordering::Relaxed))
            .finish()
    }
}

/// A device directory kept entirely in memory. Backs the simulated host and the tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    shared: Arc<Shared>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_devices(devices: impl IntoIterator<Item = SimulatedDevice>) -> Self {
        let directory = Self::new();
        for device in devices {
            directory.add_device(device);
        }
        directory
    }

    pub fn add_device(&self, device: SimulatedDevice) {
        self.shared.devices_mut().insert(device.id.clone(), device);
    }

    pub fn devices(&self) -> Vec<SimulatedDevice> {
        let mut devices: Vec<SimulatedDevice> = self.shared.devices().values().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    pub fn value(&self, device_id: &str, capability: &str) -> Option<Value> {
        self.shared.devices().get(device_id).and_then(|device| device.capabilities.get(capability).cloned())
    }

    /// Writes a capability value and notifies every listener on it. Callbacks run after all
    /// directory locks are released, in the order updates are made.
    pub fn update(&self, device_id: &str, capability: &str, value: Value) -> Result<(), DirectoryError> {
        {
            let mut devices = self.shared.devices_mut();
            let device = devices.get_mut(device_id).ok_or_else(|| DirectoryError::DeviceNotFound(device_id.to_string()))?;
            let slot = device.capabilities.get_mut(capability).ok_or_else(|| DirectoryError::CapabilityNotFound {
                device_id: device_id.to_string(),
                capability: capability.to_string(),
            })?;
            *slot = value.clone();
        }

        let callbacks: Vec<CapabilityCallback> = self
            .shared
            .listeners()
            .values()
            .filter(|listener| listener.device_id == device_id && listener.capability == capability)
            .map(|listener| listener.callback.clone())
            .collect();

        trace!(device_id, capability, listeners = callbacks.len(), "Set '{}' to '{}'", capability, value);
        for callback in callbacks {
            callback(value.clone());
        }

        Ok(())
    }

    pub fn live_listeners(&self, device_id: &str, capability: &str) -> usize {
        self.shared
            .listeners()
            .values()
            .filter(|listener| listener.device_id == device_id && listener.capability == capability)
            .count()
    }

    pub fn destroyed_listeners(&self) -> usize {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn reject_listeners(&self, reject: bool) {
        self.shared.reject_listeners.store(reject, Ordering::SeqCst);
    }

    fn device_ref(&self, device: &SimulatedDevice) -> Arc<dyn DeviceRef> {
        Arc::new(MemoryDevice {
            id: device.id.clone(),
            name: device.name.clone(),
            shared: self.shared.clone(),
        })
    }
}

#[async_trait]
impl DeviceDirectory for InMemoryDirectory {
    async fn get_device(&self, device_id: &str) -> Result<Arc<dyn DeviceRef>, DirectoryError> {
        let devices = self.shared.devices();
        let device = devices.get(device_id).ok_or_else(|| DirectoryError::DeviceNotFound(device_id.to_string()))?;
        Ok(self.device_ref(device))
    }

    async fn list_devices(&self) -> Result<Vec<Arc<dyn DeviceRef>>, DirectoryError> {
        Ok(self.devices().iter().map(|device| self.device_ref(device)).collect())
    }

    async fn set_capability_value(&self, device_id: &str, capability: &str, value: Value) -> Result<(), DirectoryError> {
        self.update(device_id, capability, value)
    }
}

#[derive(Debug)]
struct MemoryDevice {
    id: String,
    name: String,
    shared: Arc<Shared>,
}

#[async_trait]
impl DeviceRef for MemoryDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        self.shared
            .devices()
            .get(&self.id)
            .map(|device| device.capabilities.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn capability_value(&self, capability: &str) -> Option<Value> {
        self.shared.devices().get(&self.id).and_then(|device| device.capabilities.get(capability).cloned())
    }

    async fn create_capability_listener(&self, capability: &str, on_change: CapabilityCallback) -> Result<Box<dyn ListenerHandle>, DirectoryError> {
        #[cfg(test)]
        if self.shared.reject_listeners.load(Ordering::SeqCst) {
            return Err(DirectoryError::Listener(format!("host refused a listener for '{}'", capability)));
        }

        if !self.has_capability(capability) {
            return Err(DirectoryError::CapabilityNotFound {
                device_id: self.id.clone(),
                capability: capability.to_string(),
            });
        }

        let id = self.shared.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.shared.listeners().insert(
            id,
            Listener {
                device_id: self.id.clone(),
                capability: capability.to_string(),
                callback: on_change,
            },
        );
        debug!(device_id = self.id, capability, listener_id = id, "Created capability listener");

        Ok(Box::new(MemoryListenerHandle {
            id,
            shared: self.shared.clone(),
        }))
    }
}

#[derive(Debug)]
struct MemoryListenerHandle {
    id: u64,
    shared: Arc<Shared>,
}

#[async_trait]
impl ListenerHandle for MemoryListenerHandle {
    async fn destroy(&self) -> Result<(), DirectoryError> {
        if self.shared.listeners().remove(&self.id).is_some() {
            self.shared.destroyed.fetch_add(1, Ordering::SeqCst);
            debug!(listener_id = self.id, "Destroyed capability listener");
        }
        Ok(())
    }
}
