use crate::directory::{CapabilityCallback, DeviceDirectory, ListenerHandle};
use crate::domain::{SubscriptionKey, Value, WidgetId};
use crate::subscription::SubscriptionError;
use crate::transport::{NotificationTransport, WidgetNotification};
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, info, instrument, trace, warn};

type Installation = Option<Result<(), SubscriptionError>>;

enum ListenerSlot {
    /// A task is creating the upstream listener. Subscribers arriving meanwhile wait on `outcome`.
    Installing { ticket: u64, outcome: watch::Receiver<Installation> },
    Active(Box<dyn ListenerHandle>),
}

impl ListenerSlot {
    fn is_installation(&self, ticket: u64) -> bool {
        matches!(self, ListenerSlot::Installing { ticket: current, .. } if *current == ticket)
    }
}

// Invariant: a key has a subscriber set iff it has a listener slot.
#[derive(Default)]
struct State {
    subscriptions: HashMap<SubscriptionKey, HashSet<WidgetId>>,
    listeners: HashMap<SubscriptionKey, ListenerSlot>,
}

struct Inner {
    directory: Arc<dyn DeviceDirectory>,
    transport: Arc<dyn NotificationTransport>,
    state: Mutex<State>,
    next_ticket: AtomicU64,
}

/// Shares one upstream listener per (device, capability) among every widget interested in it
/// and fans value changes out to those widgets.
///
/// The subscriber sets and listener slots sit behind a single mutex that is only held for
/// synchronous bookkeeping, never across a call into the device directory. Listener creation
/// runs on its own task so an abandoned subscribe call can not strand a half-installed slot.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<Inner>,
}

impl SubscriptionRegistry {
    pub fn new(directory: Arc<dyn DeviceDirectory>, transport: Arc<dyn NotificationTransport>) -> Self {
        SubscriptionRegistry {
            inner: Arc::new(Inner {
                directory,
                transport,
                state: Mutex::new(State::default()),
                next_ticket: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribes a widget to a device capability.
    ///
    /// Subscribing twice is a no-op. The first subscriber of a key installs the upstream
    /// listener; when that fails the subscription is rolled back for every widget that joined
    /// the key in the meantime and all of them receive the error.
    #[instrument(skip(self))]
    pub async fn subscribe_widget(&self, widget_id: &str, device_id: &str, capability: &str) -> Result<(), SubscriptionError> {
        let key = SubscriptionKey::new(device_id, capability);

        let mut outcome = {
            let mut guard = self.inner.state();
            let state = &mut *guard;

            let subscribers = state.subscriptions.entry(key.clone()).or_default();
            if !subscribers.insert(widget_id.to_string()) {
                trace!("Widget is already subscribed");
            }

            match state.listeners.get(&key) {
                Some(ListenerSlot::Active(_)) => {
                    debug!(subscribers = subscribers.len(), "Joined the existing listener");
                    return Ok(());
                }
                Some(ListenerSlot::Installing { outcome, .. }) => outcome.clone(),
                None => {
                    let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    state.listeners.insert(
                        key.clone(),
                        ListenerSlot::Installing {
                            ticket,
                            outcome: rx.clone(),
                        },
                    );
                    tokio::spawn(install_listener(self.inner.clone(), key.clone(), ticket, tx));
                    rx
                }
            }
        };

        let result = match outcome.wait_for(Option::is_some).await {
            Ok(installation) => (*installation).clone().unwrap_or_else(|| Err(SubscriptionError::Interrupted(key.clone()))),
            Err(_) => Err(SubscriptionError::Interrupted(key)),
        };
        result
    }

    /// Removes a widget from every subscription and releases the listeners nobody needs anymore.
    /// Bookkeeping is settled before any listener is destroyed.
    #[instrument(skip(self))]
    pub async fn unsubscribe_widget(&self, widget_id: &str) {
        let released: Vec<(SubscriptionKey, Option<ListenerSlot>)> = {
            let mut guard = self.inner.state();
            let state = &mut *guard;

            let emptied: Vec<SubscriptionKey> = state
                .subscriptions
                .iter_mut()
                .filter_map(|(key, widgets)| (widgets.remove(widget_id) && widgets.is_empty()).then(|| key.clone()))
                .collect();

            emptied
                .into_iter()
                .map(|key| {
                    state.subscriptions.remove(&key);
                    let slot = state.listeners.remove(&key);
                    (key, slot)
                })
                .collect()
        };

        if released.is_empty() {
            trace!("No listeners to release");
        }

        for (key, slot) in released {
            match slot {
                Some(ListenerSlot::Active(handle)) => self.inner.release(&key, handle).await,
                Some(ListenerSlot::Installing { .. }) => debug!(%key, "Listener is still being installed and will be released by its installer"),
                None => {}
            }
        }
    }

    /// Unsubscribes every widget, releasing all upstream listeners.
    pub async fn unsubscribe_all(&self) {
        let widgets = self.widgets();
        info!("🔌 Releasing subscriptions of {} widget(s)...", widgets.len());
        for widget_id in &widgets {
            self.unsubscribe_widget(widget_id).await;
        }
        info!("🔌 Releasing subscriptions of {} widget(s)... OK", widgets.len());
    }

    pub fn subscribers(&self, device_id: &str, capability: &str) -> Vec<WidgetId> {
        let key = SubscriptionKey::new(device_id, capability);
        let mut widgets: Vec<WidgetId> = self.inner.state().subscriptions.get(&key).map(|w| w.iter().cloned().collect()).unwrap_or_default();
        widgets.sort();
        widgets
    }

    /// Whether an upstream listener is installed (not merely being installed) for the pair.
    pub fn is_listening(&self, device_id: &str, capability: &str) -> bool {
        let key = SubscriptionKey::new(device_id, capability);
        matches!(self.inner.state().listeners.get(&key), Some(ListenerSlot::Active(_)))
    }

    pub fn widget_keys(&self, widget_id: &str) -> Vec<SubscriptionKey> {
        let mut keys: Vec<SubscriptionKey> = self
            .inner
            .state()
            .subscriptions
            .iter()
            .filter(|(_, widgets)| widgets.contains(widget_id))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn widgets(&self) -> Vec<WidgetId> {
        let mut widgets: Vec<WidgetId> = self
            .inner
            .state()
            .subscriptions
            .values()
            .flatten()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        widgets.sort();
        widgets
    }
}

impl Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &state.subscriptions.len())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fan_out(&self, key: &SubscriptionKey, value: Value) {
        let widgets: Vec<WidgetId> = self.state().subscriptions.get(key).map(|w| w.iter().cloned().collect()).unwrap_or_default();

        trace!(%key, widgets = widgets.len(), "Fanning out '{}'", value);
        for widget_id in widgets {
            self.transport
                .notify(WidgetNotification::device_update(widget_id, &key.device_id, &key.capability, value.clone()));
        }
    }

    /// Stores a freshly created listener, unless every subscriber left while it was being created.
    async fn activate(&self, key: &SubscriptionKey, ticket: u64, handle: Box<dyn ListenerHandle>) {
        let orphan = {
            let mut state = self.state();
            match state.listeners.get_mut(key) {
                Some(slot) if slot.is_installation(ticket) => {
                    *slot = ListenerSlot::Active(handle);
                    None
                }
                _ => Some(handle),
            }
        };

        match orphan {
            None => info!(%key, "👂 Listening to '{}' of device '{}'", key.capability, key.device_id),
            Some(handle) => {
                debug!(%key, "Every subscriber left during installation, releasing the new listener");
                self.release(key, handle).await;
            }
        }
    }

    /// Rolls back the subscriptions that were waiting for a listener that could not be installed.
    fn abandon(&self, key: &SubscriptionKey, ticket: u64) {
        let mut guard = self.state();
        let state = &mut *guard;

        if state.listeners.get(key).is_some_and(|slot| slot.is_installation(ticket)) {
            state.listeners.remove(key);
            let widgets = state.subscriptions.remove(key).unwrap_or_default();
            debug!(%key, widgets = widgets.len(), "Rolled back subscriptions");
        }
    }

    async fn release(&self, key: &SubscriptionKey, handle: Box<dyn ListenerHandle>) {
        match handle.destroy().await {
            Ok(()) => info!(%key, "🔇 Stopped listening to '{}' of device '{}'", key.capability, key.device_id),
            Err(error) => warn!(%key, "⚠️ Could not destroy the listener for '{}': {}", key, error),
        }
    }
}

/// Rolls the slot back when an installation ends without settling it, e.g. when the task panics.
struct InstallGuard {
    inner: Arc<Inner>,
    key: SubscriptionKey,
    ticket: u64,
    settled: bool,
}

impl Drop for InstallGuard {
    fn drop(&mut self) {
        if !self.settled {
            warn!(key = %self.key, "⚠️ Listener installation was interrupted, rolling back");
            self.inner.abandon(&self.key, self.ticket);
        }
    }
}

async fn install_listener(inner: Arc<Inner>, key: SubscriptionKey, ticket: u64, outcome: watch::Sender<Installation>) {
    debug!(%key, "Installing upstream listener...");
    let mut guard = InstallGuard {
        inner: inner.clone(),
        key: key.clone(),
        ticket,
        settled: false,
    };
    let callback = fan_out_callback(Arc::downgrade(&inner), key.clone());

    let installed = match inner.directory.get_device(&key.device_id).await {
        Ok(device) => device.create_capability_listener(&key.capability, callback).await,
        Err(error) => Err(error),
    };

    let result = match installed {
        Ok(handle) => {
            inner.activate(&key, ticket, handle).await;
            Ok(())
        }
        Err(error) => {
            warn!(%key, "⚠️ Could not install a listener for '{}': {}", key, error);
            inner.abandon(&key, ticket);
            Err(SubscriptionError::from_directory(&key, error))
        }
    };

    guard.settled = true;
    outcome.send_replace(Some(result));
}

fn fan_out_callback(inner: Weak<Inner>, key: SubscriptionKey) -> CapabilityCallback {
    Arc::new(move |value| {
        if let Some(inner) = inner.upgrade() {
            inner.fan_out(&key, value);
        }
    })
}
