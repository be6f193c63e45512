use crate::domain::floor::{FloorRecord, PlacedDeviceRecord, Position, RuleRecord, SelectedFloor};
use crate::domain::WidgetId;
use crate::settings::{SettingsError, SettingsStore};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

const FLOORS_KEY: &str = "floors";
const SELECTED_FLOORS_KEY: &str = "selectedFloors";

type Selections = BTreeMap<WidgetId, SelectedFloor>;

#[derive(Error, Debug)]
pub enum FloorStoreError {
    #[error("floor '{0}' not found")]
    FloorNotFound(String),
    #[error("device '{device_id}' is not placed on floor '{floor_id}'")]
    PlacedDeviceNotFound { floor_id: String, device_id: String },
    #[error("position ({x}, {y}) is outside the floor plan")]
    InvalidPosition { x: f64, y: f64 },
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("stored floors are malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloorUpdate {
    pub name: Option<String>,
    pub image_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlacedDevice {
    pub homey_id: String,
    pub capability: String,
    pub position: Position,
    pub icon_obj: Option<serde_json::Value>,
    pub sensor_type: Option<String>,
}

/// Floors, their placed devices and the floor each widget shows, persisted in the settings blob.
///
/// Every read-modify-write cycle runs under one lock so concurrent edits never overwrite each other.
#[derive(Debug)]
pub struct FloorStore {
    settings: Arc<dyn SettingsStore>,
    lock: Mutex<()>,
}

impl FloorStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        FloorStore {
            settings,
            lock: Mutex::new(()),
        }
    }

    pub async fn floors(&self) -> Result<Vec<FloorRecord>, FloorStoreError> {
        self.load(FLOORS_KEY).await
    }

    pub async fn floor(&self, floor_id: &str) -> Result<FloorRecord, FloorStoreError> {
        self.floors()
            .await?
            .into_iter()
            .find(|floor| floor.id == floor_id)
            .ok_or_else(|| FloorStoreError::FloorNotFound(floor_id.to_string()))
    }

    #[instrument(skip(self, image_data))]
    pub async fn add_floor(&self, name: &str, image_data: Option<String>) -> Result<FloorRecord, FloorStoreError> {
        let floor = FloorRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            image_data,
            devices: vec![],
        };

        let added = floor.clone();
        self.modify_floors(move |floors| {
            floors.push(floor);
            Ok(())
        })
        .await?;

        info!(floor_id = added.id, "🏠 Added floor '{}'", added.name);
        Ok(added)
    }

    #[instrument(skip(self, update))]
    pub async fn update_floor(&self, floor_id: &str, update: FloorUpdate) -> Result<FloorRecord, FloorStoreError> {
        self.modify_floors(|floors| {
            let floor = find_floor(floors, floor_id)?;
            if let Some(name) = update.name {
                floor.name = name;
            }
            if let Some(image_data) = update.image_data {
                floor.image_data = Some(image_data);
            }
            Ok(floor.clone())
        })
        .await
    }

    /// Deletes a floor together with every widget selection pointing at it.
    #[instrument(skip(self))]
    pub async fn delete_floor(&self, floor_id: &str) -> Result<(), FloorStoreError> {
        let _guard = self.lock.lock().await;

        let mut floors: Vec<FloorRecord> = self.load(FLOORS_KEY).await?;
        let before = floors.len();
        floors.retain(|floor| floor.id != floor_id);
        if floors.len() == before {
            return Err(FloorStoreError::FloorNotFound(floor_id.to_string()));
        }
        self.save(FLOORS_KEY, &floors).await?;

        let mut selections: Selections = self.load(SELECTED_FLOORS_KEY).await?;
        selections.retain(|_, selected| selected.floor_id != floor_id);
        self.save(SELECTED_FLOORS_KEY, &selections).await?;

        info!(floor_id, "🏠 Deleted floor");
        Ok(())
    }

    #[instrument(skip(self, device), fields(homey_id = device.homey_id))]
    pub async fn add_device(&self, floor_id: &str, device: NewPlacedDevice) -> Result<PlacedDeviceRecord, FloorStoreError> {
        check_position(&device.position)?;

        self.modify_floors(|floors| {
            let floor = find_floor(floors, floor_id)?;
            let placed = PlacedDeviceRecord {
                id: Uuid::new_v4().to_string(),
                homey_id: device.homey_id,
                capability: device.capability,
                position: device.position,
                rules: vec![],
                icon_obj: device.icon_obj,
                sensor_type: device.sensor_type,
            };
            floor.devices.push(placed.clone());
            Ok(placed)
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn move_device(&self, floor_id: &str, placed_id: &str, position: Position) -> Result<(), FloorStoreError> {
        check_position(&position)?;

        self.modify_floors(|floors| {
            find_device(floors, floor_id, placed_id)?.position = position;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, rules))]
    pub async fn update_device_rules(&self, floor_id: &str, placed_id: &str, rules: Vec<RuleRecord>) -> Result<(), FloorStoreError> {
        self.modify_floors(|floors| {
            find_device(floors, floor_id, placed_id)?.rules = rules;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn remove_device(&self, floor_id: &str, placed_id: &str) -> Result<(), FloorStoreError> {
        self.modify_floors(|floors| {
            let floor = find_floor(floors, floor_id)?;
            let before = floor.devices.len();
            floor.devices.retain(|device| device.id != placed_id);
            if floor.devices.len() == before {
                return Err(FloorStoreError::PlacedDeviceNotFound {
                    floor_id: floor_id.to_string(),
                    device_id: placed_id.to_string(),
                });
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn select_floor(&self, widget_id: &str, floor_id: &str) -> Result<SelectedFloor, FloorStoreError> {
        let _guard = self.lock.lock().await;

        let floors: Vec<FloorRecord> = self.load(FLOORS_KEY).await?;
        if !floors.iter().any(|floor| floor.id == floor_id) {
            return Err(FloorStoreError::FloorNotFound(floor_id.to_string()));
        }

        let selected = SelectedFloor {
            floor_id: floor_id.to_string(),
            timestamp: Utc::now(),
        };
        let mut selections: Selections = self.load(SELECTED_FLOORS_KEY).await?;
        selections.insert(widget_id.to_string(), selected.clone());
        self.save(SELECTED_FLOORS_KEY, &selections).await?;

        Ok(selected)
    }

    pub async fn selected_floor(&self, widget_id: &str) -> Result<Option<SelectedFloor>, FloorStoreError> {
        Ok(self.selected_floors().await?.remove(widget_id))
    }

    pub async fn selected_floors(&self) -> Result<Selections, FloorStoreError> {
        self.load(SELECTED_FLOORS_KEY).await
    }

    async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, FloorStoreError> {
        match self.settings.get(key).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(T::default()),
        }
    }

    async fn save<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), FloorStoreError> {
        self.settings.set(key, serde_json::to_value(value)?).await?;
        Ok(())
    }

    async fn modify_floors<T, F>(&self, modify: F) -> Result<T, FloorStoreError>
    where
        F: FnOnce(&mut Vec<FloorRecord>) -> Result<T, FloorStoreError>,
    {
        let _guard = self.lock.lock().await;

        let mut floors: Vec<FloorRecord> = self.load(FLOORS_KEY).await?;
        let result = modify(&mut floors)?;
        self.save(FLOORS_KEY, &floors).await?;
        Ok(result)
    }
}

fn check_position(position: &Position) -> Result<(), FloorStoreError> {
    if position.is_within_bounds() {
        Ok(())
    } else {
        Err(FloorStoreError::InvalidPosition { x: position.x, y: position.y })
    }
}

fn find_floor<'a>(floors: &'a mut [FloorRecord], floor_id: &str) -> Result<&'a mut FloorRecord, FloorStoreError> {
    floors
        .iter_mut()
        .find(|floor| floor.id == floor_id)
        .ok_or_else(|| FloorStoreError::FloorNotFound(floor_id.to_string()))
}

fn find_device<'a>(floors: &'a mut [FloorRecord], floor_id: &str, placed_id: &str) -> Result<&'a mut PlacedDeviceRecord, FloorStoreError> {
    find_floor(floors, floor_id)?
        .device_mut(placed_id)
        .ok_or_else(|| FloorStoreError::PlacedDeviceNotFound {
            floor_id: floor_id.to_string(),
            device_id: placed_id.to_string(),
        })
}
