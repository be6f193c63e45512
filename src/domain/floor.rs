use crate::domain::{CapabilityKind, SubscriptionKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_ALARM: &str = "alarm_contact";
const DEFAULT_MEASURE: &str = "measure_temperature";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorRecord {
    pub id: String,
    pub name: String,
    #[serde(alias = "image", default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default)]
    pub devices: Vec<PlacedDeviceRecord>,
}

impl FloorRecord {
    pub fn device(&self, placed_id: &str) -> Option<&PlacedDeviceRecord> {
        self.devices.iter().find(|device| device.id == placed_id)
    }

    pub fn device_mut(&mut self, placed_id: &str) -> Option<&mut PlacedDeviceRecord> {
        self.devices.iter_mut().find(|device| device.id == placed_id)
    }

    /// Every (device, capability) pair a widget showing this floor listens to, without duplicates.
    pub fn subscription_keys(&self) -> Vec<SubscriptionKey> {
        let mut keys: Vec<SubscriptionKey> = Vec::new();
        for key in self.devices.iter().flat_map(PlacedDeviceRecord::subscription_keys) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedDeviceRecord {
    pub id: String,
    pub homey_id: String,
    pub capability: String,
    pub position: Position,
    #[serde(default)]
    pub rules: Vec<RuleRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_obj: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
}

impl PlacedDeviceRecord {
    pub fn subscription_keys(&self) -> Vec<SubscriptionKey> {
        let device_id = self.homey_id.as_str();
        match self.capability.parse::<CapabilityKind>() {
            Ok(CapabilityKind::OnOff) => vec![SubscriptionKey::new(device_id, "onoff")],
            Ok(CapabilityKind::Dim) => vec![SubscriptionKey::new(device_id, "dim"), SubscriptionKey::new(device_id, "onoff")],
            Ok(CapabilityKind::Sensor) => vec![SubscriptionKey::new(device_id, self.sensor_type.as_deref().unwrap_or(DEFAULT_ALARM))],
            Ok(CapabilityKind::Measure) => vec![SubscriptionKey::new(device_id, self.sensor_type.as_deref().unwrap_or(DEFAULT_MEASURE))],
            Err(_) => vec![SubscriptionKey::new(device_id, self.capability.as_str())],
        }
    }
}

/// Position on the floor plan, in percent of the image size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn is_within_bounds(&self) -> bool {
        (0.0..=100.0).contains(&self.x) && (0.0..=100.0).contains(&self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedFloor {
    pub floor_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}
