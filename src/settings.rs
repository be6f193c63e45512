use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Key/value settings of the dashboard, stored as one JSON blob.
#[async_trait]
pub trait SettingsStore: Debug + Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, SettingsError>;

    async fn set(&self, key: &str, value: JsonValue) -> Result<(), SettingsError>;
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not access the settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("settings file '{0}' does not contain a JSON object")]
    NotAnObject(PathBuf),
}

/// Settings persisted to a single JSON file. A missing file reads as empty settings.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSettings {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonFileSettings {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<Map<String, JsonValue>, SettingsError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(error) => return Err(error.into()),
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&content)? {
            JsonValue::Object(map) => Ok(map),
            _ => Err(SettingsError::NotAnObject(self.path.clone())),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettings {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, SettingsError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.remove(key))
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: JsonValue) -> Result<(), SettingsError> {
        let _guard = self.lock.lock().await;
        let mut settings = self.read().await?;
        settings.insert(key.to_string(), value);

        fs::write(&self.path, serde_json::to_vec_pretty(&settings)?).await?;
        debug!("Stored setting '{}'", key);
        Ok(())
    }
}

#[cfg(test)]
pub use memory::InMemorySettings;

#[cfg(test)]
mod memory {
    use super::{SettingsError, SettingsStore};
    use async_trait::async_trait;
    use serde_json::Value as JsonValue;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct InMemorySettings {
        values: Mutex<HashMap<String, JsonValue>>,
    }

    #[async_trait]
    impl SettingsStore for InMemorySettings {
        async fn get(&self, key: &str) -> Result<Option<JsonValue>, SettingsError> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: JsonValue) -> Result<(), SettingsError> {
            self.values.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let settings = JsonFileSettings::new(dir.path().join("settings.json"));

        assert_eq!(settings.get("floors").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = JsonFileSettings::new(&path);

        settings.set("floors", json!([])).await.unwrap();
        settings.set("selectedFloors", json!({ "w1": { "floorId": "f1", "timestamp": 1 } })).await.unwrap();

        let reopened = JsonFileSettings::new(&path);
        assert_eq!(reopened.get("floors").await.unwrap(), Some(json!([])));
        assert_eq!(reopened.get("selectedFloors").await.unwrap().unwrap()["w1"]["floorId"], "f1");
    }

    #[tokio::test]
    async fn rejects_files_that_are_not_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let result = JsonFileSettings::new(&path).get("floors").await;

        assert!(matches!(result, Err(SettingsError::NotAnObject(_))));
    }
}
