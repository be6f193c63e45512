use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    core: Core,
    settings: Settings,
    simulation: Simulation,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(config::File::with_name("config").required(true))
                .add_source(config::File::with_name("config_local").required(false))
                .add_source(config::Environment::default().separator("__")),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }
}

#[derive(Debug, Deserialize)]
pub struct Core {
    notification_buffer_size: usize,
}

impl Core {
    pub fn notification_buffer_size(&self) -> usize {
        self.notification_buffer_size
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    path: PathBuf,
}

impl Settings {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Deserialize)]
pub struct Simulation {
    devices_file: PathBuf,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    #[serde(with = "humantime_serde")]
    interval: Duration,
}

fn enabled_by_default() -> bool {
    true
}

impl Simulation {
    pub fn devices_file(&self) -> &Path {
        &self.devices_file
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn new() -> Self {
        AppConfigBuilder {
            config: AppConfig {
                core: Core { notification_buffer_size: 16 },
                settings: Settings {
                    path: PathBuf::from("settings.json"),
                },
                simulation: Simulation {
                    devices_file: PathBuf::from("devices.json"),
                    enabled: false,
                    interval: Duration::from_millis(50),
                },
            },
        }
    }

    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.settings.path = path.into();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use pretty_assertions::assert_eq;

    fn from_toml(toml: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::from_builder(Config::builder().add_source(config::File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn reads_every_section() {
        let config = from_toml(
            r#"
            [core]
            notification_buffer_size = 64

            [settings]
            path = "data/settings.json"

            [simulation]
            devices_file = "devices.json"
            enabled = false
            interval = "2s 500ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.core().notification_buffer_size(), 64);
        assert_eq!(config.settings().path(), Path::new("data/settings.json"));
        assert_eq!(config.simulation().devices_file(), Path::new("devices.json"));
        assert!(!config.simulation().enabled());
        assert_eq!(config.simulation().interval(), Duration::from_millis(2500));
    }

    #[test]
    fn simulation_is_enabled_unless_switched_off() {
        let config = from_toml(
            r#"
            [core]
            notification_buffer_size = 1
            [settings]
            path = "settings.json"
            [simulation]
            devices_file = "devices.json"
            interval = "1s"
            "#,
        )
        .unwrap();

        assert!(config.simulation().enabled());
    }

    #[test]
    fn missing_sections_are_reported() {
        assert!(from_toml("[core]\nnotification_buffer_size = 1").is_err());
    }
}
