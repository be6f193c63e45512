//! Drives the in-memory directory so widgets have something to show without a real hub.

use crate::directory::{InMemoryDirectory, SimulatedDevice};
use crate::domain::Value;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

const DIM_STEP: f64 = 0.25;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("could not read the devices file: {0}")]
    Io(#[from] std::io::Error),
    #[error("devices file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Reads a JSON array of devices and builds a directory from it.
pub async fn load_devices(path: impl AsRef<Path>) -> Result<InMemoryDirectory, SimulationError> {
    let content = fs::read_to_string(path.as_ref()).await?;
    let devices: Vec<SimulatedDevice> = serde_json::from_str(&content)?;
    info!("📦 Loaded {} simulated device(s)", devices.len());
    Ok(InMemoryDirectory::from_devices(devices))
}

/// Advances every device one step: dimmers move to the next level, other switches and alarms flip.
pub fn simulate_tick(directory: &InMemoryDirectory) {
    for device in directory.devices() {
        for (capability, value) in next_values(&device) {
            debug!(device_id = device.id, "[Sim] {} -> {}", capability, value);
            if let Err(error) = directory.update(&device.id, &capability, value) {
                warn!(device_id = device.id, "⚠️ Simulated update failed: {}", error);
            }
        }
    }
}

fn next_values(device: &SimulatedDevice) -> Vec<(String, Value)> {
    let dimmable = device.capabilities.contains_key("dim");

    device
        .capabilities
        .iter()
        .flat_map(|(capability, value)| match (capability.as_str(), value) {
            ("dim", value) => {
                let level = next_level(value.as_f64().unwrap_or(0.0));
                vec![("dim".to_string(), Value::Number(level)), ("onoff".to_string(), Value::Boolean(level > 0.0))]
            }
            ("onoff", _) if dimmable => vec![],
            (_, Value::Boolean(on)) => vec![(capability.clone(), Value::Boolean(!on))],
            _ => vec![],
        })
        .collect()
}

fn next_level(level: f64) -> f64 {
    let next = ((level / DIM_STEP).round() + 1.0) * DIM_STEP;
    if next > 1.0 { 0.0 } else { next }
}

pub fn run_simulation(directory: InMemoryDirectory, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            simulate_tick(&directory);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory::from_devices([
            SimulatedDevice::new("lamp", "Lamp").with("onoff", true).with("dim", 0.5),
            SimulatedDevice::new("plug", "Plug").with("onoff", false),
            SimulatedDevice::new("door", "Door").with("alarm_contact", false),
            SimulatedDevice::new("climate", "Climate").with("measure_temperature", 20.0),
        ])
    }

    #[rstest]
    #[case(0.0, 0.25)]
    #[case(0.5, 0.75)]
    #[case(0.75, 1.0)]
    #[case(1.0, 0.0)]
    #[case(0.3, 0.5)]
    fn dim_levels_cycle(#[case] level: f64, #[case] expected: f64) {
        assert_eq!(next_level(level), expected);
    }

    #[test_log::test]
    fn tick_flips_switches_and_alarms() {
        let directory = directory();

        simulate_tick(&directory);

        assert_eq!(directory.value("plug", "onoff"), Some(Value::Boolean(true)));
        assert_eq!(directory.value("door", "alarm_contact"), Some(Value::Boolean(true)));
        assert_eq!(directory.value("climate", "measure_temperature"), Some(Value::Number(20.0)));
    }

    #[test_log::test]
    fn dimmers_keep_onoff_in_step() {
        let directory = directory();

        simulate_tick(&directory);
        assert_eq!(directory.value("lamp", "dim"), Some(Value::Number(0.75)));
        assert_eq!(directory.value("lamp", "onoff"), Some(Value::Boolean(true)));

        simulate_tick(&directory);
        simulate_tick(&directory);
        assert_eq!(directory.value("lamp", "dim"), Some(Value::Number(0.0)));
        assert_eq!(directory.value("lamp", "onoff"), Some(Value::Boolean(false)));
    }

    #[test_log::test(tokio::test)]
    async fn loads_devices_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        std::fs::write(
            &path,
            r#"[{ "id": "lamp", "name": "Lamp", "capabilities": { "onoff": true, "dim": 0.4 } }]"#,
        )
        .unwrap();

        let directory = load_devices(&path).await.unwrap();

        assert_eq!(directory.value("lamp", "dim"), Some(Value::Number(0.4)));
    }

    #[test_log::test(tokio::test)]
    async fn malformed_devices_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        std::fs::write(&path, r#"{ "id": "lamp" }"#).unwrap();

        assert!(matches!(load_devices(&path).await, Err(SimulationError::Malformed(_))));
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn simulation_ticks_on_its_interval() {
        let directory = directory();
        let handle = run_simulation(directory.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.abort();

        assert_eq!(directory.value("plug", "onoff"), Some(Value::Boolean(true)));
    }
}
