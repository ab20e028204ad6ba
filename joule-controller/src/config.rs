//! Coordinator configuration, persisted as `config.json` in JOULE_HOME

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::snapshot::TemperatureUnit;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_FEED_TIMEOUT_SECS: f64 = 10.0;
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 10;
/// °C
pub const DEFAULT_TARGET_TEMPERATURE: f32 = 60.0;
pub const DEFAULT_COOK_TIME_MINUTES: f32 = 0.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings for one coordinator and the device it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Bluetooth address of the circulator, e.g. "AA:BB:CC:DD:EE:FF"
    pub address: String,
    pub poll_interval_secs: u64,
    /// How long a poll waits for telemetry after requesting it
    pub feed_timeout_secs: f64,
    pub feed_id: u32,
    pub scan_timeout_secs: u64,
    pub target_temperature: f32,
    pub cook_time_minutes: f32,
    pub temperature_unit: TemperatureUnit,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            feed_timeout_secs: DEFAULT_FEED_TIMEOUT_SECS,
            feed_id: joule_proto::DEFAULT_FEED_ID,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            target_temperature: DEFAULT_TARGET_TEMPERATURE,
            cook_time_minutes: DEFAULT_COOK_TIME_MINUTES,
            temperature_unit: TemperatureUnit::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), ..Self::default() }
    }

    pub fn with_feed_timeout(mut self, timeout: Duration) -> Self {
        self.feed_timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Falls back to the default when the stored value is negative or not finite.
    pub fn feed_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.feed_timeout_secs)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_FEED_TIMEOUT_SECS))
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    /// Load from `path`, or defaults if the file does not exist yet
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&data)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        fs::write(path, data).map_err(io_err)
    }
}

/// JOULE_HOME, or `<config dir>/joule` when unset
pub fn joule_home() -> Option<PathBuf> {
    std::env::var_os("JOULE_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|dir| dir.join("joule")))
}

pub fn default_config_path() -> Option<PathBuf> {
    joule_home().map(|home| home.join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.feed_timeout(), Duration::from_secs(10));
        assert_eq!(config.feed_id, 1);
        assert_eq!(config.target_temperature, 60.0);
        assert_eq!(config.cook_time_minutes, 0.0);
        assert_eq!(config.temperature_unit, TemperatureUnit::Fahrenheit);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: CoordinatorConfig =
            serde_json::from_str(r#"{"address": "AA:BB:CC:DD:EE:FF", "temperature_unit": "°C"}"#)
                .unwrap();
        assert_eq!(config.address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(config.temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(config.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn feed_timeout_override() {
        let config = CoordinatorConfig::default().with_feed_timeout(Duration::from_millis(50));
        assert_eq!(config.feed_timeout(), Duration::from_millis(50));

        let broken = CoordinatorConfig { feed_timeout_secs: -1.0, ..CoordinatorConfig::default() };
        assert_eq!(broken.feed_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("joule-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.json");

        assert_eq!(CoordinatorConfig::load(&path).unwrap(), CoordinatorConfig::default());

        let config = CoordinatorConfig { poll_interval_secs: 5, ..CoordinatorConfig::new("11:22:33:44:55:66") };
        config.save(&path).unwrap();
        assert_eq!(CoordinatorConfig::load(&path).unwrap(), config);

        fs::write(&path, "not json").unwrap();
        assert!(matches!(CoordinatorConfig::load(&path), Err(ConfigError::Parse { .. })));

        fs::remove_dir_all(&dir).unwrap();
    }
}
