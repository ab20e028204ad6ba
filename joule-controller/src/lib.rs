//! Joule Controller
//!
//! Keeps one BLE connection to a Joule circulator, polls it for telemetry and
//! exposes the result as a [`Snapshot`]. Control actions (start, stop) go
//! through the same [`Coordinator`], which serializes all device access.
//!
//! # Example
//!
//! ```ignore
//! use joule_ble::BtleplugTransport;
//! use joule_controller::{Coordinator, CoordinatorConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CoordinatorConfig::new("AA:BB:CC:DD:EE:FF");
//!     let transport = BtleplugTransport::new(config.scan_timeout());
//!     let mut joule = Coordinator::new(config, transport)?;
//!
//!     joule.start_cooking(62.5, 90.0)?;
//!     let snapshot = joule.poll()?;
//!     println!("{:.1} °C, cooking: {}", snapshot.current_temperature, snapshot.is_cooking);
//!
//!     joule.shutdown();
//!     Ok(())
//! }
//! ```

mod config;
mod coordinator;
mod snapshot;

pub use config::{
    ConfigError, CoordinatorConfig, DEFAULT_COOK_TIME_MINUTES, DEFAULT_FEED_TIMEOUT_SECS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SCAN_TIMEOUT_SECS, DEFAULT_TARGET_TEMPERATURE,
    default_config_path, joule_home,
};
pub use joule_proto::{ErrorState, ProgramStep};

pub use coordinator::{ControlError, Coordinator, PollError};
pub use snapshot::{
    MAX_COOK_TIME_MINUTES, MAX_TARGET_TEMPERATURE, MIN_COOK_TIME_MINUTES, MIN_TARGET_TEMPERATURE,
    ParseUnitError, Snapshot, TemperatureUnit, is_cooking, minutes_to_seconds,
};
