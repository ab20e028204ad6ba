//! Joule BLE
//!
//! Connection and characteristic I/O for a Joule sous-vide circulator.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use joule_ble::{BtleplugTransport, JouleBle};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = BtleplugTransport::new(Duration::from_secs(10));
//!     let ble = JouleBle::new("AA:BB:CC:DD:EE:FF", transport)?;
//!
//!     ble.ensure_connected()?;
//!     ble.subscribe(|n| println!("{} bytes from {}", n.value.len(), n.characteristic))?;
//!     ble.write(&joule_proto::build_live_feed_message(1))?;
//!
//!     ble.shutdown();
//!     Ok(())
//! }
//! ```

mod adapter;
mod btleplug_backend;
mod simulator;
mod transport;

pub use adapter::{BleError, JouleBle, NotificationHandler};
pub use btleplug_backend::BtleplugTransport;
pub use simulator::{SimulatedJoule, SimulatorHandle};
pub use transport::{
    BleTransport, Characteristic, Notification, NotificationStream, SERVICE_UUID, TransportError,
};
