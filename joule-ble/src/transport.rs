//! The BLE capability the adapter drives.
//!
//! Anything that can connect to an address, write/read the Joule
//! characteristics and stream notifications can stand in for the radio:
//! [`crate::BtleplugTransport`] for real hardware, [`crate::SimulatedJoule`]
//! for tests and dry runs.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

// Joule Service UUID (custom 128-bit UUID)
// Format: 700b4321-9836-4383-a2b2-31a9098d1473
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x700b4321_9836_4383_a2b2_31a9098d1473);

// Characteristic UUIDs
const WRITE_UUID: Uuid = Uuid::from_u128(0x700b4322_9836_4383_a2b2_31a9098d1473);
const READ_UUID: Uuid = Uuid::from_u128(0x700b4323_9836_4383_a2b2_31a9098d1473);
const SUBSCRIBE_UUID: Uuid = Uuid::from_u128(0x700b4325_9836_4383_a2b2_31a9098d1473);
const FILE_UUID: Uuid = Uuid::from_u128(0x700b4326_9836_4383_a2b2_31a9098d1473);

/// The four fixed characteristics of the Joule service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Write,
    Read,
    Subscribe,
    File,
}

impl Characteristic {
    pub fn uuid(self) -> Uuid {
        match self {
            Self::Write => WRITE_UUID,
            Self::Read => READ_UUID,
            Self::Subscribe => SUBSCRIBE_UUID,
            Self::File => FILE_UUID,
        }
    }

    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        [Self::Write, Self::Read, Self::Subscribe, Self::File]
            .into_iter()
            .find(|c| c.uuid() == uuid)
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} characteristic ({})", self, self.uuid())
    }
}

/// One value pushed by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub characteristic: Characteristic,
    pub value: Vec<u8>,
}

pub type NotificationStream = Pin<Box<dyn Stream<Item = Notification> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Btleplug(#[from] btleplug::Error),
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("device {0} not found")]
    DeviceNotFound(String),
    #[error("device {0} does not expose the Joule service")]
    ServiceNotFound(String),
    #[error("{0} not found on device")]
    CharacteristicNotFound(Characteristic),
    #[error("not connected")]
    NotConnected,
    #[error("{0}")]
    Simulated(String),
}

/// Connection-level operations on a single peripheral.
///
/// Implementations are driven from one task at a time; they do not need to
/// be safe under concurrent calls.
#[async_trait]
pub trait BleTransport: Send + Sync + 'static {
    async fn connect(&mut self, address: &str) -> Result<(), TransportError>;

    /// Whether the link is still up. Used to detect drops between calls.
    async fn is_connected(&self) -> bool;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    async fn write(
        &mut self,
        characteristic: Characteristic,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    async fn read(&mut self, characteristic: Characteristic) -> Result<Vec<u8>, TransportError>;

    async fn subscribe(
        &mut self,
        characteristic: Characteristic,
    ) -> Result<NotificationStream, TransportError>;

    async fn unsubscribe(&mut self, characteristic: Characteristic) -> Result<(), TransportError>;
}
