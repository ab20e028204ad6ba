//! Real radio access through `btleplug`.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::time::{Instant, sleep};

use crate::transport::{
    BleTransport, Characteristic, Notification, NotificationStream, SERVICE_UUID, TransportError,
};

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Transport over the host's first Bluetooth adapter.
pub struct BtleplugTransport {
    scan_timeout: Duration,
    peripheral: Option<Peripheral>,
}

impl BtleplugTransport {
    /// `scan_timeout` bounds how long `connect` waits for the configured
    /// address to show up before giving up.
    pub fn new(scan_timeout: Duration) -> Self {
        Self { scan_timeout, peripheral: None }
    }

    fn peripheral(&self) -> Result<&Peripheral, TransportError> {
        self.peripheral.as_ref().ok_or(TransportError::NotConnected)
    }

    fn characteristic(
        &self,
        characteristic: Characteristic,
    ) -> Result<(&Peripheral, btleplug::api::Characteristic), TransportError> {
        let peripheral = self.peripheral()?;
        let uuid = characteristic.uuid();
        let found = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(TransportError::CharacteristicNotFound(characteristic))?;
        Ok((peripheral, found))
    }
}

/// Get the default Bluetooth adapter
async fn get_adapter() -> Result<Adapter, TransportError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(TransportError::NoAdapter)
}

/// Find the peripheral with the given address (case-insensitive)
async fn find_device(
    adapter: &Adapter,
    address: &str,
    scan_timeout: Duration,
) -> Result<Peripheral, TransportError> {
    adapter.start_scan(ScanFilter::default()).await?;
    let deadline = Instant::now() + scan_timeout;

    let found = loop {
        let mut found = None;
        for peripheral in adapter.peripherals().await? {
            if peripheral.address().to_string().eq_ignore_ascii_case(address) {
                found = Some(peripheral);
                break;
            }
        }
        if found.is_some() || Instant::now() >= deadline {
            break found;
        }
        sleep(SCAN_POLL_INTERVAL).await;
    };

    if let Err(e) = adapter.stop_scan().await {
        log::debug!("failed to stop scan cleanly: {e}");
    }
    found.ok_or_else(|| TransportError::DeviceNotFound(address.to_string()))
}

#[async_trait]
impl BleTransport for BtleplugTransport {
    async fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        let adapter = get_adapter().await?;
        let device = find_device(&adapter, address, self.scan_timeout).await?;

        device.connect().await?;
        let discovered = match device.discover_services().await {
            Ok(()) if device.services().iter().any(|s| s.uuid == SERVICE_UUID) => Ok(()),
            Ok(()) => Err(TransportError::ServiceNotFound(address.to_string())),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = discovered {
            if let Err(cleanup) = device.disconnect().await {
                log::debug!("failed to disconnect from {address} after setup error: {cleanup}");
            }
            return Err(e);
        }

        self.peripheral = Some(device);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match &self.peripheral {
            Some(p) => p.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(device) = self.peripheral.take() {
            device.disconnect().await?;
        }
        Ok(())
    }

    async fn write(
        &mut self,
        characteristic: Characteristic,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let (device, c) = self.characteristic(characteristic)?;
        device.write(&c, payload, WriteType::WithoutResponse).await?;
        Ok(())
    }

    async fn read(&mut self, characteristic: Characteristic) -> Result<Vec<u8>, TransportError> {
        let (device, c) = self.characteristic(characteristic)?;
        Ok(device.read(&c).await?)
    }

    async fn subscribe(
        &mut self,
        characteristic: Characteristic,
    ) -> Result<NotificationStream, TransportError> {
        let (device, c) = self.characteristic(characteristic)?;
        device.subscribe(&c).await?;
        let notifications = device.notifications().await?;

        let stream = notifications.filter_map(move |n| async move {
            let source = Characteristic::from_uuid(n.uuid)?;
            (source == characteristic).then_some(Notification {
                characteristic: source,
                value: n.value,
            })
        });
        Ok(Box::pin(stream))
    }

    async fn unsubscribe(&mut self, characteristic: Characteristic) -> Result<(), TransportError> {
        let (device, c) = self.characteristic(characteristic)?;
        device.unsubscribe(&c).await?;
        Ok(())
    }
}
