//! Blocking adapter around a [`BleTransport`].
//!
//! The transport is async and must never be driven by two callers at once.
//! [`JouleBle`] moves it onto a dedicated worker thread with its own tokio
//! runtime and feeds it one command at a time through a bounded queue; every
//! public method blocks until the worker answers. Callers never see the
//! runtime.
//!
//! Because the methods block, they must not be called from inside an async
//! context.

use std::thread;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::transport::{BleTransport, Characteristic, Notification, TransportError};

const COMMAND_QUEUE_DEPTH: usize = 8;

pub type NotificationHandler = Box<dyn Fn(Notification) + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum BleError {
    #[error("not connected to {0}")]
    NotConnected(String),
    #[error("failed to connect to {address}")]
    ConnectionFailed {
        address: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to write to {characteristic}")]
    WriteFailed {
        characteristic: Characteristic,
        #[source]
        source: TransportError,
    },
    #[error("failed to read {characteristic}")]
    ReadFailed {
        characteristic: Characteristic,
        #[source]
        source: TransportError,
    },
    #[error("failed to subscribe to {characteristic}")]
    SubscribeFailed {
        characteristic: Characteristic,
        #[source]
        source: TransportError,
    },
    #[error("a notification handler is already registered for this connection")]
    AlreadySubscribed,
    #[error("BLE worker has stopped")]
    WorkerStopped,
}

enum Command {
    Connect(oneshot::Sender<Result<(), BleError>>),
    EnsureConnected(oneshot::Sender<Result<bool, BleError>>),
    Disconnect(oneshot::Sender<()>),
    Write(Vec<u8>, oneshot::Sender<Result<(), BleError>>),
    Read(Characteristic, oneshot::Sender<Result<Vec<u8>, BleError>>),
    Subscribe(NotificationHandler, oneshot::Sender<Result<(), BleError>>),
}

/// Owns one BLE connection to a Joule and its characteristic I/O.
pub struct JouleBle {
    address: String,
    commands: mpsc::Sender<Command>,
    worker: thread::JoinHandle<()>,
}

impl JouleBle {
    /// Start the worker thread for `transport`. Nothing is connected yet.
    pub fn new<T: BleTransport>(address: impl Into<String>, transport: T) -> std::io::Result<Self> {
        let address = address.into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let worker = Worker {
            transport,
            address: address.clone(),
            connected: false,
            notifications: None,
        };
        let worker = thread::Builder::new()
            .name("joule-ble".to_string())
            .spawn(move || runtime.block_on(worker.run(rx)))?;

        Ok(Self { address, commands, worker })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, BleError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .blocking_send(command(tx))
            .map_err(|_| BleError::WorkerStopped)?;
        rx.blocking_recv().map_err(|_| BleError::WorkerStopped)
    }

    /// Open a fresh connection, replacing any existing one.
    pub fn connect(&self) -> Result<(), BleError> {
        self.request(Command::Connect)?
    }

    /// Connect unless a live connection exists. Returns `true` when a new
    /// connection was established (and any earlier subscription is gone).
    pub fn ensure_connected(&self) -> Result<bool, BleError> {
        self.request(Command::EnsureConnected)?
    }

    /// Unsubscribe and close. Errors are logged, never returned.
    pub fn disconnect(&self) {
        if self.request(Command::Disconnect).is_err() {
            log::debug!("disconnect from {}: worker already stopped", self.address);
        }
    }

    /// Fire-and-forget write to the request characteristic.
    pub fn write(&self, payload: &[u8]) -> Result<(), BleError> {
        self.request(|tx| Command::Write(payload.to_vec(), tx))?
    }

    pub fn read(&self, characteristic: Characteristic) -> Result<Vec<u8>, BleError> {
        self.request(|tx| Command::Read(characteristic, tx))?
    }

    /// Register the handler for notifications on the subscribe characteristic.
    ///
    /// The handler runs on the worker thread; it should hand values off
    /// (e.g. into a channel) rather than do real work. One handler per
    /// connection.
    pub fn subscribe<F>(&self, handler: F) -> Result<(), BleError>
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        self.request(|tx| Command::Subscribe(Box::new(handler), tx))?
    }

    /// Disconnect and stop the worker thread.
    pub fn shutdown(self) {
        self.disconnect();
        let Self { commands, worker, .. } = self;
        drop(commands);
        if worker.join().is_err() {
            log::warn!("BLE worker thread panicked");
        }
    }
}

struct Worker<T> {
    transport: T,
    address: String,
    connected: bool,
    notifications: Option<JoinHandle<()>>,
}

impl<T: BleTransport> Worker<T> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Connect(reply) => {
                    let _ = reply.send(self.connect().await);
                }
                Command::EnsureConnected(reply) => {
                    let _ = reply.send(self.ensure_connected().await);
                }
                Command::Disconnect(reply) => {
                    self.disconnect().await;
                    let _ = reply.send(());
                }
                Command::Write(payload, reply) => {
                    let _ = reply.send(self.write(&payload).await);
                }
                Command::Read(characteristic, reply) => {
                    let _ = reply.send(self.read(characteristic).await);
                }
                Command::Subscribe(handler, reply) => {
                    let _ = reply.send(self.subscribe(handler).await);
                }
            }
        }

        // Every handle is gone; leave nothing open behind us.
        if self.connected {
            self.disconnect().await;
        }
    }

    fn drop_subscription(&mut self) {
        if let Some(task) = self.notifications.take() {
            task.abort();
        }
    }

    async fn connect(&mut self) -> Result<(), BleError> {
        if self.connected {
            self.disconnect().await;
        }
        self.drop_subscription();

        match self.transport.connect(&self.address).await {
            Ok(()) => {
                self.connected = true;
                log::info!("Connected to Joule at {}", self.address);
                Ok(())
            }
            Err(source) => {
                if let Err(e) = self.transport.disconnect().await {
                    log::debug!("cleanup after failed connect to {}: {e}", self.address);
                }
                Err(BleError::ConnectionFailed { address: self.address.clone(), source })
            }
        }
    }

    async fn ensure_connected(&mut self) -> Result<bool, BleError> {
        if self.connected {
            if self.transport.is_connected().await {
                return Ok(false);
            }
            log::warn!("Link to {} dropped, reconnecting", self.address);
        }
        self.connect().await.map(|()| true)
    }

    async fn disconnect(&mut self) {
        if self.notifications.is_some() {
            self.drop_subscription();
            if let Err(e) = self.transport.unsubscribe(Characteristic::Subscribe).await {
                log::warn!("Error unsubscribing from {}: {e}", self.address);
            }
        }
        if let Err(e) = self.transport.disconnect().await {
            log::warn!("Error during disconnect from {}: {e}", self.address);
        }
        if self.connected {
            log::info!("Disconnected from {}", self.address);
        }
        self.connected = false;
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), BleError> {
        let characteristic = Characteristic::Write;
        if !self.connected {
            return Err(BleError::WriteFailed { characteristic, source: TransportError::NotConnected });
        }
        self.transport
            .write(characteristic, payload)
            .await
            .map_err(|source| BleError::WriteFailed { characteristic, source })
    }

    async fn read(&mut self, characteristic: Characteristic) -> Result<Vec<u8>, BleError> {
        if !self.connected {
            return Err(BleError::NotConnected(self.address.clone()));
        }
        self.transport
            .read(characteristic)
            .await
            .map_err(|source| BleError::ReadFailed { characteristic, source })
    }

    async fn subscribe(&mut self, handler: NotificationHandler) -> Result<(), BleError> {
        let characteristic = Characteristic::Subscribe;
        if !self.connected {
            return Err(BleError::NotConnected(self.address.clone()));
        }
        if self.notifications.is_some() {
            return Err(BleError::AlreadySubscribed);
        }

        let mut stream = self
            .transport
            .subscribe(characteristic)
            .await
            .map_err(|source| BleError::SubscribeFailed { characteristic, source })?;

        let address = self.address.clone();
        self.notifications = Some(tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                handler(notification);
            }
            log::debug!("notification stream from {address} ended");
        }));
        log::info!("Subscribed to notifications from {}", self.address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    use joule_proto::{CirculatorDataPoint, ProgramStep, build_live_feed_message, parse_notification};

    use super::*;
    use crate::SimulatedJoule;

    const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

    #[test]
    fn write_before_connect_fails() {
        let ble = JouleBle::new(ADDRESS, SimulatedJoule::new()).unwrap();
        let err = ble.write(b"x").unwrap_err();
        assert!(matches!(
            err,
            BleError::WriteFailed { source: TransportError::NotConnected, .. }
        ));
        ble.shutdown();
    }

    #[test]
    fn read_and_subscribe_before_connect_fail() {
        let ble = JouleBle::new(ADDRESS, SimulatedJoule::new()).unwrap();
        assert!(matches!(ble.read(Characteristic::Read), Err(BleError::NotConnected(_))));
        assert!(matches!(ble.subscribe(|_| {}), Err(BleError::NotConnected(_))));
        ble.shutdown();
    }

    #[test]
    fn ensure_connected_connects_once() {
        let device = SimulatedJoule::new();
        let sim = device.handle();
        let ble = JouleBle::new(ADDRESS, device).unwrap();

        assert!(ble.ensure_connected().unwrap());
        assert!(!ble.ensure_connected().unwrap());
        assert_eq!(sim.connect_count(), 1);
        assert!(sim.is_connected());
        ble.shutdown();
        assert!(!sim.is_connected());
    }

    #[test]
    fn failed_connect_leaves_adapter_disconnected() {
        let device = SimulatedJoule::new();
        let sim = device.handle();
        sim.refuse_connections(true);
        let ble = JouleBle::new(ADDRESS, device).unwrap();

        let err = ble.connect().unwrap_err();
        assert!(matches!(err, BleError::ConnectionFailed { ref address, .. } if address == ADDRESS));
        assert!(ble.write(b"x").is_err());

        sim.refuse_connections(false);
        assert!(ble.ensure_connected().unwrap());
        ble.shutdown();
    }

    #[test]
    fn dropped_link_is_reconnected_on_demand() {
        let device = SimulatedJoule::new();
        let sim = device.handle();
        let ble = JouleBle::new(ADDRESS, device).unwrap();

        ble.ensure_connected().unwrap();
        sim.drop_link();
        assert!(ble.ensure_connected().unwrap());
        assert_eq!(sim.connect_count(), 2);
        ble.shutdown();
    }

    #[test]
    fn connect_replaces_live_connection() {
        let device = SimulatedJoule::new();
        let sim = device.handle();
        let ble = JouleBle::new(ADDRESS, device).unwrap();

        ble.connect().unwrap();
        ble.subscribe(|_| {}).unwrap();
        assert_eq!(sim.disconnect_count(), 0);

        ble.connect().unwrap();
        assert_eq!(sim.disconnect_count(), 1);
        assert_eq!(sim.connect_count(), 2);
        assert!(sim.is_connected());
        // The old handler went with the old link.
        ble.subscribe(|_| {}).unwrap();
        ble.shutdown();
    }

    #[test]
    fn notifications_reach_the_handler() {
        let device = SimulatedJoule::new();
        let sim = device.handle();
        let ble = JouleBle::new(ADDRESS, device).unwrap();
        ble.ensure_connected().unwrap();

        let (tx, rx) = std_mpsc::channel();
        ble.subscribe(move |n| {
            let _ = tx.send(n);
        })
        .unwrap();
        assert!(matches!(ble.subscribe(|_| {}), Err(BleError::AlreadySubscribed)));

        sim.queue_data_point(CirculatorDataPoint {
            bath_temp: 42.0,
            program_step: ProgramStep::Cook,
            ..Default::default()
        });
        ble.write(&build_live_feed_message(1)).unwrap();

        let notification = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(notification.characteristic, Characteristic::Subscribe);
        let point = parse_notification(&notification.value).unwrap();
        assert_eq!(point.bath_temp, 42.0);
        ble.shutdown();
    }

    #[test]
    fn rejected_write_is_reported() {
        let device = SimulatedJoule::new();
        let sim = device.handle();
        let ble = JouleBle::new(ADDRESS, device).unwrap();
        ble.ensure_connected().unwrap();

        sim.fail_writes(true);
        assert!(matches!(ble.write(b"x"), Err(BleError::WriteFailed { .. })));
        ble.shutdown();
    }

    #[test]
    fn disconnect_is_quiet_and_repeatable() {
        let ble = JouleBle::new(ADDRESS, SimulatedJoule::new()).unwrap();
        ble.disconnect();
        ble.ensure_connected().unwrap();
        ble.disconnect();
        ble.disconnect();
        ble.shutdown();
    }
}
