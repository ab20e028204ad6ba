//! Single owner of the circulator connection.
//!
//! A poll cycle asks the device for one telemetry data point and waits for it
//! to arrive on the notification channel. The device has no request/response
//! primitive: the live-feed request is written blind and the answer shows up
//! later as a notification, so the two are matched up here.
//!
//! Notifications are decoded on the BLE worker thread and handed over through
//! a channel. Only the coordinator touches the snapshot.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};

use joule_ble::{BleError, BleTransport, JouleBle, Notification};
use joule_proto::{
    CirculatorDataPoint, build_live_feed_message, build_start_cook_message,
    build_stop_cook_message, parse_notification,
};
use tokio::sync::watch;

use crate::config::CoordinatorConfig;
use crate::snapshot::{
    MAX_COOK_TIME_MINUTES, MAX_TARGET_TEMPERATURE, MIN_COOK_TIME_MINUTES, MIN_TARGET_TEMPERATURE,
    Snapshot, TemperatureUnit, minutes_to_seconds,
};

/// A poll cycle could not talk to the device. The last snapshot stays
/// readable but should be treated as stale.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("BLE communication failed")]
    Ble(#[from] BleError),
}

/// A control action was refused. Nothing was changed locally.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("BLE communication failed")]
    Ble(#[from] BleError),
    #[error("{setting} {value} is outside {min}..={max}")]
    OutOfRange {
        setting: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

fn check_range(setting: &'static str, value: f32, min: f32, max: f32) -> Result<(), ControlError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ControlError::OutOfRange { setting, value, min, max })
    }
}

fn check_temperature(celsius: f32) -> Result<(), ControlError> {
    check_range("target temperature", celsius, MIN_TARGET_TEMPERATURE, MAX_TARGET_TEMPERATURE)
}

fn check_cook_time(minutes: f32) -> Result<(), ControlError> {
    check_range("cook time", minutes, MIN_COOK_TIME_MINUTES, MAX_COOK_TIME_MINUTES)
}

pub struct Coordinator {
    ble: JouleBle,
    config: CoordinatorConfig,
    /// Kept so every new subscription can get its own sender
    telemetry_tx: Sender<CirculatorDataPoint>,
    telemetry: Receiver<CirculatorDataPoint>,
    subscribed: bool,
    available: bool,
    snapshot: watch::Sender<Snapshot>,
}

impl Coordinator {
    /// Start the BLE worker for `transport`. Nothing is connected until the
    /// first poll or control action.
    pub fn new<T: BleTransport>(config: CoordinatorConfig, transport: T) -> std::io::Result<Self> {
        let ble = JouleBle::new(config.address.clone(), transport)?;
        Ok(Self::with_adapter(ble, config))
    }

    pub fn with_adapter(ble: JouleBle, config: CoordinatorConfig) -> Self {
        let (telemetry_tx, telemetry) = mpsc::channel();
        let (snapshot, _) = watch::channel(Snapshot::from_config(&config));
        Self {
            ble,
            config,
            telemetry_tx,
            telemetry,
            subscribed: false,
            available: true,
            snapshot,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Last published snapshot
    pub fn snapshot(&self) -> Snapshot {
        *self.snapshot.borrow()
    }

    /// Receiver that sees every snapshot published from now on.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// False after a failed poll, until the next successful one.
    pub fn is_available(&self) -> bool {
        self.available
    }

    fn publish(&self, update: impl FnOnce(Snapshot) -> Snapshot) {
        let next = update(self.snapshot());
        self.snapshot.send_replace(next);
    }

    fn ensure_connected(&mut self) -> Result<(), BleError> {
        if self.ble.ensure_connected()? {
            // The adapter drops the handler along with the old connection.
            self.subscribed = false;
        }
        Ok(())
    }

    fn ensure_subscribed(&mut self) -> Result<(), BleError> {
        self.ensure_connected()?;
        if self.subscribed {
            return Ok(());
        }

        let tx = self.telemetry_tx.clone();
        self.ble.subscribe(move |notification: Notification| {
            if let Some(point) = parse_notification(&notification.value) {
                // Receiver gone means the coordinator is shutting down.
                let _ = tx.send(point);
            }
        })?;
        self.subscribed = true;
        Ok(())
    }

    /// Run one poll cycle and return the resulting snapshot.
    ///
    /// Not hearing back before the feed timeout is not a failure: the previous
    /// reading is kept. Only BLE errors fail the cycle.
    pub fn poll(&mut self) -> Result<Snapshot, PollError> {
        match self.poll_cycle() {
            Ok(()) => {
                if !self.available {
                    log::info!("Joule {} is reachable again", self.config.address);
                }
                self.available = true;
                Ok(self.snapshot())
            }
            Err(e) => {
                log::warn!("Poll of {} failed: {e}", self.config.address);
                self.available = false;
                Err(e)
            }
        }
    }

    fn poll_cycle(&mut self) -> Result<(), PollError> {
        self.ensure_subscribed()?;

        // Anything already queued answered an earlier request. Take it as the
        // latest reading, but it must not satisfy the wait below.
        let mut latest = None;
        while let Ok(point) = self.telemetry.try_recv() {
            latest = Some(point);
        }

        self.ble.write(&build_live_feed_message(self.config.feed_id))?;

        let timeout = self.config.feed_timeout();
        match self.telemetry.recv_timeout(timeout) {
            Ok(point) => latest = Some(point),
            Err(RecvTimeoutError::Timeout) => {
                log::info!("No telemetry from {} within {timeout:?}, keeping last reading", self.config.address);
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("Telemetry channel closed");
            }
        }

        if let Some(point) = latest {
            log::debug!(
                "Telemetry #{}: {:.2} °C, {:?}, {} s remaining",
                point.sequence_number,
                point.bath_temp,
                point.program_step,
                point.time_remaining
            );
            self.publish(|s| s.with_telemetry(&point));
        }
        Ok(())
    }

    /// Poll after a control action. Its outcome does not change the action's.
    fn refresh(&mut self) {
        if self.poll().is_err() {
            log::debug!("Refresh after control action failed; keeping optimistic state");
        }
    }

    /// Start a manual program at `target_temperature` °C for `cook_time_minutes`
    /// (0 = no limit).
    pub fn start_cooking(
        &mut self,
        target_temperature: f32,
        cook_time_minutes: f32,
    ) -> Result<(), ControlError> {
        check_temperature(target_temperature)?;
        check_cook_time(cook_time_minutes)?;

        self.ensure_connected()?;
        let cook_time = minutes_to_seconds(cook_time_minutes);
        self.ble.write(&build_start_cook_message(target_temperature, cook_time))?;
        log::info!("Started cooking at {target_temperature} °C for {cook_time} s");

        // The device does not acknowledge; the next telemetry corrects us if needed.
        self.publish(|s| Snapshot {
            is_cooking: true,
            target_temperature,
            cook_time_minutes,
            ..s
        });
        self.refresh();
        Ok(())
    }

    pub fn stop_cooking(&mut self) -> Result<(), ControlError> {
        self.ensure_connected()?;
        self.ble.write(&build_stop_cook_message())?;
        log::info!("Stopped cooking");

        self.publish(|s| Snapshot { is_cooking: false, ..s });
        self.refresh();
        Ok(())
    }

    /// Used by the next `start_cooking`; nothing is sent to the device.
    pub fn set_target_temperature(&mut self, celsius: f32) -> Result<(), ControlError> {
        check_temperature(celsius)?;
        self.publish(|s| Snapshot { target_temperature: celsius, ..s });
        Ok(())
    }

    /// Used by the next `start_cooking`; nothing is sent to the device.
    pub fn set_cook_time(&mut self, minutes: f32) -> Result<(), ControlError> {
        check_cook_time(minutes)?;
        self.publish(|s| Snapshot { cook_time_minutes: minutes, ..s });
        Ok(())
    }

    pub fn set_display_unit(&mut self, unit: TemperatureUnit) {
        self.publish(|s| Snapshot { temperature_unit: unit, ..s });
    }

    /// Disconnect and stop the BLE worker.
    pub fn shutdown(self) {
        self.ble.shutdown();
    }
}
