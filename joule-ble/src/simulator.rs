//! An in-process stand-in for a Joule.
//!
//! It understands the same StreamMessages as the real device: a start
//! request begins heating toward the set point, a stop request ends the
//! program, and every live-feed request is answered with one data point on
//! the subscribe characteristic. Tests steer it through [`SimulatorHandle`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::channel::mpsc;
use joule_proto::{
    CirculatorDataPoint, CirculatorProgram, MessageContent, ProgramStep, StreamMessage,
};

use crate::transport::{
    BleTransport, Characteristic, Notification, NotificationStream, TransportError,
};

const AMBIENT_TEMP: f32 = 20.0;
/// °C gained per live-feed tick while heating
const HEAT_STEP: f32 = 2.5;
/// °C lost per tick with no program
const COOL_STEP: f32 = 0.5;
/// Simulated seconds of cooking per tick
const COOK_TICK_SECS: u32 = 60;
const AT_TEMP_TOLERANCE: f32 = 0.5;

#[derive(Debug)]
struct State {
    connected: bool,
    connects: usize,
    disconnects: usize,
    refuse_connections: bool,
    fail_writes: bool,
    silent: bool,
    bath_temp: f32,
    program: Option<CirculatorProgram>,
    cooked_secs: u32,
    sequence: u32,
    queued: VecDeque<CirculatorDataPoint>,
    written: Vec<Vec<u8>>,
    subscriber: Option<mpsc::UnboundedSender<Notification>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            connected: false,
            connects: 0,
            disconnects: 0,
            refuse_connections: false,
            fail_writes: false,
            silent: false,
            bath_temp: AMBIENT_TEMP,
            program: None,
            cooked_secs: 0,
            sequence: 0,
            queued: VecDeque::new(),
            written: Vec::new(),
            subscriber: None,
        }
    }
}

impl State {
    fn next_data_point(&mut self, feed_id: u32) -> CirculatorDataPoint {
        self.sequence = self.sequence.wrapping_add(1);

        let (program_step, time_remaining) = match self.program {
            Some(program) => {
                let delta = program.set_point - self.bath_temp;
                self.bath_temp += delta.clamp(-HEAT_STEP, HEAT_STEP);

                if (program.set_point - self.bath_temp).abs() > AT_TEMP_TOLERANCE {
                    (ProgramStep::PreHeat, program.cook_time)
                } else if program.cook_time > 0 && self.cooked_secs >= program.cook_time {
                    (ProgramStep::WaitForRemoveFood, 0)
                } else {
                    self.cooked_secs = self.cooked_secs.saturating_add(COOK_TICK_SECS);
                    let remaining = program.cook_time.saturating_sub(self.cooked_secs);
                    (ProgramStep::Cook, remaining)
                }
            }
            None => {
                self.bath_temp = (self.bath_temp - COOL_STEP).max(AMBIENT_TEMP);
                (ProgramStep::Unknown, 0)
            }
        };

        CirculatorDataPoint {
            feed_id,
            sequence_number: self.sequence,
            timestamp: self.sequence.saturating_mul(COOK_TICK_SECS),
            bath_temp: self.bath_temp,
            program_step,
            time_remaining,
            ..Default::default()
        }
    }

    fn notify(&mut self, point: CirculatorDataPoint) {
        let message = StreamMessage {
            content: Some(MessageContent::DataPoint(point)),
            ..StreamMessage::default()
        };
        if self.subscriber.is_none() {
            log::debug!("simulator: no subscriber for data point {}", point.sequence_number);
            return;
        }
        self.push(message.to_bytes());
    }

    fn push(&mut self, value: Vec<u8>) {
        let Some(subscriber) = &self.subscriber else { return };
        let notification = Notification { characteristic: Characteristic::Subscribe, value };
        if subscriber.unbounded_send(notification).is_err() {
            self.subscriber = None;
        }
    }

    fn handle_request(&mut self, payload: &[u8]) {
        let message = match StreamMessage::from_bytes(payload) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("simulator: ignoring undecodable request: {e}");
                return;
            }
        };

        match message.content {
            Some(MessageContent::StartProgram(request)) => {
                log::debug!("simulator: start {:?}", request.program);
                self.program = Some(request.program);
                self.cooked_secs = 0;
            }
            Some(MessageContent::StopCirculator(_)) => {
                log::debug!("simulator: stop");
                self.program = None;
            }
            Some(MessageContent::BeginLiveFeed(request)) => {
                if self.silent {
                    return;
                }
                let point = match self.queued.pop_front() {
                    Some(point) => point,
                    None => self.next_data_point(request.feed_id),
                };
                self.notify(point);
            }
            Some(MessageContent::DataPoint(_)) | None => {}
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated circulator transport.
#[derive(Debug, Default)]
pub struct SimulatedJoule {
    state: Arc<Mutex<State>>,
}

impl SimulatedJoule {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that stays usable after the transport moves into an adapter.
    pub fn handle(&self) -> SimulatorHandle {
        SimulatorHandle { state: Arc::clone(&self.state) }
    }
}

#[async_trait]
impl BleTransport for SimulatedJoule {
    async fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        state.connects += 1;
        if state.refuse_connections {
            return Err(TransportError::DeviceNotFound(address.to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.connected {
            state.disconnects += 1;
        }
        state.connected = false;
        state.subscriber = None;
        Ok(())
    }

    async fn write(
        &mut self,
        characteristic: Characteristic,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_writes {
            return Err(TransportError::Simulated("write rejected".to_string()));
        }
        state.written.push(payload.to_vec());
        if characteristic == Characteristic::Write {
            state.handle_request(payload);
        }
        Ok(())
    }

    async fn read(&mut self, characteristic: Characteristic) -> Result<Vec<u8>, TransportError> {
        let state = lock(&self.state);
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        match characteristic {
            Characteristic::Read => Ok(Vec::new()),
            other => Err(TransportError::Simulated(format!("{other} is not readable"))),
        }
    }

    async fn subscribe(
        &mut self,
        characteristic: Characteristic,
    ) -> Result<NotificationStream, TransportError> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if characteristic != Characteristic::Subscribe {
            return Err(TransportError::Simulated(format!("{characteristic} does not notify")));
        }
        let (tx, rx) = mpsc::unbounded();
        state.subscriber = Some(tx);
        Ok(Box::pin(rx))
    }

    async fn unsubscribe(&mut self, _characteristic: Characteristic) -> Result<(), TransportError> {
        lock(&self.state).subscriber = None;
        Ok(())
    }
}

/// Test-side controls and observations for a [`SimulatedJoule`].
#[derive(Debug, Clone)]
pub struct SimulatorHandle {
    state: Arc<Mutex<State>>,
}

impl SimulatorHandle {
    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.state).refuse_connections = refuse;
    }

    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Stop answering live-feed requests.
    pub fn set_silent(&self, silent: bool) {
        lock(&self.state).silent = silent;
    }

    /// Lose the link without the adapter asking for it.
    pub fn drop_link(&self) {
        let mut state = lock(&self.state);
        state.connected = false;
        state.subscriber = None;
    }

    /// Answer the next live-feed request with `point` instead of a simulated one.
    pub fn queue_data_point(&self, point: CirculatorDataPoint) {
        lock(&self.state).queued.push_back(point);
    }

    /// Push `point` right now, unprompted.
    pub fn push_data_point(&self, point: CirculatorDataPoint) {
        lock(&self.state).notify(point);
    }

    /// Push raw bytes on the subscribe characteristic.
    pub fn push_raw(&self, value: Vec<u8>) {
        lock(&self.state).push(value);
    }

    pub fn set_bath_temp(&self, celsius: f32) {
        lock(&self.state).bath_temp = celsius;
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.state).connects
    }

    /// Disconnects of a live link requested through the transport.
    pub fn disconnect_count(&self) -> usize {
        lock(&self.state).disconnects
    }

    pub fn program(&self) -> Option<CirculatorProgram> {
        lock(&self.state).program
    }

    /// Every payload written so far, oldest first.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.state).written.clone()
    }
}
