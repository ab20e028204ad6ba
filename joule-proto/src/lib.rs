//! Joule wire protocol - message types and framing
//!
//! The circulator speaks a compact tag-based binary format (protobuf wire
//! encoding). Only the messages this controller needs are modeled; anything
//! else on the wire is skipped rather than rejected.

pub mod wire;

use wire::{Field, decode_fields, put_field_bytes, put_field_fixed32, put_field_float, put_field_varint};

// StreamMessage field numbers
pub const FIELD_HANDLE: u64 = 1;
pub const FIELD_END: u64 = 4;
pub const FIELD_SENDER_ADDRESS: u64 = 5;
pub const FIELD_RECIPIENT_ADDRESS: u64 = 6;

// StreamMessage oneof field numbers
pub const FIELD_START_PROGRAM_REQUEST: u64 = 50;
pub const FIELD_STOP_CIRCULATOR_REQUEST: u64 = 60;
pub const FIELD_BEGIN_LIVE_FEED_REQUEST: u64 = 70;
pub const FIELD_CIRCULATOR_DATA_POINT: u64 = 90;

/// Address used for both ends of requests built by this crate.
pub const DEFAULT_ADDRESS: [u8; 6] = [0u8; 6];

pub const DEFAULT_FEED_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    #[error("input ended in the middle of a field")]
    TruncatedInput,
    #[error("varint longer than 64 bits")]
    VarintTooLong,
    #[error("unsupported wire type {0}")]
    UnsupportedWireType(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgramType {
    #[default]
    Manual = 0,
    Automatic = 1,
}

impl TryFrom<u64> for ProgramType {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Manual),
            1 => Ok(Self::Automatic),
            other => Err(other),
        }
    }
}

/// Where the circulator is in its cook program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgramStep {
    #[default]
    Unknown = 0,
    PreHeat = 1,
    WaitForFood = 2,
    Cook = 3,
    WaitForRemoveFood = 4,
    Error = 5,
}

impl TryFrom<u64> for ProgramStep {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, u64> {
        match value {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::PreHeat),
            2 => Ok(Self::WaitForFood),
            3 => Ok(Self::Cook),
            4 => Ok(Self::WaitForRemoveFood),
            5 => Ok(Self::Error),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorState {
    #[default]
    NoError = 0,
    SoftError = 1,
    HardError = 2,
}

impl TryFrom<u64> for ErrorState {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoError),
            1 => Ok(Self::SoftError),
            2 => Ok(Self::HardError),
            other => Err(other),
        }
    }
}

/// Cook program parameters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CirculatorProgram {
    /// Target bath temperature in °C
    pub set_point: f32,
    /// Seconds; 0 means no time limit
    pub cook_time: u32,
    pub program_type: ProgramType,
}

impl CirculatorProgram {
    pub fn manual(set_point: f32, cook_time: u32) -> Self {
        Self { set_point, cook_time, program_type: ProgramType::Manual }
    }

    /// Zero cook time and MANUAL are left off the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(10);
        put_field_float(&mut buf, 1, self.set_point);
        if self.cook_time > 0 {
            put_field_varint(&mut buf, 2, self.cook_time.into());
        }
        if self.program_type != ProgramType::Manual {
            put_field_varint(&mut buf, 5, self.program_type as u64);
        }
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtoError> {
        let mut program = Self::default();
        for field in decode_fields(data)? {
            match field.number {
                1 => set(&mut program.set_point, field.as_f32()),
                2 => set(&mut program.cook_time, varint_u32(&field)),
                5 => set(&mut program.program_type, varint_enum(&field)),
                _ => {}
            }
        }
        Ok(program)
    }
}

/// Start a cooking program
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StartProgramRequest {
    pub program: CirculatorProgram,
}

impl StartProgramRequest {
    pub fn to_bytes(&self) -> Vec<u8> {
        let program = self.program.to_bytes();
        let mut buf = Vec::with_capacity(program.len() + 2);
        put_field_bytes(&mut buf, 1, &program);
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtoError> {
        let mut request = Self::default();
        for field in decode_fields(data)? {
            if let (1, Some(inner)) = (field.number, field.as_bytes()) {
                request.program = CirculatorProgram::from_bytes(inner)?;
            }
        }
        Ok(request)
    }
}

/// Stop the active program. Empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopCirculatorRequest;

/// Ask the circulator to push a data point on the subscribe characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginLiveFeedRequest {
    pub feed_id: u32,
}

impl Default for BeginLiveFeedRequest {
    fn default() -> Self {
        Self { feed_id: DEFAULT_FEED_ID }
    }
}

impl BeginLiveFeedRequest {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(6);
        put_field_varint(&mut buf, 1, self.feed_id.into());
        buf
    }

    /// An absent feed id decodes as 0, the wire default.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtoError> {
        let mut request = Self { feed_id: 0 };
        for field in decode_fields(data)? {
            if field.number == 1 {
                set(&mut request.feed_id, varint_u32(&field));
            }
        }
        Ok(request)
    }
}

/// Live sensor readings pushed by the circulator.
///
/// Every field is optional on the wire; absent fields keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CirculatorDataPoint {
    pub feed_id: u32,
    pub sequence_number: u32,
    pub timestamp: u32,
    pub error_state: ErrorState,
    /// °C
    pub bath_temp: f32,
    pub program_step: ProgramStep,
    /// Seconds
    pub time_remaining: u32,
}

impl CirculatorDataPoint {
    /// Fields holding their default value are omitted.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(24);
        if self.feed_id != 0 {
            put_field_varint(&mut buf, 1, self.feed_id.into());
        }
        if self.sequence_number != 0 {
            put_field_varint(&mut buf, 2, self.sequence_number.into());
        }
        if self.timestamp != 0 {
            put_field_varint(&mut buf, 3, self.timestamp.into());
        }
        if self.error_state != ErrorState::NoError {
            put_field_varint(&mut buf, 4, self.error_state as u64);
        }
        if self.bath_temp != 0.0 {
            put_field_float(&mut buf, 10, self.bath_temp);
        }
        if self.program_step != ProgramStep::Unknown {
            put_field_varint(&mut buf, 11, self.program_step as u64);
        }
        if self.time_remaining != 0 {
            put_field_varint(&mut buf, 12, self.time_remaining.into());
        }
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtoError> {
        let mut point = Self::default();
        for field in decode_fields(data)? {
            match field.number {
                1 => set(&mut point.feed_id, varint_u32(&field)),
                2 => set(&mut point.sequence_number, varint_u32(&field)),
                3 => set(&mut point.timestamp, varint_u32(&field)),
                4 => set(&mut point.error_state, varint_enum(&field)),
                10 => set(&mut point.bath_temp, field.as_f32()),
                11 => set(&mut point.program_step, varint_enum(&field)),
                12 => set(&mut point.time_remaining, varint_u32(&field)),
                _ => {}
            }
        }
        Ok(point)
    }
}

/// The oneof body of a [`StreamMessage`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageContent {
    StartProgram(StartProgramRequest),
    StopCirculator(StopCirculatorRequest),
    BeginLiveFeed(BeginLiveFeedRequest),
    DataPoint(CirculatorDataPoint),
}

/// Root envelope for every message exchanged with the circulator
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamMessage {
    pub handle: u32,
    pub end: bool,
    pub sender_address: Vec<u8>,
    pub recipient_address: Vec<u8>,
    pub content: Option<MessageContent>,
}

impl StreamMessage {
    /// Envelope addressed with [`DEFAULT_ADDRESS`] on both ends.
    pub fn request(content: MessageContent) -> Self {
        Self {
            sender_address: DEFAULT_ADDRESS.to_vec(),
            recipient_address: DEFAULT_ADDRESS.to_vec(),
            content: Some(content),
            ..Self::default()
        }
    }

    pub fn data_point(&self) -> Option<&CirculatorDataPoint> {
        match &self.content {
            Some(MessageContent::DataPoint(point)) => Some(point),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        put_field_fixed32(&mut buf, FIELD_HANDLE, self.handle);
        if self.end {
            put_field_varint(&mut buf, FIELD_END, 1);
        }
        if !self.sender_address.is_empty() {
            put_field_bytes(&mut buf, FIELD_SENDER_ADDRESS, &self.sender_address);
        }
        if !self.recipient_address.is_empty() {
            put_field_bytes(&mut buf, FIELD_RECIPIENT_ADDRESS, &self.recipient_address);
        }

        match &self.content {
            Some(MessageContent::StartProgram(r)) => {
                put_field_bytes(&mut buf, FIELD_START_PROGRAM_REQUEST, &r.to_bytes())
            }
            Some(MessageContent::StopCirculator(_)) => {
                put_field_bytes(&mut buf, FIELD_STOP_CIRCULATOR_REQUEST, &[])
            }
            Some(MessageContent::BeginLiveFeed(r)) => {
                put_field_bytes(&mut buf, FIELD_BEGIN_LIVE_FEED_REQUEST, &r.to_bytes())
            }
            Some(MessageContent::DataPoint(p)) => {
                put_field_bytes(&mut buf, FIELD_CIRCULATOR_DATA_POINT, &p.to_bytes())
            }
            None => {}
        }
        buf
    }

    /// Decode an envelope.
    ///
    /// Only a malformed envelope fails. Unknown fields (including oneof
    /// members we do not model, such as replies and keep-alives), known
    /// fields arriving with the wrong wire type and embedded bodies that do
    /// not decode are skipped. A later oneof field replaces an earlier one.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtoError> {
        let mut message = Self::default();
        for field in decode_fields(data)? {
            match field.number {
                FIELD_HANDLE => set(&mut message.handle, field.as_fixed32()),
                FIELD_END => set(&mut message.end, field.as_varint().map(|v| v != 0)),
                FIELD_SENDER_ADDRESS => {
                    set(&mut message.sender_address, field.as_bytes().map(<[u8]>::to_vec))
                }
                FIELD_RECIPIENT_ADDRESS => {
                    set(&mut message.recipient_address, field.as_bytes().map(<[u8]>::to_vec))
                }
                number => {
                    // All modeled oneof members are embedded messages.
                    let Some(inner) = field.as_bytes() else { continue };
                    let content = match number {
                        FIELD_START_PROGRAM_REQUEST => {
                            StartProgramRequest::from_bytes(inner).map(MessageContent::StartProgram)
                        }
                        FIELD_STOP_CIRCULATOR_REQUEST => {
                            Ok(MessageContent::StopCirculator(StopCirculatorRequest))
                        }
                        FIELD_BEGIN_LIVE_FEED_REQUEST => {
                            BeginLiveFeedRequest::from_bytes(inner).map(MessageContent::BeginLiveFeed)
                        }
                        FIELD_CIRCULATOR_DATA_POINT => {
                            CirculatorDataPoint::from_bytes(inner).map(MessageContent::DataPoint)
                        }
                        _ => continue,
                    };
                    match content {
                        Ok(content) => message.content = Some(content),
                        Err(e) => log::debug!("skipping malformed field {number}: {e}"),
                    }
                }
            }
        }
        Ok(message)
    }

    /// Replace both addresses, e.g. to target a specific circulator.
    pub fn addressed(mut self, sender: &[u8], recipient: &[u8]) -> Self {
        self.sender_address = sender.to_vec();
        self.recipient_address = recipient.to_vec();
        self
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// uint32 fields keep the low 32 bits, as protobuf does.
fn varint_u32(field: &Field<'_>) -> Option<u32> {
    field.as_varint().map(|v| v as u32)
}

/// Values outside the enum's table leave the field at its default.
fn varint_enum<E: TryFrom<u64>>(field: &Field<'_>) -> Option<E> {
    field.as_varint().and_then(|v| E::try_from(v).ok())
}

// ---------------------------------------------------------------------------
// High-level helpers
// ---------------------------------------------------------------------------

/// Serialized StreamMessage carrying a MANUAL StartProgramRequest.
pub fn build_start_cook_message(set_point_celsius: f32, cook_time_seconds: u32) -> Vec<u8> {
    let program = CirculatorProgram::manual(set_point_celsius, cook_time_seconds);
    StreamMessage::request(MessageContent::StartProgram(StartProgramRequest { program })).to_bytes()
}

pub fn build_stop_cook_message() -> Vec<u8> {
    StreamMessage::request(MessageContent::StopCirculator(StopCirculatorRequest)).to_bytes()
}

pub fn build_live_feed_message(feed_id: u32) -> Vec<u8> {
    StreamMessage::request(MessageContent::BeginLiveFeed(BeginLiveFeedRequest { feed_id })).to_bytes()
}

/// Extract the data point from a notification payload, if it carries one.
///
/// Notification bytes come straight off the radio; anything that does not
/// decode is logged and treated as "no data point".
pub fn parse_notification(data: &[u8]) -> Option<CirculatorDataPoint> {
    match StreamMessage::from_bytes(data) {
        Ok(message) => message.data_point().copied(),
        Err(e) => {
            log::debug!(
                "discarding notification {}: {e}",
                data_encoding::HEXLOWER.encode(data)
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wire::{WireType, decode_varint};

    fn field<'a>(fields: &'a [Field<'a>], number: u64) -> Option<&'a Field<'a>> {
        fields.iter().find(|f| f.number == number)
    }

    #[test]
    fn program_elides_defaults() {
        let bytes = CirculatorProgram::manual(65.0, 0).to_bytes();
        let fields = decode_fields(&bytes).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].as_f32(), Some(65.0));
        assert!(field(&fields, 2).is_none());
        assert!(field(&fields, 5).is_none());
    }

    #[test]
    fn program_includes_cook_time_and_automatic() {
        let program = CirculatorProgram {
            set_point: 65.0,
            cook_time: 3600,
            program_type: ProgramType::Automatic,
        };
        let bytes = program.to_bytes();
        let fields = decode_fields(&bytes).unwrap();
        assert_eq!(field(&fields, 2).and_then(Field::as_varint), Some(3600));
        assert_eq!(field(&fields, 5).and_then(Field::as_varint), Some(1));
        assert_eq!(CirculatorProgram::from_bytes(&bytes).unwrap(), program);
    }

    #[test]
    fn start_cook_message_walks_down_to_program() {
        let bytes = build_start_cook_message(75.0, 5400);
        let envelope = decode_fields(&bytes).unwrap();

        assert_eq!(envelope[0].number, FIELD_HANDLE);
        assert_eq!(envelope[0].wire_type(), WireType::Fixed32);
        assert_eq!(field(&envelope, FIELD_SENDER_ADDRESS).and_then(Field::as_bytes), Some(&[0u8; 6][..]));

        let request = field(&envelope, FIELD_START_PROGRAM_REQUEST).and_then(Field::as_bytes).unwrap();
        let request = decode_fields(request).unwrap();
        let program = field(&request, 1).and_then(Field::as_bytes).unwrap();
        let program = decode_fields(program).unwrap();

        let set_point = field(&program, 1).and_then(Field::as_f32).unwrap();
        assert!((set_point - 75.0).abs() < 1e-6);
        assert_eq!(field(&program, 2).and_then(Field::as_varint), Some(5400));
    }

    #[test]
    fn stop_message_carries_empty_field_60() {
        let bytes = build_stop_cook_message();
        let fields = decode_fields(&bytes).unwrap();
        let stop = field(&fields, FIELD_STOP_CIRCULATOR_REQUEST).unwrap();
        assert_eq!(stop.as_bytes(), Some(&[][..]));
        assert!(field(&fields, FIELD_START_PROGRAM_REQUEST).is_none());
    }

    #[test]
    fn live_feed_message_carries_feed_id() {
        let bytes = build_live_feed_message(DEFAULT_FEED_ID);
        let fields = decode_fields(&bytes).unwrap();
        let inner = field(&fields, FIELD_BEGIN_LIVE_FEED_REQUEST).and_then(Field::as_bytes).unwrap();
        assert_eq!(inner, &[0x08, 0x01]);
    }

    #[test]
    fn envelope_field_order() {
        let message = StreamMessage {
            handle: 7,
            end: true,
            sender_address: vec![1; 6],
            recipient_address: vec![2; 6],
            content: Some(MessageContent::StopCirculator(StopCirculatorRequest)),
        };
        let numbers: Vec<u64> = decode_fields(&message.to_bytes())
            .unwrap()
            .iter()
            .map(|f| f.number)
            .collect();
        assert_eq!(numbers, vec![1, 4, 5, 6, 60]);
    }

    #[test]
    fn empty_addresses_and_false_end_are_omitted() {
        let message = StreamMessage {
            content: Some(MessageContent::BeginLiveFeed(BeginLiveFeedRequest::default())),
            ..StreamMessage::default()
        };
        let numbers: Vec<u64> = decode_fields(&message.to_bytes())
            .unwrap()
            .iter()
            .map(|f| f.number)
            .collect();
        assert_eq!(numbers, vec![1, 70]);
    }

    #[test]
    fn data_point_defaults_for_absent_fields() {
        let mut buf = Vec::new();
        put_field_float(&mut buf, 10, 55.0);
        put_field_varint(&mut buf, 99, 12345);

        let point = CirculatorDataPoint::from_bytes(&buf).unwrap();
        assert_eq!(point.bath_temp, 55.0);
        assert_eq!(point.program_step, ProgramStep::Unknown);
        assert_eq!(point.time_remaining, 0);
        assert_eq!(point.error_state, ErrorState::NoError);
    }

    #[test]
    fn data_point_full_decode() {
        let point = CirculatorDataPoint {
            feed_id: 1,
            sequence_number: 42,
            timestamp: 1_700_000_000,
            error_state: ErrorState::SoftError,
            bath_temp: 61.25,
            program_step: ProgramStep::WaitForFood,
            time_remaining: 1800,
        };
        assert_eq!(CirculatorDataPoint::from_bytes(&point.to_bytes()).unwrap(), point);
    }

    #[test]
    fn data_point_skips_wrong_wire_type_and_unknown_enum() {
        let mut buf = Vec::new();
        put_field_varint(&mut buf, 10, 55); // bath_temp must be fixed32
        put_field_varint(&mut buf, 11, 9); // no such program step
        put_field_float(&mut buf, 12, 1.0); // time_remaining must be varint
        put_field_varint(&mut buf, 2, 3);

        let point = CirculatorDataPoint::from_bytes(&buf).unwrap();
        assert_eq!(point.bath_temp, 0.0);
        assert_eq!(point.program_step, ProgramStep::Unknown);
        assert_eq!(point.time_remaining, 0);
        assert_eq!(point.sequence_number, 3);
    }

    #[test]
    fn envelope_decodes_data_point() {
        let point = CirculatorDataPoint {
            bath_temp: 68.5,
            program_step: ProgramStep::Cook,
            ..Default::default()
        };
        let message = StreamMessage {
            handle: 0xdead_beef,
            end: true,
            content: Some(MessageContent::DataPoint(point)),
            ..StreamMessage::default()
        };
        let decoded = StreamMessage::from_bytes(&message.to_bytes()).unwrap();
        assert_eq!(decoded.handle, 0xdead_beef);
        assert!(decoded.end);
        assert_eq!(decoded.data_point(), Some(&point));
    }

    #[test]
    fn envelope_decodes_requests() {
        let decoded = StreamMessage::from_bytes(&build_start_cook_message(60.0, 120)).unwrap();
        assert_eq!(decoded.sender_address, DEFAULT_ADDRESS.to_vec());
        assert_eq!(
            decoded.content,
            Some(MessageContent::StartProgram(StartProgramRequest {
                program: CirculatorProgram::manual(60.0, 120),
            }))
        );

        let decoded = StreamMessage::from_bytes(&build_live_feed_message(3)).unwrap();
        assert_eq!(
            decoded.content,
            Some(MessageContent::BeginLiveFeed(BeginLiveFeedRequest { feed_id: 3 }))
        );
    }

    #[test]
    fn envelope_leaves_unmodeled_oneof_empty() {
        let mut buf = Vec::new();
        put_field_fixed32(&mut buf, FIELD_HANDLE, 1);
        put_field_bytes(&mut buf, 80, &[0x08, 0x01]);
        put_field_varint(&mut buf, 7, 1); // unknown plain field

        let decoded = StreamMessage::from_bytes(&buf).unwrap();
        assert_eq!(decoded.handle, 1);
        assert_eq!(decoded.content, None);
    }

    #[test]
    fn envelope_skips_known_field_with_wrong_wire_type() {
        let mut buf = Vec::new();
        put_field_varint(&mut buf, FIELD_HANDLE, 5);
        put_field_varint(&mut buf, FIELD_CIRCULATOR_DATA_POINT, 5);

        let decoded = StreamMessage::from_bytes(&buf).unwrap();
        assert_eq!(decoded.handle, 0);
        assert_eq!(decoded.content, None);
    }

    #[test]
    fn parse_notification_returns_point() {
        let point = CirculatorDataPoint { bath_temp: 57.5, ..Default::default() };
        let bytes = StreamMessage {
            content: Some(MessageContent::DataPoint(point)),
            ..StreamMessage::default()
        }
        .to_bytes();
        assert_eq!(parse_notification(&bytes), Some(point));
    }

    #[test]
    fn parse_notification_absorbs_garbage() {
        assert_eq!(parse_notification(&[0xff, 0xff, 0xff]), None);
        assert_eq!(parse_notification(&[]), None);
        assert_eq!(parse_notification(&[0x0b]), None);
        // Envelope fine, embedded data point truncated
        let mut buf = Vec::new();
        put_field_bytes(&mut buf, FIELD_CIRCULATOR_DATA_POINT, &[0x55, 0x00]);
        assert_eq!(parse_notification(&buf), None);
        // A request echoed back is not telemetry
        assert_eq!(parse_notification(&build_stop_cook_message()), None);
    }

    #[test]
    fn malformed_request_does_not_hide_data_point() {
        let point = CirculatorDataPoint {
            bath_temp: 68.5,
            program_step: ProgramStep::Cook,
            ..Default::default()
        };
        let mut buf = Vec::new();
        put_field_fixed32(&mut buf, FIELD_HANDLE, 1);
        put_field_bytes(&mut buf, FIELD_BEGIN_LIVE_FEED_REQUEST, &[0x08]); // truncated varint
        put_field_bytes(&mut buf, FIELD_CIRCULATOR_DATA_POINT, &point.to_bytes());
        assert_eq!(parse_notification(&buf), Some(point));

        // Order does not matter: a bad request after the data point is skipped too.
        let mut buf = Vec::new();
        put_field_bytes(&mut buf, FIELD_CIRCULATOR_DATA_POINT, &point.to_bytes());
        put_field_bytes(&mut buf, FIELD_START_PROGRAM_REQUEST, &[0x0a, 0x05, 0x0d]);
        assert_eq!(parse_notification(&buf), Some(point));
    }

    #[test]
    fn malformed_embedded_body_leaves_content_empty() {
        let mut buf = Vec::new();
        put_field_fixed32(&mut buf, FIELD_HANDLE, 9);
        put_field_bytes(&mut buf, FIELD_START_PROGRAM_REQUEST, &[0x0a, 0x02, 0x0d, 0x00]);

        let decoded = StreamMessage::from_bytes(&buf).unwrap();
        assert_eq!(decoded.handle, 9);
        assert_eq!(decoded.content, None);
    }

    #[test]
    fn addressed_request_carries_given_addresses() {
        let sender = [1, 2, 3, 4, 5, 6];
        let recipient = [6, 5, 4, 3, 2, 1];
        let bytes = StreamMessage::request(MessageContent::StopCirculator(StopCirculatorRequest))
            .addressed(&sender, &recipient)
            .to_bytes();

        let decoded = StreamMessage::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.sender_address, sender.to_vec());
        assert_eq!(decoded.recipient_address, recipient.to_vec());
        assert_eq!(decoded.content, Some(MessageContent::StopCirculator(StopCirculatorRequest)));
    }

    #[test]
    fn handle_is_little_endian_fixed32() {
        let message = StreamMessage { handle: 0x0102_0304, ..StreamMessage::default() };
        let bytes = message.to_bytes();
        assert_eq!(bytes, vec![0x0d, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(decode_varint(&bytes, 0).unwrap(), (0x0d, 1));
    }
}
