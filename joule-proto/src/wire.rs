//! Wire-format primitives: varints, field tags, fixed-width values and the
//! field scanner every message decoder is built on.

use crate::ProtoError;

/// How a field's value is laid out on the wire (low three bits of a tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            other => Err(ProtoError::UnsupportedWireType(other)),
        }
    }
}

/// Raw value of a scanned field. Length-delimited values borrow from the
/// scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Fixed32([u8; 4]),
    Fixed64([u8; 8]),
    Bytes(&'a [u8]),
}

/// One `(field_number, wire_type, value)` unit produced by [`decode_fields`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field<'a> {
    pub number: u64,
    pub value: FieldValue<'a>,
}

impl<'a> Field<'a> {
    pub fn wire_type(&self) -> WireType {
        match self.value {
            FieldValue::Varint(_) => WireType::Varint,
            FieldValue::Fixed32(_) => WireType::Fixed32,
            FieldValue::Fixed64(_) => WireType::Fixed64,
            FieldValue::Bytes(_) => WireType::LengthDelimited,
        }
    }

    pub fn as_varint(&self) -> Option<u64> {
        match self.value {
            FieldValue::Varint(v) => Some(v),
            _ => None,
        }
    }

    /// Little-endian IEEE-754 single precision.
    pub fn as_f32(&self) -> Option<f32> {
        match self.value {
            FieldValue::Fixed32(raw) => Some(f32::from_le_bytes(raw)),
            _ => None,
        }
    }

    pub fn as_fixed32(&self) -> Option<u32> {
        match self.value {
            FieldValue::Fixed32(raw) => Some(u32::from_le_bytes(raw)),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self.value {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Append `value` as a base-128 varint, least significant group first.
pub fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value > 0x7f {
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    put_varint(&mut buf, value);
    buf
}

/// Decode the varint starting at `offset`. Returns the value and the offset
/// just past it.
pub fn decode_varint(data: &[u8], offset: usize) -> Result<(u64, usize), ProtoError> {
    let mut result = 0u64;
    let mut shift = 0u32;
    let mut pos = offset;

    loop {
        let byte = *data.get(pos).ok_or(ProtoError::TruncatedInput)?;
        pos += 1;
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, pos));
        }
        shift += 7;
        if shift >= 64 {
            return Err(ProtoError::VarintTooLong);
        }
    }
}

pub fn put_tag(buf: &mut Vec<u8>, field_number: u64, wire_type: WireType) {
    put_varint(buf, (field_number << 3) | wire_type as u64);
}

pub fn encode_tag(field_number: u64, wire_type: WireType) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2);
    put_tag(&mut buf, field_number, wire_type);
    buf
}

pub fn put_field_varint(buf: &mut Vec<u8>, field_number: u64, value: u64) {
    put_tag(buf, field_number, WireType::Varint);
    put_varint(buf, value);
}

pub fn put_field_float(buf: &mut Vec<u8>, field_number: u64, value: f32) {
    put_tag(buf, field_number, WireType::Fixed32);
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn put_field_fixed32(buf: &mut Vec<u8>, field_number: u64, value: u32) {
    put_tag(buf, field_number, WireType::Fixed32);
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn put_field_bytes(buf: &mut Vec<u8>, field_number: u64, value: &[u8]) {
    put_tag(buf, field_number, WireType::LengthDelimited);
    put_varint(buf, value.len() as u64);
    buf.extend_from_slice(value);
}

fn take<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], ProtoError> {
    let end = offset.checked_add(N).ok_or(ProtoError::TruncatedInput)?;
    data.get(offset..end)
        .and_then(|s| s.try_into().ok())
        .ok_or(ProtoError::TruncatedInput)
}

/// Scan the whole buffer into fields, left to right.
///
/// Unknown field numbers are returned like any other; callers pick the
/// numbers they know and ignore the rest.
pub fn decode_fields(data: &[u8]) -> Result<Vec<Field<'_>>, ProtoError> {
    let mut fields = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let (tag, next) = decode_varint(data, offset)?;
        offset = next;
        let number = tag >> 3;

        let value = match WireType::try_from((tag & 0x07) as u8)? {
            WireType::Varint => {
                let (v, next) = decode_varint(data, offset)?;
                offset = next;
                FieldValue::Varint(v)
            }
            WireType::Fixed32 => {
                let raw = take::<4>(data, offset)?;
                offset += 4;
                FieldValue::Fixed32(raw)
            }
            WireType::Fixed64 => {
                let raw = take::<8>(data, offset)?;
                offset += 8;
                FieldValue::Fixed64(raw)
            }
            WireType::LengthDelimited => {
                let (len, next) = decode_varint(data, offset)?;
                let end = usize::try_from(len)
                    .ok()
                    .and_then(|len| next.checked_add(len))
                    .filter(|end| *end <= data.len())
                    .ok_or(ProtoError::TruncatedInput)?;
                let bytes = &data[next..end];
                offset = end;
                FieldValue::Bytes(bytes)
            }
        };

        fields.push(Field { number, value });
    }

    Ok(fields)
}
