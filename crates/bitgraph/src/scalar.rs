// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Leaf value data: numerics, chars, strings and time types.
//!
//! Numerics are carried as a 64-bit raw pattern. Hints narrow the wire
//! width (`bit_packed`), shift the range (`range_bias`) and quantize
//! (`scale`); floats keep their IEEE-754 bit pattern.

use chrono::{DateTime, TimeDelta, Utc};

use crate::bitstream::{BitStream, COMPRESSED_ABSENT};
use crate::error::{Error, Result};
use crate::model::{ElementKind, Hints, TypeRef, Value};

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;
/// Ticks from 0001-01-01 to the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
/// Ticks from 0001-01-01 to 1601-01-01, the wire origin for instants.
const DATETIME_ORIGIN_TICKS: i64 = 504_911_232_000_000_000;
/// Top bit of an encoded instant; always set, marks UTC.
const DATETIME_UTC_MARKER: u64 = 1 << 63;

/// Numeric layout of a leaf type: wire kind plus default width.
fn numeric_kind(ty: &TypeRef) -> Option<ElementKind> {
    match ty {
        TypeRef::Primitive(ElementKind::String) => None,
        TypeRef::Primitive(kind) => Some(*kind),
        TypeRef::DateTime => Some(ElementKind::U8),
        TypeRef::TimeSpan => Some(ElementKind::I8),
        _ => None,
    }
}

#[inline]
fn low_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

fn wire_width(kind: ElementKind, hints: &Hints) -> Result<u32> {
    let bits = match hints.bit_packed {
        0 => kind.bit_width().unwrap_or(64),
        packed => packed,
    };
    if bits > 64 {
        return Err(Error::out_of_range(bits, hints.range_bias, hints.scale));
    }
    Ok(bits)
}

/// Apply bias and scale, then range-check against the wire width.
fn pack(raw: u64, kind: ElementKind, hints: &Hints) -> Result<(u64, u32)> {
    let bits = wire_width(kind, hints)?;
    let fail = || Error::out_of_range(bits, hints.range_bias, hints.scale);
    let shifted = raw.wrapping_sub(hints.range_bias as u64);

    let packed = if kind.is_signed() {
        let mut signed = shifted as i64;
        if hints.scale != 0 {
            signed = signed.wrapping_div(hints.scale as i64);
        }
        if bits != 64 {
            if kind == ElementKind::R4 {
                if (signed as u64) >> 32 != 0 {
                    return Err(fail());
                }
            } else {
                let min = -(1i64 << (bits - 1));
                let max = (1i64 << (bits - 1)) - 1;
                if signed < min || signed > max {
                    return Err(fail());
                }
            }
        }
        signed as u64
    } else {
        let mut unsigned = shifted;
        if hints.scale != 0 {
            unsigned /= hints.scale;
        }
        if unsigned > low_mask(bits) {
            return Err(fail());
        }
        unsigned
    };
    Ok((packed & low_mask(bits), bits))
}

fn unpack(wire: u64, bits: u32, kind: ElementKind, hints: &Hints) -> u64 {
    let mut raw = if kind.is_signed() {
        sign_extend(wire, bits) as u64
    } else {
        wire
    };
    if hints.scale != 0 {
        raw = if kind.is_signed() {
            (raw as i64).wrapping_mul(hints.scale as i64) as u64
        } else {
            raw.wrapping_mul(hints.scale)
        };
    }
    raw.wrapping_add(hints.range_bias as u64)
}

fn datetime_to_wire(instant: &DateTime<Utc>) -> Result<u64> {
    let ticks = instant
        .timestamp()
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(instant.timestamp_subsec_nanos() as i64 / NANOS_PER_TICK))
        .and_then(|t| t.checked_add(UNIX_EPOCH_TICKS))
        .filter(|t| *t >= DATETIME_ORIGIN_TICKS)
        .ok_or_else(|| Error::ValueOutOfRange(format!("{} has no tick encoding", instant)))?;
    Ok((ticks - DATETIME_ORIGIN_TICKS) as u64 | DATETIME_UTC_MARKER)
}

fn datetime_from_wire(wire: u64) -> Result<DateTime<Utc>> {
    let ticks = ((wire & !DATETIME_UTC_MARKER) as i64)
        .wrapping_add(DATETIME_ORIGIN_TICKS)
        .wrapping_sub(UNIX_EPOCH_TICKS);
    let seconds = ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;
    DateTime::from_timestamp(seconds, nanos)
        .ok_or_else(|| Error::malformed(format!("instant out of range: {} ticks", ticks)))
}

fn timespan_to_ticks(span: &TimeDelta) -> Result<i64> {
    span.num_seconds()
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(span.subsec_nanos() as i64 / NANOS_PER_TICK))
        .ok_or_else(|| Error::ValueOutOfRange(format!("{} has no tick encoding", span)))
}

fn timespan_from_ticks(ticks: i64) -> Result<TimeDelta> {
    TimeDelta::microseconds(ticks / 10)
        .checked_add(&TimeDelta::nanoseconds((ticks % 10) * NANOS_PER_TICK))
        .ok_or_else(|| Error::malformed(format!("time span out of range: {} ticks", ticks)))
}

/// Raw 64-bit pattern and wire kind of a numeric leaf.
fn raw_numeric(value: &Value) -> Result<Option<(u64, ElementKind)>> {
    let raw = match *value {
        Value::Bool(v) => (v as u64, ElementKind::Boolean),
        Value::Char(c) => {
            let unit = c as u32;
            if unit > 0xFFFF {
                return Err(Error::ValueOutOfRange(format!(
                    "char U+{:X} is outside the 16-bit range",
                    unit
                )));
            }
            (unit as u64, ElementKind::Char)
        }
        Value::I8(v) => (v as i64 as u64, ElementKind::I1),
        Value::U8(v) => (v as u64, ElementKind::U1),
        Value::I16(v) => (v as i64 as u64, ElementKind::I2),
        Value::U16(v) => (v as u64, ElementKind::U2),
        Value::I32(v) => (v as i64 as u64, ElementKind::I4),
        Value::U32(v) => (v as u64, ElementKind::U4),
        Value::I64(v) => (v as u64, ElementKind::I8),
        Value::U64(v) => (v, ElementKind::U8),
        Value::F32(v) => (v.to_bits() as u64, ElementKind::R4),
        Value::F64(v) => (v.to_bits(), ElementKind::R8),
        Value::DateTime(ref instant) => (datetime_to_wire(instant)?, ElementKind::U8),
        Value::TimeSpan(ref span) => (timespan_to_ticks(span)? as u64, ElementKind::I8),
        _ => return Ok(None),
    };
    Ok(Some(raw))
}

fn numeric_value(ty: &TypeRef, kind: ElementKind, raw: u64) -> Result<Value> {
    let value = match ty {
        TypeRef::DateTime => Value::DateTime(datetime_from_wire(raw)?),
        TypeRef::TimeSpan => Value::TimeSpan(timespan_from_ticks(raw as i64)?),
        _ => match kind {
            ElementKind::Boolean => Value::Bool(raw != 0),
            ElementKind::Char => {
                let c = u16::try_from(raw)
                    .ok()
                    .and_then(|unit| char::from_u32(unit as u32))
                    .ok_or_else(|| Error::malformed(format!("invalid char code unit {:#x}", raw)))?;
                Value::Char(c)
            }
            ElementKind::I1 => Value::I8(raw as i8),
            ElementKind::U1 => Value::U8(raw as u8),
            ElementKind::I2 => Value::I16(raw as i16),
            ElementKind::U2 => Value::U16(raw as u16),
            ElementKind::I4 => Value::I32(raw as i32),
            ElementKind::U4 => Value::U32(raw as u32),
            ElementKind::I8 => Value::I64(raw as i64),
            ElementKind::U8 => Value::U64(raw),
            ElementKind::R4 => Value::F32(f32::from_bits(raw as u32)),
            ElementKind::R8 => Value::F64(f64::from_bits(raw)),
            ElementKind::String => {
                return Err(Error::UnsupportedType("string is not numeric".to_string()))
            }
        },
    };
    Ok(value)
}

/// Write the data of a leaf value.
pub(crate) fn encode_scalar(stream: &BitStream, value: &Value, hints: &Hints) -> Result<()> {
    if let Value::String(text) = value {
        let len = u32::try_from(text.len())
            .map_err(|_| Error::ValueOutOfRange(format!("string of {} bytes", text.len())))?;
        log::trace!("[scalar] string {} bytes", len);
        stream.write_compressed_u32(len)?;
        stream.write_bytes(text.as_bytes());
        return Ok(());
    }

    let Some((raw, kind)) = raw_numeric(value)? else {
        return Err(Error::UnsupportedType(format!(
            "{:?} has no scalar encoding",
            value
        )));
    };
    let (wire, bits) = pack(raw, kind, hints)?;
    log::trace!("[scalar] {} {:#x} in {} bits", kind.name(), wire, bits);
    stream.write_bits_wide(wire, bits)
}

/// Read the data of a leaf value of type `ty`.
pub(crate) fn decode_scalar(stream: &BitStream, ty: &TypeRef, hints: &Hints) -> Result<Value> {
    if matches!(ty, TypeRef::Primitive(ElementKind::String)) {
        let len = stream.read_compressed_u32()?;
        if len == COMPRESSED_ABSENT {
            return Ok(Value::Null);
        }
        let bytes = stream.read_bytes(len as usize)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| Error::malformed(format!("invalid UTF-8 string: {}", e)))?;
        return Ok(Value::String(text));
    }

    let kind = numeric_kind(ty)
        .ok_or_else(|| Error::UnsupportedType(format!("{} has no scalar encoding", ty)))?;
    let bits = wire_width(kind, hints)?;
    let wire = stream.read_bits_wide(bits)?;
    let raw = unpack(wire, bits, kind, hints);
    numeric_value(ty, kind, raw)
}

/// Whether values of `ty` are leaves handled by this module.
pub(crate) fn is_scalar(ty: &TypeRef) -> bool {
    matches!(ty, TypeRef::Primitive(_) | TypeRef::DateTime | TypeRef::TimeSpan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn round_trip(value: &Value, ty: &TypeRef, hints: Hints) -> Result<Value> {
        let stream = BitStream::new();
        encode_scalar(&stream, value, &hints)?;
        decode_scalar(&stream, ty, &hints)
    }

    #[test]
    fn test_bit_packed_signed_range() {
        let hints = Hints::new().bit_packed(4);
        let ty = TypeRef::Primitive(ElementKind::I4);

        assert_eq!(round_trip(&Value::I32(7), &ty, hints), Ok(Value::I32(7)));
        assert_eq!(round_trip(&Value::I32(-8), &ty, hints), Ok(Value::I32(-8)));
        assert!(matches!(
            round_trip(&Value::I32(8), &ty, hints),
            Err(Error::ValueOutOfRange(_))
        ));
        assert!(matches!(
            round_trip(&Value::I32(-9), &ty, hints),
            Err(Error::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn test_out_of_range_message_names_hints() {
        let hints = Hints::new().bit_packed(4).range_bias(2).scale(3);
        match round_trip(&Value::I32(1000), &TypeRef::Primitive(ElementKind::I4), hints) {
            Err(Error::ValueOutOfRange(msg)) => assert_eq!(msg, "Bits=4 Bias=2 Scale=3"),
            other => panic!("expected ValueOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_bias_and_scale() {
        let hints = Hints::new().bit_packed(8).range_bias(1000).scale(10);
        let ty = TypeRef::Primitive(ElementKind::U4);

        let stream = BitStream::new();
        encode_scalar(&stream, &Value::U32(3550), &hints).expect("encode");
        assert_eq!(stream.to_bytes(), vec![255]);
        assert_eq!(
            decode_scalar(&stream, &ty, &hints),
            Ok(Value::U32(3550))
        );

        // Quantization drops the remainder.
        assert_eq!(round_trip(&Value::U32(1234), &ty, hints), Ok(Value::U32(1230)));
        assert!(matches!(
            round_trip(&Value::U32(3560), &ty, hints),
            Err(Error::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn test_unsigned_width_check() {
        let hints = Hints::new().bit_packed(3);
        let ty = TypeRef::Primitive(ElementKind::U1);
        assert_eq!(round_trip(&Value::U8(7), &ty, hints), Ok(Value::U8(7)));
        assert!(matches!(
            round_trip(&Value::U8(8), &ty, hints),
            Err(Error::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn test_default_widths() {
        let stream = BitStream::new();
        let none = Hints::default();
        encode_scalar(&stream, &Value::Bool(true), &none).expect("bool");
        encode_scalar(&stream, &Value::I16(-2), &none).expect("i16");
        encode_scalar(&stream, &Value::U64(u64::MAX), &none).expect("u64");
        assert_eq!(stream.len_bits(), 1 + 16 + 64);
    }

    #[test]
    fn test_float_bit_patterns_survive() {
        let payload_nan = f64::from_bits(0x7FF8_0000_DEAD_BEEF);
        let back = round_trip(
            &Value::F64(payload_nan),
            &TypeRef::Primitive(ElementKind::R8),
            Hints::default(),
        )
        .expect("round trip");
        match back {
            Value::F64(v) => assert_eq!(v.to_bits(), 0x7FF8_0000_DEAD_BEEF),
            other => panic!("unexpected {:?}", other),
        }

        let negative_zero = round_trip(
            &Value::F32(-0.0),
            &TypeRef::Primitive(ElementKind::R4),
            Hints::default(),
        )
        .expect("round trip");
        assert_eq!(negative_zero, Value::F32(-0.0));
        assert_ne!(negative_zero, Value::F32(0.0));
    }

    #[test]
    fn test_datetime_wire_form() {
        let origin = Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(datetime_to_wire(&origin), Ok(DATETIME_UTC_MARKER));

        let instant = Utc.with_ymd_and_hms(2024, 2, 29, 13, 45, 10).unwrap()
            + TimeDelta::nanoseconds(1_234_500);
        let back = round_trip(&Value::DateTime(instant), &TypeRef::DateTime, Hints::default());
        assert_eq!(back, Ok(Value::DateTime(instant)));
    }

    #[test]
    fn test_datetime_before_origin_rejected() {
        let early = Utc.with_ymd_and_hms(1500, 6, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            datetime_to_wire(&early),
            Err(Error::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn test_timespan_ticks() {
        let span = -(TimeDelta::seconds(90) + TimeDelta::microseconds(15));
        assert_eq!(timespan_to_ticks(&span), Ok(-900_000_150));
        assert_eq!(
            round_trip(&Value::TimeSpan(span), &TypeRef::TimeSpan, Hints::default()),
            Ok(Value::TimeSpan(span))
        );
    }

    #[test]
    fn test_strings() {
        let ty = TypeRef::STRING;
        assert_eq!(
            round_trip(&Value::from("héllo"), &ty, Hints::default()),
            Ok(Value::from("héllo"))
        );
        assert_eq!(
            round_trip(&Value::from(""), &ty, Hints::default()),
            Ok(Value::from(""))
        );

        let stream = BitStream::from_bytes(&[0xFF]);
        assert_eq!(decode_scalar(&stream, &ty, &Hints::default()), Ok(Value::Null));

        let stream = BitStream::from_bytes(&[0x02, 0xC3, 0x28]);
        assert!(matches!(
            decode_scalar(&stream, &ty, &Hints::default()),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_chars() {
        let ty = TypeRef::Primitive(ElementKind::Char);
        assert_eq!(
            round_trip(&Value::Char('é'), &ty, Hints::default()),
            Ok(Value::Char('é'))
        );
        assert!(matches!(
            round_trip(&Value::Char('🦀'), &ty, Hints::default()),
            Err(Error::ValueOutOfRange(_))
        ));

        let surrogate = BitStream::from_bytes(&[0xD8, 0x00]);
        assert!(matches!(
            decode_scalar(&surrogate, &ty, &Hints::default()),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_composites_are_not_scalars() {
        let stream = BitStream::new();
        assert!(matches!(
            encode_scalar(&stream, &Value::list(vec![]), &Hints::default()),
            Err(Error::UnsupportedType(_))
        ));
        assert!(!is_scalar(&TypeRef::List));
        assert!(is_scalar(&TypeRef::DateTime));
    }
}
