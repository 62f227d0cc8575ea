// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-value wire signature: presence header, type tag and length.
//!
//! How much of the signature is written depends only on the declared
//! (expected) type of the slot and its hints, so the encoder and decoder
//! derive the same [`SignatureMask`] independently.
//!
//! # Header tags
//!
//! ```text
//! L1 (2 bits)  0 null | 1 duplicate | 2 reference | 3 other
//! L2 (2 bits)  0 primitive | 1 array | 2 list | 3 other     (after L1 = other)
//! L3 (4 bits)  0 type                                       (after L2 = other)
//! ```

use std::ops::BitOr;

use crate::bitstream::{BitStream, COMPRESSED_ABSENT};
use crate::descriptor::ValueDescriptor;
use crate::duplicates::DuplicateTable;
use crate::error::{Error, Result};
use crate::fingerprint::TypeFingerprintRegistry;
use crate::model::{ElementKind, Hints, ObjectData, TypeKind, TypeRef, Value};
use crate::scalar;

pub(crate) const L1_BITS: u32 = 2;
pub(crate) const L1_NULL: u32 = 0;
pub(crate) const L1_DUPLICATE: u32 = 1;
pub(crate) const L1_REFERENCE: u32 = 2;
pub(crate) const L1_OTHER: u32 = 3;

pub(crate) const L2_BITS: u32 = 2;
pub(crate) const L2_PRIMITIVE: u32 = 0;
pub(crate) const L2_ARRAY: u32 = 1;
pub(crate) const L2_LIST: u32 = 2;
pub(crate) const L2_OTHER: u32 = 3;

pub(crate) const L3_BITS: u32 = 4;
pub(crate) const L3_TYPE: u32 = 0;

pub(crate) const ELEMENT_TYPE_BITS: u32 = 4;
pub(crate) const ARRAY_DEPTH_BITS: u32 = 4;
pub(crate) const FINGERPRINT_BITS: u32 = 32;

/// Lists are pre-sized up to this many slots before their elements arrive.
const PREALLOC_LIMIT: usize = 1024;

/// Which signature parts appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureMask(u8);

impl SignatureMask {
    pub const EMPTY: SignatureMask = SignatureMask(0);
    /// Presence/kind header (null, duplicate, reference, other).
    pub const HEADER: SignatureMask = SignatureMask(0x01);
    /// Explicit type tag or fingerprint.
    pub const TYPE: SignatureMask = SignatureMask(0x02);
    /// Explicit element count.
    pub const LENGTH: SignatureMask = SignatureMask(0x04);
    pub const ALL: SignatureMask = SignatureMask(0x07);

    #[inline]
    pub fn contains(self, part: SignatureMask) -> bool {
        self.0 & part.0 == part.0
    }

    #[inline]
    pub fn without(self, part: SignatureMask) -> SignatureMask {
        SignatureMask(self.0 & !part.0)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for SignatureMask {
    type Output = SignatureMask;

    fn bitor(self, rhs: Self) -> Self {
        SignatureMask(self.0 | rhs.0)
    }
}

/// Mask for a slot of declared type `expected` carrying `hints`.
///
/// Used identically before encoding and before decoding.
pub fn compute_mask(expected: Option<&ValueDescriptor>, hints: Option<&Hints>) -> SignatureMask {
    let hints = hints.copied().unwrap_or_default();
    let mut mask = SignatureMask::ALL;

    if hints.array_size != 0 {
        mask = mask.without(SignatureMask::LENGTH);
    }

    if let Some(expected) = expected {
        if !expected.needs_signature() {
            mask = SignatureMask::EMPTY;
        } else if hints.is_fixed_type() || expected.sealing().is_sealed() {
            mask = mask.without(SignatureMask::TYPE);
        }
    }

    if !mask.contains(SignatureMask::TYPE) && hints.is_never_null() {
        mask = mask.without(SignatureMask::HEADER);
    }
    mask
}

/// State shared by every frame of one encode or decode pass.
pub(crate) struct Session<'a> {
    pub(crate) stream: &'a BitStream,
    pub(crate) registry: &'a TypeFingerprintRegistry,
    pub(crate) duplicates: DuplicateTable,
    /// Longest collection a decode pass will accept (None = unbounded).
    pub(crate) max_length: Option<usize>,
}

impl<'a> Session<'a> {
    pub(crate) fn new(stream: &'a BitStream, registry: &'a TypeFingerprintRegistry) -> Self {
        Self {
            stream,
            registry,
            duplicates: DuplicateTable::new(),
            max_length: None,
        }
    }

    pub(crate) fn with_max_length(mut self, max_length: Option<usize>) -> Self {
        self.max_length = max_length;
        self
    }

    pub(crate) fn write_fingerprint(&self, ty: &TypeRef) -> Result<()> {
        let hash = self.registry.fingerprint(ty)?;
        self.stream.write_bits(hash, FINGERPRINT_BITS)
    }

    pub(crate) fn read_fingerprint(&self) -> Result<TypeRef> {
        let hash = self.stream.read_bits(FINGERPRINT_BITS)?;
        self.registry.resolve(hash)
    }

    fn write_tags(&self, tags: &[(u32, u32)]) -> Result<()> {
        for &(value, bits) in tags {
            self.stream.write_bits(value, bits)?;
        }
        Ok(())
    }

    fn read_primitive_kind(&self) -> Result<ElementKind> {
        let tag = self.stream.read_bits(ELEMENT_TYPE_BITS)?;
        u8::try_from(tag)
            .ok()
            .and_then(ElementKind::from_tag)
            .ok_or_else(|| Error::malformed(format!("invalid element type tag {:#x}", tag)))
    }
}

/// Declared type and hints of the slot a value is read from or written to.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Site<'d> {
    pub(crate) expected: Option<&'d ValueDescriptor>,
    pub(crate) hints: Option<Hints>,
}

impl<'d> Site<'d> {
    pub(crate) fn mask(&self) -> SignatureMask {
        compute_mask(self.expected, self.hints.as_ref())
    }

    pub(crate) fn hints(&self) -> Hints {
        self.hints.unwrap_or_default()
    }

    /// Type implied by the declaration when no type tag is written.
    fn forced(&self, mask: SignatureMask) -> Option<&'d TypeRef> {
        if mask.contains(SignatureMask::TYPE) {
            None
        } else {
            self.expected.map(ValueDescriptor::ty)
        }
    }

    fn expected_name(&self) -> String {
        self.expected
            .map(|e| e.ty().name())
            .unwrap_or_else(|| "<none>".to_string())
    }
}

/// Outcome of writing a signature.
#[derive(Debug)]
pub(crate) enum Emitted {
    /// Nothing follows (null or back-reference).
    Done,
    /// The value's data follows.
    Data(ValueDescriptor),
}

/// Outcome of reading a signature.
#[derive(Debug)]
pub(crate) enum Received {
    /// Complete value (null, back-reference or type value).
    Done(Value),
    /// Allocated destination; its data follows.
    Data {
        descriptor: ValueDescriptor,
        value: Value,
        length: usize,
    },
}

pub(crate) fn encode_signature(session: &Session<'_>, site: Site<'_>, value: &Value) -> Result<Emitted> {
    let mask = site.mask();
    let hints = site.hints();

    if !mask.contains(SignatureMask::TYPE) {
        if let (Some(actual), Some(forced)) = (value.runtime_type(), site.forced(mask)) {
            if &actual != forced {
                return Err(Error::FixedTypeViolation {
                    expected: forced.name(),
                    actual: actual.name(),
                });
            }
        }
    }

    if value.is_null() {
        if mask.is_empty() {
            let is_string = site
                .expected
                .and_then(|e| e.base.primitive())
                .is_some_and(|kind| kind == ElementKind::String);
            if is_string {
                log::trace!("[signature] null string");
                session.stream.write_compressed_u32(COMPRESSED_ABSENT)?;
                return Ok(Emitted::Done);
            }
            return Err(Error::NoSignatureViolation(site.expected_name()));
        }
        if hints.is_never_null() {
            return Err(Error::PointerNeverNullViolation);
        }
        log::trace!("[signature] null");
        session.stream.write_bits(L1_NULL, L1_BITS)?;
        return Ok(Emitted::Done);
    }

    if let Some(index) = session.duplicates.search(value) {
        if !mask.contains(SignatureMask::HEADER) {
            return Err(Error::NoDuplicatesAllowedViolation(index));
        }
        log::trace!("[signature] duplicate #{}", index);
        session.stream.write_bits(L1_DUPLICATE, L1_BITS)?;
        session.stream.write_compressed_u32(index)?;
        return Ok(Emitted::Done);
    }

    let Some(descriptor) = ValueDescriptor::of_value(value)? else {
        return Ok(Emitted::Done);
    };
    emit_inner(session, mask, &hints, &descriptor, value)?;
    Ok(Emitted::Data(descriptor))
}

fn emit_inner(
    session: &Session<'_>,
    mask: SignatureMask,
    hints: &Hints,
    descriptor: &ValueDescriptor,
    value: &Value,
) -> Result<()> {
    let header = mask.contains(SignatureMask::HEADER);
    let typed = mask.contains(SignatureMask::TYPE);
    let mut length = None;

    if descriptor.is_type() {
        log::trace!("[signature] type value (mask {:?})", mask);
        if header {
            session.write_tags(&[(L1_OTHER, L1_BITS), (L2_OTHER, L2_BITS), (L3_TYPE, L3_BITS)])?;
        }
    } else if let Some(kind) = descriptor.base.primitive() {
        log::trace!("[signature] primitive {:?} (mask {:?})", kind, mask);
        if header {
            session.write_tags(&[(L1_OTHER, L1_BITS), (L2_PRIMITIVE, L2_BITS)])?;
        }
        if typed {
            session.stream.write_bits(kind.tag() as u32, ELEMENT_TYPE_BITS)?;
        }
    } else if descriptor.is_array() {
        log::trace!("[signature] array depth {} (mask {:?})", descriptor.depth, mask);
        if header {
            session.write_tags(&[(L1_OTHER, L1_BITS), (L2_ARRAY, L2_BITS)])?;
        }
        if typed {
            session.stream.write_bits(descriptor.depth as u32, ARRAY_DEPTH_BITS)?;
            let element = descriptor.sealing();
            match element.primitive() {
                Some(kind) => session.write_tags(&[
                    (L1_OTHER, L1_BITS),
                    (L2_PRIMITIVE, L2_BITS),
                    (kind.tag() as u32, ELEMENT_TYPE_BITS),
                ])?,
                None => {
                    session.stream.write_bits(L1_REFERENCE, L1_BITS)?;
                    session.write_fingerprint(&element.ty)?;
                }
            }
        }
        length = value.as_array().map(|a| a.lock().items.len());
    } else if descriptor.is_list() {
        if header {
            session.write_tags(&[(L1_OTHER, L1_BITS), (L2_LIST, L2_BITS)])?;
        }
        length = value.as_list().map(|l| l.lock().len());
    } else {
        log::trace!("[signature] reference {} (mask {:?})", descriptor.ty(), mask);
        if header {
            session.stream.write_bits(L1_REFERENCE, L1_BITS)?;
        }
        if typed {
            session.write_fingerprint(descriptor.ty())?;
        }
    }

    if let Some(length) = length {
        write_length(session, mask, hints, descriptor, length)?;
    }
    Ok(())
}

fn write_length(
    session: &Session<'_>,
    mask: SignatureMask,
    hints: &Hints,
    descriptor: &ValueDescriptor,
    length: usize,
) -> Result<()> {
    log::trace!("[signature] length {}", length);
    if !mask.contains(SignatureMask::LENGTH) {
        if hints.array_size == -1 {
            consume_rest_width(descriptor)?;
        }
        if hints.array_size > 0 && hints.array_size as usize != length {
            return Err(Error::ArraySizeViolation {
                expected: hints.array_size as i64,
                actual: length as i64,
            });
        }
        return Ok(());
    }

    if hints.bit_packed != 0 {
        let bits = length_width(hints)?;
        let limit = 1u64 << bits;
        if length as u64 >= limit {
            return Err(Error::ArraySizeViolation {
                expected: limit.saturating_sub(1).min(i64::MAX as u64) as i64,
                actual: length as i64,
            });
        }
        return session.stream.write_bits(length as u32, bits);
    }

    let length = u32::try_from(length)
        .map_err(|_| Error::ValueOutOfRange(format!("length {} exceeds 32 bits", length)))?;
    session.stream.write_compressed_u32(length)
}

pub(crate) fn decode_signature(session: &Session<'_>, site: Site<'_>) -> Result<Received> {
    let mask = site.mask();
    let hints = site.hints();
    let typed = mask.contains(SignatureMask::TYPE);
    let mut ty = site.forced(mask).cloned();

    if mask.contains(SignatureMask::HEADER) {
        match session.stream.read_bits(L1_BITS)? {
            L1_NULL => {
                if hints.is_never_null() {
                    return Err(Error::PointerNeverNullViolation);
                }
                log::trace!("[signature] null");
                return Ok(Received::Done(Value::Null));
            }
            L1_DUPLICATE => {
                let index = session.stream.read_compressed_u32()?;
                log::trace!("[signature] duplicate #{}", index);
                return Ok(Received::Done(session.duplicates.get(index)?));
            }
            L1_REFERENCE => {
                if typed {
                    ty = Some(session.read_fingerprint()?);
                }
            }
            _ => match session.stream.read_bits(L2_BITS)? {
                L2_PRIMITIVE => {
                    if typed {
                        ty = Some(TypeRef::Primitive(session.read_primitive_kind()?));
                    }
                }
                L2_ARRAY => {
                    if typed {
                        ty = Some(read_array_type(session)?);
                    }
                }
                L2_LIST => {
                    if typed {
                        ty = Some(TypeRef::List);
                    }
                }
                _ => {
                    let level3 = session.stream.read_bits(L3_BITS)?;
                    if level3 != L3_TYPE {
                        return Err(Error::malformed(format!(
                            "unexpected level 3 tag {}",
                            level3
                        )));
                    }
                    ty = Some(TypeRef::Type);
                }
            },
        }
    }

    let ty = ty.ok_or_else(|| Error::malformed("signature does not determine a type"))?;
    log::trace!("[signature] read {} (mask {:?})", ty, mask);
    let descriptor = ValueDescriptor::of(&ty)?;

    if descriptor.is_array() || descriptor.is_list() {
        let length = read_length(session, mask, &hints, &descriptor)?;
        check_length(session, &hints, &descriptor, length)?;
        let value = allocate_collection(&descriptor, length);
        return Ok(Received::Data {
            descriptor,
            value,
            length,
        });
    }

    if descriptor.is_type() {
        return Ok(Received::Done(Value::Type(session.read_fingerprint()?)));
    }

    let value = allocate(&descriptor)?;
    Ok(Received::Data {
        descriptor,
        value,
        length: 0,
    })
}

fn read_array_type(session: &Session<'_>) -> Result<TypeRef> {
    let depth = session.stream.read_bits(ARRAY_DEPTH_BITS)?;
    let element = match session.stream.read_bits(L1_BITS)? {
        L1_REFERENCE => session.read_fingerprint()?,
        L1_OTHER => match session.stream.read_bits(L2_BITS)? {
            L2_PRIMITIVE => TypeRef::Primitive(session.read_primitive_kind()?),
            level2 => {
                return Err(Error::malformed(format!(
                    "unexpected level 2 tag {} for array element",
                    level2
                )))
            }
        },
        level1 => {
            return Err(Error::malformed(format!(
                "unexpected level 1 tag {} for array element",
                level1
            )))
        }
    };
    Ok(ValueDescriptor::from_array_tags(depth, element)?.ty().clone())
}

fn read_length(
    session: &Session<'_>,
    mask: SignatureMask,
    hints: &Hints,
    descriptor: &ValueDescriptor,
) -> Result<usize> {
    if mask.contains(SignatureMask::LENGTH) {
        if hints.bit_packed != 0 {
            let bits = length_width(hints)?;
            return Ok(session.stream.read_bits(bits)? as usize);
        }
        return match session.stream.read_compressed_u32()? {
            COMPRESSED_ABSENT => Err(Error::malformed("absent length for a collection")),
            length => Ok(length as usize),
        };
    }

    match hints.array_size {
        -1 => {
            let width = consume_rest_width(descriptor)?;
            Ok(session.stream.bits_available() / width as usize)
        }
        size if size > 0 => Ok(size as usize),
        size => Err(Error::ArraySizeViolation {
            expected: size as i64,
            actual: 0,
        }),
    }
}

/// Reject lengths a complete, non-blocking stream cannot hold, before the
/// collection is allocated.
fn check_length(
    session: &Session<'_>,
    hints: &Hints,
    descriptor: &ValueDescriptor,
    length: usize,
) -> Result<()> {
    if let Some(max) = session.max_length {
        if length > max {
            return Err(Error::malformed(format!(
                "length {} exceeds the limit of {}",
                length, max
            )));
        }
    }
    let available = session.stream.bits_available();
    if session.stream.is_blocking() || length <= available {
        return Ok(());
    }
    let dense = match descriptor.item_type() {
        None => true,
        Some(item) if scalar::is_scalar(item) => true,
        Some(item) => {
            let item_hints = hints.for_elements();
            let mask = compute_mask(Some(&ValueDescriptor::of(item)?), item_hints.as_ref());
            mask.contains(SignatureMask::HEADER) || mask.contains(SignatureMask::TYPE)
        }
    };
    if dense {
        return Err(Error::malformed(format!(
            "length {} exceeds the {} bits left",
            length, available
        )));
    }
    Ok(())
}

/// Width of a bit-packed length field.
fn length_width(hints: &Hints) -> Result<u32> {
    if hints.bit_packed > 32 {
        return Err(Error::ArraySizeViolation {
            expected: i64::from(u32::MAX),
            actual: i64::from(hints.bit_packed),
        });
    }
    Ok(hints.bit_packed)
}

/// Element width for arrays that extend to the end of the stream: only
/// flat arrays of primitives at least one byte wide qualify, so byte
/// padding never reads back as extra elements.
fn consume_rest_width(descriptor: &ValueDescriptor) -> Result<u32> {
    let width = if descriptor.is_array() && descriptor.depth == 1 {
        descriptor
            .element
            .as_ref()
            .and_then(|e| e.primitive())
            .and_then(ElementKind::bit_width)
    } else {
        None
    };
    width.filter(|&bits| bits >= 8).ok_or(Error::ArraySizeViolation {
        expected: -1,
        actual: 0,
    })
}

/// Arrays are pre-filled up to [`PREALLOC_LIMIT`] items; the rest are
/// appended as they are decoded.
fn allocate_collection(descriptor: &ValueDescriptor, length: usize) -> Value {
    match descriptor.item_type() {
        Some(item) => Value::array(
            item.clone(),
            vec![Value::default_for(item); length.min(PREALLOC_LIMIT)],
        ),
        None => Value::list(Vec::with_capacity(length.min(PREALLOC_LIMIT))),
    }
}

/// Destination for a non-collection value whose data follows.
fn allocate(descriptor: &ValueDescriptor) -> Result<Value> {
    match descriptor.ty() {
        TypeRef::Object => Err(Error::UnsupportedType(
            "cannot instantiate object".to_string(),
        )),
        TypeRef::Named(def) => {
            if !def.is_serializable() {
                return Err(Error::UnsupportedType(format!(
                    "{} is not serializable",
                    def.name()
                )));
            }
            match def.kind() {
                TypeKind::Class => Ok(Value::object(ObjectData::new(def))),
                TypeKind::Interface => Err(Error::UnsupportedType(format!(
                    "cannot instantiate interface {}",
                    def.name()
                ))),
                TypeKind::ValueType | TypeKind::Enum(_) => Ok(Value::default_for(descriptor.ty())),
            }
        }
        other => Ok(Value::default_for(other)),
    }
}
