// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Public entry points: [`BinaryFormatter`] and its configuration.

use std::sync::Arc;

use crate::bitstream::{BitStream, DEFAULT_CHUNK_CAPACITY};
use crate::descriptor::ValueDescriptor;
use crate::error::Result;
use crate::fingerprint::TypeFingerprintRegistry;
use crate::model::{Hints, TypeRef, Value};
use crate::signature::Session;
use crate::traversal::{self, RootBinding};

/// Formatter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterConfig {
    /// Output chunk size in bytes.
    pub chunk_capacity: usize,

    /// Cap on the traversal frame stack (None = unbounded).
    pub max_depth: Option<usize>,

    /// Longest array or list accepted on decode (None = unbounded).
    pub max_length: Option<usize>,

    /// Decode every serialized buffer before returning it.
    pub verify_round_trip: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            max_depth: None,
            max_length: None,
            verify_round_trip: false,
        }
    }
}

impl FormatterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set output chunk size in bytes.
    pub fn chunk_capacity(mut self, bytes: usize) -> Self {
        self.chunk_capacity = bytes;
        self
    }

    /// Set maximum traversal depth.
    pub fn max_depth(mut self, frames: usize) -> Self {
        self.max_depth = Some(frames);
        self
    }

    /// Set maximum decoded collection length.
    pub fn max_length(mut self, items: usize) -> Self {
        self.max_length = Some(items);
        self
    }

    /// Enable or disable the post-serialize decode check.
    pub fn verify_round_trip(mut self, enabled: bool) -> Self {
        self.verify_round_trip = enabled;
        self
    }
}

/// Encodes value graphs to compact bit-packed buffers and back.
///
/// Type fingerprints are resolved through a [`TypeFingerprintRegistry`]
/// that lives as long as the formatter. Encoding registers types lazily;
/// a formatter that only decodes must be told the root types up front with
/// [`BinaryFormatter::with_types`] (or share a registry with the encoder).
///
/// # Example
///
/// ```rust
/// use bitgraph::{BinaryFormatter, Value};
/// use bitgraph::model::{ElementKind, ObjectData, TypeDefBuilder, TypeRef};
///
/// # fn main() -> bitgraph::Result<()> {
/// let sensor = TypeDefBuilder::class("Sensor")
///     .string_field("name")
///     .field("reading", TypeRef::Primitive(ElementKind::R8))
///     .build();
/// let value = Value::object(
///     ObjectData::new(&sensor)
///         .with("name", "probe-1")?
///         .with("reading", 21.5)?,
/// );
///
/// let bytes = BinaryFormatter::new().serialize(&value)?;
///
/// let decoder = BinaryFormatter::new().with_types(&[TypeRef::named(&sensor)])?;
/// assert_eq!(decoder.deserialize(&bytes)?, value);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BinaryFormatter {
    config: FormatterConfig,
    registry: Arc<TypeFingerprintRegistry>,
}

impl Default for BinaryFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryFormatter {
    pub fn new() -> Self {
        Self::with_config(FormatterConfig::default())
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            registry: Arc::new(TypeFingerprintRegistry::new()),
        }
    }

    /// Use a registry shared with other formatters.
    pub fn with_registry(mut self, registry: Arc<TypeFingerprintRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Register `types` and everything reachable from them.
    ///
    /// Fails with `TypeFingerprintCollision` when two distinct types hash
    /// alike; nothing from the colliding type's closure is registered.
    pub fn with_types(self, types: &[TypeRef]) -> Result<Self> {
        for ty in types {
            self.registry.register(ty)?;
        }
        Ok(self)
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeFingerprintRegistry> {
        &self.registry
    }

    /// Encode a graph whose root carries a full signature.
    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        self.serialize_bound(value, RootBinding::default())
    }

    /// Encode a graph whose root is known to be a non-null `ty`.
    ///
    /// The root is bound with `FIXED_TYPE | POINTER_NEVER_NULL`, so its
    /// signature shrinks to what the declared type leaves open.
    pub fn serialize_typed(&self, ty: &TypeRef, value: &Value) -> Result<Vec<u8>> {
        self.serialize_bound(value, typed_root(ty)?)
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        self.deserialize_bound(&BitStream::from_bytes(bytes), RootBinding::default())
    }

    /// Decode a buffer produced by [`BinaryFormatter::serialize_typed`].
    pub fn deserialize_typed(&self, ty: &TypeRef, bytes: &[u8]) -> Result<Value> {
        self.deserialize_bound(&BitStream::from_bytes(bytes), typed_root(ty)?)
    }

    /// Decode one graph from `stream`, which may still be filling up.
    ///
    /// With a [`BitStream::blocking`] stream, reads wait for the producer to
    /// append more data or mark the stream ended.
    pub fn deserialize_stream(&self, stream: &BitStream) -> Result<Value> {
        self.deserialize_bound(stream, RootBinding::default())
    }

    fn serialize_bound(&self, value: &Value, binding: RootBinding) -> Result<Vec<u8>> {
        log::debug!("[formatter] serialize start");
        let stream = BitStream::with_chunk_capacity(self.config.chunk_capacity);
        let mut session = Session::new(&stream, &self.registry);
        traversal::encode_graph(&mut session, value, binding.clone(), self.config.max_depth)?;

        let bytes = stream.to_bytes();
        log::debug!(
            "[formatter] serialize done: {} bits, {} objects tracked",
            stream.len_bits(),
            session.duplicates.len()
        );

        if self.config.verify_round_trip {
            if let Err(e) = self.deserialize_bound(&BitStream::from_bytes(&bytes), binding) {
                log::warn!("[formatter] round-trip check failed: {}", e);
                return Err(e);
            }
        }
        Ok(bytes)
    }

    fn deserialize_bound(&self, stream: &BitStream, binding: RootBinding) -> Result<Value> {
        log::debug!("[formatter] deserialize start");
        let mut session =
            Session::new(stream, &self.registry).with_max_length(self.config.max_length);
        let value = traversal::decode_graph(&mut session, binding, self.config.max_depth)?;
        log::debug!(
            "[formatter] deserialize done: {} objects tracked",
            session.duplicates.len()
        );
        Ok(value)
    }
}

fn typed_root(ty: &TypeRef) -> Result<RootBinding> {
    Ok(RootBinding {
        expected: Some(ValueDescriptor::of(ty)?),
        hints: Some(Hints::root()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{ElementKind, ObjectData, StructValue, TypeDefBuilder};

    #[test]
    fn test_config_builder() {
        let config = FormatterConfig::new()
            .chunk_capacity(16)
            .max_depth(32)
            .max_length(4096)
            .verify_round_trip(true);
        assert_eq!(config.chunk_capacity, 16);
        assert_eq!(config.max_depth, Some(32));
        assert_eq!(config.max_length, Some(4096));
        assert!(config.verify_round_trip);
        assert_eq!(FormatterConfig::default().chunk_capacity, 512);
    }

    #[test]
    fn test_zero_width_items_grow_past_prefill() {
        let marker = TypeDefBuilder::value_type("Marker").build();
        let ty = TypeRef::array_of(TypeRef::named(&marker));
        let items = vec![Value::Struct(StructValue::new(&marker)); 3000];
        let value = Value::array(TypeRef::named(&marker), items);
        let formatter = BinaryFormatter::new();

        // compressed length only, items take no bits
        let bytes = formatter.serialize_typed(&ty, &value).expect("serialize");
        assert_eq!(bytes, vec![0x8B, 0xB8]);
        assert_eq!(formatter.deserialize_typed(&ty, &bytes), Ok(value));
    }

    #[test]
    fn test_max_length_rejects_long_collections() {
        let marker = TypeDefBuilder::value_type("Marker").build();
        let ty = TypeRef::array_of(TypeRef::named(&marker));
        let formatter = BinaryFormatter::with_config(FormatterConfig::new().max_length(1000));

        assert!(matches!(
            formatter.deserialize_typed(&ty, &[0xFE, 0xFF, 0xFF, 0xFF]),
            Err(Error::Malformed(_))
        ));
        let short = Value::array(
            TypeRef::named(&marker),
            vec![Value::Struct(StructValue::new(&marker)); 2],
        );
        let bytes = formatter.serialize_typed(&ty, &short).expect("serialize");
        assert_eq!(formatter.deserialize_typed(&ty, &bytes), Ok(short));
    }

    #[test]
    fn test_small_chunks_produce_same_bytes() {
        let value = Value::list((0..100).map(Value::I32).collect());
        let wide = BinaryFormatter::new().serialize(&value).expect("serialize");
        let narrow = BinaryFormatter::with_config(FormatterConfig::new().chunk_capacity(3))
            .serialize(&value)
            .expect("serialize");
        assert_eq!(wide, narrow);
    }

    #[test]
    fn test_typed_root_omits_signature() {
        let ty = TypeRef::Primitive(ElementKind::U2);
        let formatter = BinaryFormatter::new();

        let bytes = formatter.serialize_typed(&ty, &Value::U16(0xBEEF)).expect("serialize");
        assert_eq!(bytes, vec![0xBE, 0xEF]);
        assert_eq!(
            formatter.deserialize_typed(&ty, &bytes),
            Ok(Value::U16(0xBEEF))
        );

        let untyped = formatter.serialize(&Value::U16(0xBEEF)).expect("serialize");
        assert_eq!(untyped.len(), 3);
    }

    #[test]
    fn test_typed_root_rejects_null_and_wrong_type() {
        let thing = TypeDefBuilder::class("Thing").build();
        let ty = TypeRef::named(&thing);
        let formatter = BinaryFormatter::new();

        assert!(matches!(
            formatter.serialize_typed(&ty, &Value::Null),
            Err(Error::PointerNeverNullViolation)
        ));
        assert!(matches!(
            formatter.serialize_typed(&ty, &Value::I32(1)),
            Err(Error::FixedTypeViolation { .. })
        ));
    }

    #[test]
    fn test_fresh_decoder_needs_types() {
        let thing = TypeDefBuilder::class("Thing")
            .field("n", TypeRef::Primitive(ElementKind::I4))
            .build();
        let value = Value::object(ObjectData::new(&thing));
        let bytes = BinaryFormatter::new().serialize(&value).expect("serialize");

        assert!(matches!(
            BinaryFormatter::new().deserialize(&bytes),
            Err(Error::UnknownTypeFingerprint(_))
        ));

        let decoder = BinaryFormatter::new()
            .with_types(&[TypeRef::named(&thing)])
            .expect("register");
        assert_eq!(decoder.deserialize(&bytes), Ok(value));
    }

    #[test]
    fn test_shared_registry() {
        let thing = TypeDefBuilder::class("Thing").build();
        let encoder = BinaryFormatter::new();
        let decoder = BinaryFormatter::new().with_registry(Arc::clone(encoder.registry()));

        let value = Value::object(ObjectData::new(&thing));
        let bytes = encoder.serialize(&value).expect("serialize");
        assert_eq!(decoder.deserialize(&bytes), Ok(value));
    }

    #[test]
    fn test_verify_round_trip_passes_good_output() {
        let formatter =
            BinaryFormatter::with_config(FormatterConfig::new().verify_round_trip(true));
        let value = Value::list(vec![Value::from("a"), Value::F64(f64::NAN)]);
        assert!(formatter.serialize(&value).is_ok());
    }

    #[test]
    fn test_truncated_input() {
        let bytes = BinaryFormatter::new()
            .serialize(&Value::from("hello"))
            .expect("serialize");
        assert!(matches!(
            BinaryFormatter::new().deserialize(&bytes[..3]),
            Err(Error::EndOfStream)
        ));
    }
}
