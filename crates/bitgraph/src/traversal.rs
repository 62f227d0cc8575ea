// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Iterative graph walk.
//!
//! Each value being processed owns one [`Frame`] on an explicit stack, so
//! graph depth never grows the native call stack. A frame moves through
//!
//! ```text
//! Pending -> signature -> (scalar data | Fields | Elements) -> popped
//! ```
//!
//! On decode, popping a frame stores its value into the parent's field or
//! element slot; popping the root yields the result.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::descriptor::ValueDescriptor;
use crate::error::{Error, Result};
use crate::model::{Hints, TypeDef, TypeKind, Value};
use crate::scalar;
use crate::signature::{self, Emitted, Received, Session, Site};

/// Declared type and hints the root value is bound to.
#[derive(Debug, Clone, Default)]
pub(crate) struct RootBinding {
    pub(crate) expected: Option<ValueDescriptor>,
    pub(crate) hints: Option<Hints>,
}

/// Where a frame's value lives in its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Root,
    Field(usize),
    Element(usize),
}

#[derive(Debug)]
enum Phase {
    Pending,
    Fields {
        def: Arc<TypeDef>,
        next: usize,
    },
    Elements {
        next: usize,
        len: usize,
        item: Option<ValueDescriptor>,
    },
}

#[derive(Debug)]
struct Frame {
    origin: Origin,
    expected: Option<ValueDescriptor>,
    hints: Option<Hints>,
    value: Value,
    phase: Phase,
}

impl Frame {
    fn new(
        origin: Origin,
        expected: Option<ValueDescriptor>,
        hints: Option<Hints>,
        value: Value,
    ) -> Self {
        Self {
            origin,
            expected,
            hints,
            value,
            phase: Phase::Pending,
        }
    }

    fn site(&self) -> Site<'_> {
        Site {
            expected: self.expected.as_ref(),
            hints: self.hints,
        }
    }

    /// Child frame for the next serialized field, if any remain.
    fn next_field(&mut self, value: impl FnOnce(&Value, usize) -> Value) -> Result<Option<Frame>> {
        let Phase::Fields { def, next } = &mut self.phase else {
            return Ok(None);
        };
        while let Some(field) = def.field_at(*next) {
            let slot = *next;
            *next += 1;
            if field.transient {
                continue;
            }
            let hints = if matches!(def.kind(), TypeKind::Enum(_)) {
                self.hints
            } else {
                field.hints
            };
            let expected = ValueDescriptor::of(&field.ty)?;
            let child = value(&self.value, slot);
            return Ok(Some(Frame::new(Origin::Field(slot), Some(expected), hints, child)));
        }
        Ok(None)
    }

    /// Child frame for the next element, if any remain.
    fn next_element(&mut self, value: impl FnOnce(&Value, usize) -> Value) -> Option<Frame> {
        let Phase::Elements { next, len, item } = &mut self.phase else {
            return None;
        };
        if *next >= *len {
            return None;
        }
        let index = *next;
        *next += 1;
        let hints = self.hints.and_then(|h| h.for_elements());
        let child = value(&self.value, index);
        Some(Frame::new(Origin::Element(index), item.clone(), hints, child))
    }
}

enum Step {
    Push(Frame),
    Pop,
    Continue,
}

/// Frame stack with an optional depth cap.
struct FrameStack {
    frames: Vec<Frame>,
    max_depth: Option<usize>,
}

impl FrameStack {
    fn new(root: Frame, max_depth: Option<usize>) -> Self {
        Self {
            frames: vec![root],
            max_depth,
        }
    }

    fn push(&mut self, frame: Frame) -> Result<()> {
        if let Some(max) = self.max_depth {
            if self.frames.len() >= max {
                return Err(Error::DepthLimitExceeded(max));
            }
        }
        self.frames.push(frame);
        Ok(())
    }
}

/// Record a freshly visited composite in encounter order.
///
/// Arrays and lists are always recorded; other composites only when their
/// slot carries a signature, i.e. when a back-reference could name them.
fn track_object(
    session: &mut Session<'_>,
    expected: Option<&ValueDescriptor>,
    descriptor: &ValueDescriptor,
    value: &Value,
) {
    let tracked = descriptor.is_array()
        || descriptor.is_list()
        || expected.map_or(true, ValueDescriptor::needs_signature);
    if tracked {
        session.duplicates.track(value);
    }
}

/// Phase a composite enters once its signature is done.
fn composite_phase(descriptor: &ValueDescriptor, value: &Value, len: usize) -> Result<Phase> {
    if descriptor.is_array() {
        let item = descriptor
            .item_type()
            .map(ValueDescriptor::of)
            .transpose()?;
        return Ok(Phase::Elements { next: 0, len, item });
    }
    if descriptor.is_list() {
        return Ok(Phase::Elements {
            next: 0,
            len,
            item: None,
        });
    }
    let def = match value {
        Value::Object(o) => Arc::clone(o.lock().type_def()),
        Value::Struct(s) => Arc::clone(s.type_def()),
        Value::Enum(e) => Arc::clone(&e.ty),
        other => {
            return Err(Error::UnsupportedType(format!(
                "{:?} has no fields",
                other
            )))
        }
    };
    Ok(Phase::Fields { def, next: 0 })
}

fn collection_len(value: &Value) -> usize {
    match value {
        Value::Array(a) => a.lock().items.len(),
        Value::List(l) => l.lock().len(),
        _ => 0,
    }
}

fn field_value(value: &Value, slot: usize) -> Value {
    match value {
        Value::Object(o) => o.lock().slot(slot).cloned().unwrap_or_default(),
        Value::Struct(s) => s.slot(slot).cloned().unwrap_or_default(),
        Value::Enum(e) => Value::from_enum_raw(e.underlying(), e.value),
        _ => Value::Null,
    }
}

fn element_value(value: &Value, index: usize) -> Value {
    match value {
        Value::Array(a) => a.lock().items.get(index).cloned().unwrap_or_default(),
        Value::List(l) => l.lock().get(index).cloned().unwrap_or_default(),
        _ => Value::Null,
    }
}

/// Store a completed child into the slot it was read for.
fn store(parent: &mut Value, origin: Origin, child: Value) -> Result<()> {
    match (origin, parent) {
        (Origin::Field(slot), Value::Object(o)) => o.lock().set_slot(slot, child),
        (Origin::Field(slot), Value::Struct(s)) => s.set_slot(slot, child),
        (Origin::Field(_), Value::Enum(e)) => {
            e.value = child
                .to_enum_raw()
                .ok_or_else(|| Error::malformed(format!("{:?} is not an enum value", child)))?;
            Ok(())
        }
        (Origin::Element(index), Value::Array(a)) => {
            let mut data = a.lock();
            match index.cmp(&data.items.len()) {
                Ordering::Less => data.items[index] = child,
                Ordering::Equal => data.items.push(child),
                Ordering::Greater => {
                    return Err(Error::malformed(format!(
                        "array index {} out of bounds",
                        index
                    )))
                }
            }
            Ok(())
        }
        (Origin::Element(_), Value::List(l)) => {
            l.lock().push(child);
            Ok(())
        }
        (origin, parent) => Err(Error::malformed(format!(
            "{:?} cannot hold a child at {:?}",
            parent, origin
        ))),
    }
}

/// Write `root` and everything reachable from it.
pub(crate) fn encode_graph(
    session: &mut Session<'_>,
    root: &Value,
    binding: RootBinding,
    max_depth: Option<usize>,
) -> Result<()> {
    let frame = Frame::new(Origin::Root, binding.expected, binding.hints, root.clone());
    let mut stack = FrameStack::new(frame, max_depth);

    while let Some(top) = stack.frames.last_mut() {
        let step = match top.phase {
            Phase::Pending => encode_pending(session, top)?,
            Phase::Fields { .. } => top.next_field(field_value)?.map_or(Step::Pop, Step::Push),
            Phase::Elements { .. } => top.next_element(element_value).map_or(Step::Pop, Step::Push),
        };
        match step {
            Step::Push(child) => stack.push(child)?,
            Step::Pop => {
                stack.frames.pop();
            }
            Step::Continue => {}
        }
    }
    Ok(())
}

fn encode_pending(session: &mut Session<'_>, frame: &mut Frame) -> Result<Step> {
    let descriptor = match signature::encode_signature(session, frame.site(), &frame.value)? {
        Emitted::Done => return Ok(Step::Pop),
        Emitted::Data(descriptor) => descriptor,
    };

    if let Value::Type(ty) = &frame.value {
        session.write_fingerprint(ty)?;
        return Ok(Step::Pop);
    }
    if scalar::is_scalar(descriptor.ty()) {
        let hints = frame.hints.unwrap_or_default();
        scalar::encode_scalar(session.stream, &frame.value, &hints)?;
        return Ok(Step::Pop);
    }

    track_object(session, frame.expected.as_ref(), &descriptor, &frame.value);
    let len = collection_len(&frame.value);
    frame.phase = composite_phase(&descriptor, &frame.value, len)?;
    Ok(Step::Continue)
}

/// Read one value graph.
pub(crate) fn decode_graph(
    session: &mut Session<'_>,
    binding: RootBinding,
    max_depth: Option<usize>,
) -> Result<Value> {
    let frame = Frame::new(Origin::Root, binding.expected, binding.hints, Value::Null);
    let mut stack = FrameStack::new(frame, max_depth);

    while let Some(top) = stack.frames.last_mut() {
        let step = match top.phase {
            Phase::Pending => decode_pending(session, top)?,
            Phase::Fields { .. } => top.next_field(|_, _| Value::Null)?.map_or(Step::Pop, Step::Push),
            Phase::Elements { .. } => top
                .next_element(|_, _| Value::Null)
                .map_or(Step::Pop, Step::Push),
        };
        match step {
            Step::Push(child) => stack.push(child)?,
            Step::Pop => {
                let Some(done) = stack.frames.pop() else {
                    break;
                };
                match stack.frames.last_mut() {
                    Some(parent) => store(&mut parent.value, done.origin, done.value)?,
                    None => return Ok(done.value),
                }
            }
            Step::Continue => {}
        }
    }
    Err(Error::malformed("traversal ended without a root value"))
}

fn decode_pending(session: &mut Session<'_>, frame: &mut Frame) -> Result<Step> {
    let (descriptor, value, length) = match signature::decode_signature(session, frame.site())? {
        Received::Done(value) => {
            frame.value = value;
            return Ok(Step::Pop);
        }
        Received::Data {
            descriptor,
            value,
            length,
        } => (descriptor, value, length),
    };

    if scalar::is_scalar(descriptor.ty()) {
        let hints = frame.hints.unwrap_or_default();
        frame.value = scalar::decode_scalar(session.stream, descriptor.ty(), &hints)?;
        return Ok(Step::Pop);
    }

    track_object(session, frame.expected.as_ref(), &descriptor, &value);
    frame.phase = composite_phase(&descriptor, &value, length)?;
    frame.value = value;
    Ok(Step::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::BitStream;
    use crate::fingerprint::TypeFingerprintRegistry;
    use crate::model::{ElementKind, ObjectData, StructValue, TypeDefBuilder, TypeRef};

    fn encode(value: &Value, binding: RootBinding, registry: &TypeFingerprintRegistry) -> BitStream {
        let stream = BitStream::new();
        let mut session = Session::new(&stream, registry);
        encode_graph(&mut session, value, binding, None).expect("encode");
        stream
    }

    fn decode(stream: &BitStream, binding: RootBinding, registry: &TypeFingerprintRegistry) -> Value {
        let mut session = Session::new(stream, registry);
        decode_graph(&mut session, binding, None).expect("decode")
    }

    #[test]
    fn test_nested_lists_round_trip() {
        let registry = TypeFingerprintRegistry::new();
        let inner = Value::list(vec![Value::I32(1), Value::from("two"), Value::Null]);
        let root = Value::list(vec![inner, Value::Bool(true), Value::list(vec![])]);

        let stream = encode(&root, RootBinding::default(), &registry);
        assert_eq!(decode(&stream, RootBinding::default(), &registry), root);
    }

    #[test]
    fn test_struct_and_enum_fields() {
        let mode = TypeDefBuilder::enumeration("Mode", ElementKind::U1).build();
        let sample = TypeDefBuilder::value_type("Sample")
            .field("mode", TypeRef::named(&mode))
            .field("reading", TypeRef::Primitive(ElementKind::R4))
            .build();
        let holder = TypeDefBuilder::class("Holder")
            .field("sample", TypeRef::named(&sample))
            .build();

        let mut s = StructValue::new(&sample);
        s.set("mode", Value::Enum(crate::model::EnumValue::new(&mode, 3)))
            .expect("set");
        s.set("reading", 1.5f32).expect("set");
        let mut h = ObjectData::new(&holder);
        h.set("sample", Value::Struct(s)).expect("set");
        let root = Value::object(h);

        let registry = TypeFingerprintRegistry::new();
        let stream = encode(&root, RootBinding::default(), &registry);
        // header 2 + fingerprint 32 + enum 8 + f32 32
        assert_eq!(stream.len_bits(), 74);
        assert_eq!(decode(&stream, RootBinding::default(), &registry), root);
    }

    #[test]
    fn test_transient_fields_are_skipped() {
        let def = TypeDefBuilder::class("Cache")
            .field("key", TypeRef::Primitive(ElementKind::I4))
            .transient_field("scratch", TypeRef::Primitive(ElementKind::I4))
            .build();
        let mut data = ObjectData::new(&def);
        data.set("key", 9).expect("set");
        data.set("scratch", 77).expect("set");

        let registry = TypeFingerprintRegistry::new();
        let stream = encode(&Value::object(data), RootBinding::default(), &registry);
        assert_eq!(stream.len_bits(), 2 + 32 + 32);

        let back = decode(&stream, RootBinding::default(), &registry);
        let back = back.as_object().expect("object").lock().clone();
        assert_eq!(back.get("key"), Some(&Value::I32(9)));
        assert_eq!(back.get("scratch"), Some(&Value::I32(0)));
    }

    #[test]
    fn test_shared_list_decodes_to_one_instance() {
        let shared = Value::list(vec![Value::U8(1)]);
        let root = Value::list(vec![shared.clone(), shared]);

        let registry = TypeFingerprintRegistry::new();
        let stream = encode(&root, RootBinding::default(), &registry);
        let back = decode(&stream, RootBinding::default(), &registry);

        let items = back.as_list().expect("list").lock().clone();
        match (&items[0], &items[1]) {
            (Value::List(a), Value::List(b)) => assert!(a.ptr_eq(b)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_round_trips() {
        let node = TypeDefBuilder::class("Node").self_field("next").build();
        let value = Value::object(ObjectData::new(&node));
        value
            .as_object()
            .expect("object")
            .lock()
            .set("next", value.clone())
            .expect("set");

        let registry = TypeFingerprintRegistry::new();
        let stream = encode(&value, RootBinding::default(), &registry);
        let back = decode(&stream, RootBinding::default(), &registry);

        let back_ref = back.as_object().expect("object");
        let next = back_ref.lock().get("next").cloned().expect("field");
        assert!(next.as_object().expect("object").ptr_eq(back_ref));
    }

    #[test]
    fn test_depth_limit() {
        let mut root = Value::list(vec![]);
        for _ in 0..8 {
            root = Value::list(vec![root]);
        }
        let registry = TypeFingerprintRegistry::new();
        let stream = BitStream::new();
        let mut session = Session::new(&stream, &registry);

        assert!(matches!(
            encode_graph(&mut session, &root, RootBinding::default(), Some(4)),
            Err(Error::DepthLimitExceeded(4))
        ));

        let stream = encode(&root, RootBinding::default(), &registry);
        let mut session = Session::new(&stream, &registry);
        assert!(matches!(
            decode_graph(&mut session, RootBinding::default(), Some(4)),
            Err(Error::DepthLimitExceeded(4))
        ));
    }

    #[test]
    fn test_element_hints_are_restricted() {
        let ty = TypeRef::array_of(TypeRef::Primitive(ElementKind::I4));
        let binding = RootBinding {
            expected: Some(ValueDescriptor::of(&ty).expect("classify")),
            hints: Some(Hints::root().bit_packed(3)),
        };
        // The 3-bit width packs the length only; elements keep 32 bits.
        let root = Value::array(
            TypeRef::Primitive(ElementKind::I4),
            vec![Value::I32(100_000), Value::I32(-1)],
        );

        let registry = TypeFingerprintRegistry::new();
        let stream = encode(&root, binding.clone(), &registry);
        assert_eq!(stream.len_bits(), 3 + 64);
        assert_eq!(decode(&stream, binding, &registry), root);
    }
}
