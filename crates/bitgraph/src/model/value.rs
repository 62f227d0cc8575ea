// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic values forming the object graph.
//!
//! Classes, arrays and lists are shared through [`Shared`] handles, so the
//! same instance can appear in several places of a graph; the codec preserves
//! that identity. Value types and enums are plain owned data.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::model::{ElementKind, TypeDef, TypeKind, TypeRef};

/// Shared, lockable handle with reference identity.
pub struct Shared<T>(Arc<Mutex<T>>);

impl<T> Shared<T> {
    pub fn new(inner: T) -> Self {
        Self(Arc::new(Mutex::new(inner)))
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock()
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// Generate name- and slot-based field access for composite values.
macro_rules! impl_field_access {
    ($ty:ident) => {
        impl $ty {
            pub fn type_def(&self) -> &Arc<TypeDef> {
                &self.ty
            }

            pub fn fields(&self) -> &[Value] {
                &self.fields
            }

            pub fn get(&self, name: &str) -> Option<&Value> {
                self.ty.slot_of(name).and_then(|slot| self.fields.get(slot))
            }

            pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
                let slot = self.ty.slot_of(name).ok_or_else(|| {
                    Error::UnsupportedType(format!("{} has no field {}", self.ty.name(), name))
                })?;
                self.set_slot(slot, value.into())
            }

            pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
                self.set(name, value)?;
                Ok(self)
            }

            pub(crate) fn slot(&self, slot: usize) -> Option<&Value> {
                self.fields.get(slot)
            }

            pub(crate) fn set_slot(&mut self, slot: usize, value: Value) -> Result<()> {
                let target = self.fields.get_mut(slot).ok_or_else(|| {
                    Error::malformed(format!("{} has no field slot {}", self.ty.name(), slot))
                })?;
                *target = value;
                Ok(())
            }
        }
    };
}

/// Instance of a class.
#[derive(Debug, Clone)]
pub struct ObjectData {
    ty: Arc<TypeDef>,
    fields: Vec<Value>,
}

impl ObjectData {
    /// Instance with every field at its default.
    pub fn new(ty: &Arc<TypeDef>) -> Self {
        Self {
            ty: Arc::clone(ty),
            fields: default_fields(ty),
        }
    }
}

impl_field_access!(ObjectData);

/// Instance of a value type.
#[derive(Debug, Clone)]
pub struct StructValue {
    ty: Arc<TypeDef>,
    fields: Vec<Value>,
}

impl StructValue {
    pub fn new(ty: &Arc<TypeDef>) -> Self {
        Self {
            ty: Arc::clone(ty),
            fields: default_fields(ty),
        }
    }
}

impl_field_access!(StructValue);

fn default_fields(ty: &TypeDef) -> Vec<Value> {
    ty.all_fields().map(|f| Value::default_for(&f.ty)).collect()
}

/// Enum value stored as its underlying integer.
#[derive(Debug, Clone)]
pub struct EnumValue {
    pub ty: Arc<TypeDef>,
    pub value: i64,
}

impl EnumValue {
    pub fn new(ty: &Arc<TypeDef>, value: i64) -> Self {
        Self {
            ty: Arc::clone(ty),
            value,
        }
    }

    pub fn underlying(&self) -> ElementKind {
        match self.ty.kind() {
            TypeKind::Enum(kind) => kind,
            _ => ElementKind::I4,
        }
    }
}

/// Fixed-length array with a declared element type.
#[derive(Debug, Clone)]
pub struct ArrayData {
    pub element: TypeRef,
    pub items: Vec<Value>,
}

pub type ObjectRef = Shared<ObjectData>;
pub type ArrayRef = Shared<ArrayData>;
pub type ListRef = Shared<Vec<Value>>;

/// A node of the object graph.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    DateTime(DateTime<Utc>),
    TimeSpan(TimeDelta),
    Type(TypeRef),
    Enum(EnumValue),
    Struct(StructValue),
    Object(ObjectRef),
    Array(ArrayRef),
    List(ListRef),
}

impl Value {
    pub fn object(data: ObjectData) -> Self {
        Value::Object(Shared::new(data))
    }

    pub fn array(element: TypeRef, items: Vec<Value>) -> Self {
        Value::Array(Shared::new(ArrayData { element, items }))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Shared::new(items))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Default for a slot of the given declared type.
    pub fn default_for(ty: &TypeRef) -> Value {
        match ty {
            TypeRef::Primitive(kind) => match kind {
                ElementKind::Boolean => Value::Bool(false),
                ElementKind::Char => Value::Char('\0'),
                ElementKind::I1 => Value::I8(0),
                ElementKind::U1 => Value::U8(0),
                ElementKind::I2 => Value::I16(0),
                ElementKind::U2 => Value::U16(0),
                ElementKind::I4 => Value::I32(0),
                ElementKind::U4 => Value::U32(0),
                ElementKind::I8 => Value::I64(0),
                ElementKind::U8 => Value::U64(0),
                ElementKind::R4 => Value::F32(0.0),
                ElementKind::R8 => Value::F64(0.0),
                ElementKind::String => Value::Null,
            },
            TypeRef::DateTime => Value::DateTime(DateTime::<Utc>::default()),
            TypeRef::TimeSpan => Value::TimeSpan(TimeDelta::zero()),
            TypeRef::Named(def) => match def.kind() {
                TypeKind::ValueType => Value::Struct(StructValue::new(def)),
                TypeKind::Enum(_) => Value::Enum(EnumValue::new(def, 0)),
                TypeKind::Class | TypeKind::Interface => Value::Null,
            },
            TypeRef::Object | TypeRef::Type | TypeRef::List | TypeRef::Array(_) => Value::Null,
        }
    }

    /// Runtime type, or `None` for null.
    pub fn runtime_type(&self) -> Option<TypeRef> {
        let ty = match self {
            Value::Null => return None,
            Value::Bool(_) => TypeRef::Primitive(ElementKind::Boolean),
            Value::Char(_) => TypeRef::Primitive(ElementKind::Char),
            Value::I8(_) => TypeRef::Primitive(ElementKind::I1),
            Value::U8(_) => TypeRef::Primitive(ElementKind::U1),
            Value::I16(_) => TypeRef::Primitive(ElementKind::I2),
            Value::U16(_) => TypeRef::Primitive(ElementKind::U2),
            Value::I32(_) => TypeRef::Primitive(ElementKind::I4),
            Value::U32(_) => TypeRef::Primitive(ElementKind::U4),
            Value::I64(_) => TypeRef::Primitive(ElementKind::I8),
            Value::U64(_) => TypeRef::Primitive(ElementKind::U8),
            Value::F32(_) => TypeRef::Primitive(ElementKind::R4),
            Value::F64(_) => TypeRef::Primitive(ElementKind::R8),
            Value::String(_) => TypeRef::STRING,
            Value::DateTime(_) => TypeRef::DateTime,
            Value::TimeSpan(_) => TypeRef::TimeSpan,
            Value::Type(_) => TypeRef::Type,
            Value::Enum(e) => TypeRef::named(&e.ty),
            Value::Struct(s) => TypeRef::named(&s.ty),
            Value::Object(o) => TypeRef::named(&o.lock().ty),
            Value::Array(a) => TypeRef::array_of(a.lock().element.clone()),
            Value::List(_) => TypeRef::List,
        };
        Some(ty)
    }

    /// Integral payload as i64, for enum underlying values.
    pub(crate) fn to_enum_raw(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(v as i64),
            Value::U8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::U16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::U32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            Value::U64(v) => Some(v as i64),
            _ => None,
        }
    }

    pub(crate) fn from_enum_raw(kind: ElementKind, raw: i64) -> Value {
        match kind {
            ElementKind::I1 => Value::I8(raw as i8),
            ElementKind::U1 => Value::U8(raw as u8),
            ElementKind::I2 => Value::I16(raw as i16),
            ElementKind::U2 => Value::U16(raw as u16),
            ElementKind::U4 => Value::U32(raw as u32),
            ElementKind::I8 => Value::I64(raw),
            ElementKind::U8 => Value::U64(raw as u64),
            _ => Value::I32(raw as i32),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

macro_rules! impl_from_scalar {
    ($($src:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$src> for Value {
                fn from(v: $src) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar!(
    bool => Bool,
    char => Char,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    DateTime<Utc> => DateTime,
    TimeDelta => TimeSpan,
    TypeRef => Type,
    EnumValue => Enum,
    StructValue => Struct,
    ObjectRef => Object,
    ArrayRef => Array,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<ObjectData> for Value {
    fn from(v: ObjectData) -> Self {
        Value::object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

fn fields_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

/// Structural equality. Shared values are equal when they are the same
/// instance or when their contents are equal; floats compare by bit pattern.
/// Comparing graphs that contain cycles does not terminate.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::TimeSpan(a), Value::TimeSpan(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => Arc::ptr_eq(&a.ty, &b.ty) && a.value == b.value,
            (Value::Struct(a), Value::Struct(b)) => {
                Arc::ptr_eq(&a.ty, &b.ty) && fields_eq(&a.fields, &b.fields)
            }
            (Value::Object(a), Value::Object(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.lock(), b.lock());
                Arc::ptr_eq(&a.ty, &b.ty) && fields_eq(&a.fields, &b.fields)
            }
            (Value::Array(a), Value::Array(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.lock(), b.lock());
                a.element == b.element && fields_eq(&a.items, &b.items)
            }
            (Value::List(a), Value::List(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.lock(), b.lock());
                fields_eq(&a, &b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Char(v) => write!(f, "Char({:?})", v),
            Value::I8(v) => write!(f, "I8({})", v),
            Value::U8(v) => write!(f, "U8({})", v),
            Value::I16(v) => write!(f, "I16({})", v),
            Value::U16(v) => write!(f, "U16({})", v),
            Value::I32(v) => write!(f, "I32({})", v),
            Value::U32(v) => write!(f, "U32({})", v),
            Value::I64(v) => write!(f, "I64({})", v),
            Value::U64(v) => write!(f, "U64({})", v),
            Value::F32(v) => write!(f, "F32({:?} / {:#010x})", v, v.to_bits()),
            Value::F64(v) => write!(f, "F64({:?} / {:#018x})", v, v.to_bits()),
            Value::String(v) => write!(f, "String({:?})", v),
            Value::DateTime(v) => write!(f, "DateTime({})", v.to_rfc3339()),
            Value::TimeSpan(v) => write!(f, "TimeSpan({})", v),
            Value::Type(t) => write!(f, "Type({})", t),
            Value::Enum(e) => write!(f, "Enum({}::{})", e.ty.name(), e.value),
            Value::Struct(s) => f
                .debug_struct(s.ty.name())
                .field("fields", &s.fields)
                .finish(),
            // Shared kinds print shallowly: graphs may be cyclic.
            Value::Object(o) => {
                let data = o.lock();
                write!(
                    f,
                    "Object({}@{:#x}, {} fields)",
                    data.ty.name(),
                    o.identity(),
                    data.fields.len()
                )
            }
            Value::Array(a) => {
                let data = a.lock();
                write!(
                    f,
                    "Array({}[{}]@{:#x})",
                    data.element,
                    data.items.len(),
                    a.identity()
                )
            }
            Value::List(l) => write!(f, "List({} items@{:#x})", l.lock().len(), l.identity()),
        }
    }
}
