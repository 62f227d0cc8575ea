// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime type information for the object graph.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::model::Hints;

/// Primitive element kinds and their 4-bit wire tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementKind {
    Boolean = 0x02,
    Char = 0x03,
    I1 = 0x04,
    U1 = 0x05,
    I2 = 0x06,
    U2 = 0x07,
    I4 = 0x08,
    U4 = 0x09,
    I8 = 0x0A,
    U8 = 0x0B,
    R4 = 0x0C,
    R8 = 0x0D,
    String = 0x0E,
}

impl ElementKind {
    pub const ALL: [ElementKind; 13] = [
        Self::Boolean,
        Self::Char,
        Self::I1,
        Self::U1,
        Self::I2,
        Self::U2,
        Self::I4,
        Self::U4,
        Self::I8,
        Self::U8,
        Self::R4,
        Self::R8,
        Self::String,
    ];

    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    /// Default wire width in bits (None for strings).
    pub fn bit_width(self) -> Option<u32> {
        match self {
            Self::Boolean => Some(1),
            Self::I1 | Self::U1 => Some(8),
            Self::Char | Self::I2 | Self::U2 => Some(16),
            Self::I4 | Self::U4 | Self::R4 => Some(32),
            Self::I8 | Self::U8 | Self::R8 => Some(64),
            Self::String => None,
        }
    }

    /// Floats count as signed.
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::I1 | Self::I2 | Self::I4 | Self::I8 | Self::R4 | Self::R8
        )
    }

    /// Canonical name, hashed into fingerprints.
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::Char => "char",
            Self::I1 => "i8",
            Self::U1 => "u8",
            Self::I2 => "i16",
            Self::U2 => "u16",
            Self::I4 => "i32",
            Self::U4 => "u32",
            Self::I8 => "i64",
            Self::U8 => "u64",
            Self::R4 => "f32",
            Self::R8 => "f64",
            Self::String => "string",
        }
    }
}

/// Reference to a type known to the formatter.
///
/// Named types compare by identity: two separately built definitions are
/// distinct types even when their names and fields agree.
#[derive(Clone)]
pub enum TypeRef {
    Primitive(ElementKind),
    /// Root of the class hierarchy; holds any value.
    Object,
    DateTime,
    TimeSpan,
    /// A type used as a value.
    Type,
    /// Growable list of untyped elements.
    List,
    /// Single-dimension array of the inner type.
    Array(Box<TypeRef>),
    Named(Arc<TypeDef>),
}

impl TypeRef {
    pub const STRING: TypeRef = TypeRef::Primitive(ElementKind::String);

    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    pub fn named(def: &Arc<TypeDef>) -> Self {
        TypeRef::Named(Arc::clone(def))
    }

    /// Display name; also the name hashed into fingerprints.
    pub fn name(&self) -> String {
        match self {
            TypeRef::Primitive(kind) => kind.name().to_string(),
            TypeRef::Object => "object".to_string(),
            TypeRef::DateTime => "datetime".to_string(),
            TypeRef::TimeSpan => "timespan".to_string(),
            TypeRef::Type => "type".to_string(),
            TypeRef::List => "list".to_string(),
            TypeRef::Array(element) => format!("{}[]", element.name()),
            TypeRef::Named(def) => def.name().to_string(),
        }
    }

    /// Whether no other type can stand in for this one.
    pub fn is_sealed(&self) -> bool {
        match self {
            TypeRef::Primitive(_) | TypeRef::DateTime | TypeRef::TimeSpan => true,
            TypeRef::Array(_) => true,
            TypeRef::Object | TypeRef::Type | TypeRef::List => false,
            TypeRef::Named(def) => def.is_sealed(),
        }
    }

    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_def(&self) -> Option<&Arc<TypeDef>> {
        match self {
            TypeRef::Named(def) => Some(def),
            _ => None,
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeRef::Primitive(a), TypeRef::Primitive(b)) => a == b,
            (TypeRef::Object, TypeRef::Object)
            | (TypeRef::DateTime, TypeRef::DateTime)
            | (TypeRef::TimeSpan, TypeRef::TimeSpan)
            | (TypeRef::Type, TypeRef::Type)
            | (TypeRef::List, TypeRef::List) => true,
            (TypeRef::Array(a), TypeRef::Array(b)) => a == b,
            (TypeRef::Named(a), TypeRef::Named(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TypeRef::Primitive(kind) => kind.hash(state),
            TypeRef::Array(element) => element.hash(state),
            TypeRef::Named(def) => (Arc::as_ptr(def) as usize).hash(state),
            _ => {}
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.name())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Semantic category of a user-defined type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Reference type with identity.
    Class,
    /// Value type, copied by value.
    ValueType,
    /// Enumeration stored as its underlying integral kind.
    Enum(ElementKind),
    /// Abstract contract; never instantiated.
    Interface,
}

/// Name of the synthetic field holding an enum's underlying value.
pub const ENUM_VALUE_FIELD: &str = "value__";

/// Field of a user-defined type.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub hints: Option<Hints>,
    /// Skipped by traversal and by fingerprinting.
    pub transient: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            hints: None,
            transient: false,
        }
    }

    pub fn with_hints(mut self, hints: Hints) -> Self {
        self.hints = Some(hints);
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }
}

/// User-defined type: class, value type, enum or interface.
///
/// Fields are set once after construction so that a type can refer to
/// itself (see [`TypeDef::declare`] and [`TypeDef::define`]).
pub struct TypeDef {
    name: String,
    kind: TypeKind,
    base: Option<Arc<TypeDef>>,
    fields: OnceLock<Vec<FieldDef>>,
    sealed: bool,
    serializable: bool,
}

impl TypeDef {
    /// Create a type whose fields are supplied later through [`TypeDef::define`].
    pub fn declare(
        name: impl Into<String>,
        kind: TypeKind,
        base: Option<Arc<TypeDef>>,
    ) -> Arc<TypeDef> {
        Arc::new(Self::with_flags(name.into(), kind, base, false, true))
    }

    pub(crate) fn with_flags(
        name: String,
        kind: TypeKind,
        base: Option<Arc<TypeDef>>,
        sealed: bool,
        serializable: bool,
    ) -> Self {
        let fields = OnceLock::new();
        if let TypeKind::Enum(underlying) = kind {
            let _ = fields.set(vec![FieldDef::new(
                ENUM_VALUE_FIELD,
                TypeRef::Primitive(underlying),
            )]);
        }
        Self {
            name,
            kind,
            base,
            fields,
            sealed: match kind {
                TypeKind::Class => sealed,
                TypeKind::Interface => false,
                TypeKind::ValueType | TypeKind::Enum(_) => true,
            },
            serializable,
        }
    }

    /// Supply the declared fields. Fails if they were already set.
    pub fn define(&self, fields: Vec<FieldDef>) -> Result<()> {
        self.fields.set(fields).map_err(|_| {
            Error::UnsupportedType(format!("fields of {} already defined", self.name))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn base(&self) -> Option<&Arc<TypeDef>> {
        self.base.as_ref()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn is_serializable(&self) -> bool {
        self.serializable
    }

    /// Fields declared by this type only, in declaration order.
    pub fn declared_fields(&self) -> &[FieldDef] {
        self.fields.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// This type followed by its bases, most-derived first.
    pub fn chain(&self) -> impl Iterator<Item = &TypeDef> {
        std::iter::successors(Some(self), |def| def.base.as_deref())
    }

    /// All fields in slot order: most-derived type first, then each base.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.chain().flat_map(|def| def.declared_fields().iter())
    }

    pub fn field_count(&self) -> usize {
        self.chain().map(|def| def.declared_fields().len()).sum()
    }

    pub fn field_at(&self, slot: usize) -> Option<&FieldDef> {
        self.all_fields().nth(slot)
    }

    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.all_fields().position(|f| f.name == name)
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base", &self.base.as_ref().map(|b| b.name.as_str()))
            .field(
                "fields",
                &self
                    .declared_fields()
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("sealed", &self.sealed)
            .field("serializable", &self.serializable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_kind_tags_roundtrip() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ElementKind::from_tag(0x00), None);
        assert_eq!(ElementKind::from_tag(0x0F), None);
    }

    #[test]
    fn test_element_kind_widths() {
        assert_eq!(ElementKind::Boolean.bit_width(), Some(1));
        assert_eq!(ElementKind::Char.bit_width(), Some(16));
        assert_eq!(ElementKind::R4.bit_width(), Some(32));
        assert_eq!(ElementKind::U8.bit_width(), Some(64));
        assert_eq!(ElementKind::String.bit_width(), None);
        assert!(ElementKind::R8.is_signed());
        assert!(!ElementKind::Char.is_signed());
    }

    #[test]
    fn test_named_types_compare_by_identity() {
        let a = TypeDef::declare("Point", TypeKind::ValueType, None);
        let b = TypeDef::declare("Point", TypeKind::ValueType, None);

        assert_eq!(TypeRef::named(&a), TypeRef::named(&a));
        assert_ne!(TypeRef::named(&a), TypeRef::named(&b));
        assert_eq!(
            TypeRef::array_of(TypeRef::named(&a)).name(),
            "Point[]".to_string()
        );
    }

    #[test]
    fn test_self_referential_definition() {
        let node = TypeDef::declare("Node", TypeKind::Class, None);
        node.define(vec![
            FieldDef::new("value", TypeRef::Primitive(ElementKind::I4)),
            FieldDef::new("next", TypeRef::named(&node)),
        ])
        .expect("first definition");

        assert_eq!(node.field_count(), 2);
        assert_eq!(node.slot_of("next"), Some(1));
        assert!(node.define(Vec::new()).is_err());
    }

    #[test]
    fn test_slots_follow_chain_order() {
        let base = TypeDef::declare("Base", TypeKind::Class, None);
        base.define(vec![FieldDef::new("id", TypeRef::Primitive(ElementKind::I4))])
            .expect("define base");
        let derived = TypeDef::declare("Derived", TypeKind::Class, Some(Arc::clone(&base)));
        derived
            .define(vec![FieldDef::new("label", TypeRef::STRING)])
            .expect("define derived");

        let names: Vec<&str> = derived.all_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["label", "id"]);
        assert_eq!(derived.chain().count(), 2);
    }

    #[test]
    fn test_enum_gets_value_field_and_is_sealed() {
        let color = TypeDef::declare("Color", TypeKind::Enum(ElementKind::U1), None);
        assert!(color.is_sealed());
        assert_eq!(color.declared_fields().len(), 1);
        assert_eq!(color.declared_fields()[0].name, ENUM_VALUE_FIELD);
        assert_eq!(
            color.declared_fields()[0].ty,
            TypeRef::Primitive(ElementKind::U1)
        );
    }
}
