// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Semantic classification of types for the wire signature.
//!
//! A [`ValueDescriptor`] is derived either from a declared type (encoder and
//! expected-type context) or from the tags read off the wire (decoder). Both
//! paths yield descriptors that compare equal for the same type.

use crate::error::{Error, Result};
use crate::model::{ElementKind, TypeKind, TypeRef, Value};

/// Deepest array nesting the 4-bit depth tag can carry.
pub const MAX_ARRAY_DEPTH: u8 = 0x0F;

/// Semantic category of a single (non-array) type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicKind {
    Primitive(ElementKind),
    Enum,
    ValueType,
    Class,
    Interface,
}

/// Classification of one type, without array peeling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicDescriptor {
    pub ty: TypeRef,
    pub kind: BasicKind,
    pub is_array: bool,
    pub is_list: bool,
}

impl BasicDescriptor {
    pub fn of(ty: &TypeRef) -> Self {
        let kind = match ty {
            TypeRef::Primitive(kind) => BasicKind::Primitive(*kind),
            TypeRef::DateTime | TypeRef::TimeSpan => BasicKind::ValueType,
            TypeRef::Object | TypeRef::Type | TypeRef::List | TypeRef::Array(_) => {
                BasicKind::Class
            }
            TypeRef::Named(def) => match def.kind() {
                TypeKind::Class => BasicKind::Class,
                TypeKind::ValueType => BasicKind::ValueType,
                TypeKind::Enum(_) => BasicKind::Enum,
                TypeKind::Interface => BasicKind::Interface,
            },
        };
        Self {
            ty: ty.clone(),
            kind,
            is_array: matches!(ty, TypeRef::Array(_)),
            is_list: matches!(ty, TypeRef::List),
        }
    }

    /// Whether a value of this declared type needs any signature at all.
    /// Primitives, enums and value types are pinned by the declaration.
    pub fn needs_signature(&self) -> bool {
        !matches!(
            self.kind,
            BasicKind::Primitive(_) | BasicKind::Enum | BasicKind::ValueType
        )
    }

    pub fn is_sealed(&self) -> bool {
        self.ty.is_sealed()
    }

    pub fn primitive(&self) -> Option<ElementKind> {
        match self.kind {
            BasicKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Full classification: base descriptor plus array depth and innermost
/// element descriptor for arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDescriptor {
    pub base: BasicDescriptor,
    pub depth: u8,
    pub element: Option<BasicDescriptor>,
}

impl ValueDescriptor {
    pub fn of(ty: &TypeRef) -> Result<Self> {
        let base = BasicDescriptor::of(ty);
        if !base.is_array {
            return Ok(Self {
                base,
                depth: 0,
                element: None,
            });
        }

        let mut depth = 0u8;
        let mut inner = ty;
        while let TypeRef::Array(element) = inner {
            if depth == MAX_ARRAY_DEPTH {
                return Err(Error::UnsupportedType(format!(
                    "{}: array nesting deeper than {}",
                    ty, MAX_ARRAY_DEPTH
                )));
            }
            depth += 1;
            inner = element;
        }
        Ok(Self {
            base,
            depth,
            element: Some(BasicDescriptor::of(inner)),
        })
    }

    /// Descriptor of a value's runtime type, or `None` for null.
    pub fn of_value(value: &Value) -> Result<Option<Self>> {
        let Some(ty) = value.runtime_type() else {
            return Ok(None);
        };
        if let TypeRef::Named(def) = &ty {
            if !def.is_serializable() {
                return Err(Error::UnsupportedType(format!(
                    "{} is not serializable",
                    def.name()
                )));
            }
        }
        Self::of(&ty).map(Some)
    }

    /// Rebuild from a 4-bit primitive tag read off the wire.
    pub fn from_primitive_tag(tag: u32) -> Result<Self> {
        let kind = u8::try_from(tag)
            .ok()
            .and_then(ElementKind::from_tag)
            .ok_or_else(|| Error::malformed(format!("invalid element type tag {:#x}", tag)))?;
        Self::of(&TypeRef::Primitive(kind))
    }

    /// Rebuild from an array depth tag and the innermost element type.
    pub fn from_array_tags(depth: u32, element: TypeRef) -> Result<Self> {
        if depth == 0 || depth > MAX_ARRAY_DEPTH as u32 {
            return Err(Error::malformed(format!("invalid array depth {}", depth)));
        }
        let ty = (0..depth).fold(element, |inner, _| TypeRef::array_of(inner));
        Self::of(&ty)
    }

    pub fn ty(&self) -> &TypeRef {
        &self.base.ty
    }

    pub fn is_array(&self) -> bool {
        self.base.is_array
    }

    pub fn is_list(&self) -> bool {
        self.base.is_list
    }

    pub fn is_type(&self) -> bool {
        matches!(self.base.ty, TypeRef::Type)
    }

    pub fn needs_signature(&self) -> bool {
        self.base.needs_signature()
    }

    /// Descriptor whose sealing decides whether a type tag is needed:
    /// the innermost element for arrays, the base otherwise.
    pub fn sealing(&self) -> &BasicDescriptor {
        self.element.as_ref().unwrap_or(&self.base)
    }

    /// Declared type of the items one level down, for arrays.
    pub fn item_type(&self) -> Option<&TypeRef> {
        self.base.ty.element()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeDefBuilder;

    #[test]
    fn test_primitive_classification() {
        let d = ValueDescriptor::of(&TypeRef::Primitive(ElementKind::I4)).expect("classify");
        assert_eq!(d.base.kind, BasicKind::Primitive(ElementKind::I4));
        assert!(!d.needs_signature());
        assert!(!d.is_array());
        assert_eq!(d.depth, 0);
    }

    #[test]
    fn test_array_depth_and_element() {
        let ty = TypeRef::array_of(TypeRef::array_of(TypeRef::STRING));
        let d = ValueDescriptor::of(&ty).expect("classify");
        assert!(d.is_array());
        assert_eq!(d.depth, 2);
        assert_eq!(
            d.element.as_ref().map(|e| e.kind),
            Some(BasicKind::Primitive(ElementKind::String))
        );
        assert_eq!(d.item_type(), Some(&TypeRef::array_of(TypeRef::STRING)));
        assert!(d.needs_signature());
    }

    #[test]
    fn test_wire_and_type_paths_agree() {
        let person = TypeDefBuilder::class("Person").build();
        let element = TypeRef::named(&person);
        let from_type =
            ValueDescriptor::of(&TypeRef::array_of(TypeRef::array_of(element.clone())))
                .expect("classify");
        let from_wire = ValueDescriptor::from_array_tags(2, element).expect("rebuild");
        assert_eq!(from_type, from_wire);

        let from_type = ValueDescriptor::of(&TypeRef::Primitive(ElementKind::R4)).expect("classify");
        let from_wire =
            ValueDescriptor::from_primitive_tag(ElementKind::R4.tag() as u32).expect("rebuild");
        assert_eq!(from_type, from_wire);
    }

    #[test]
    fn test_invalid_wire_tags() {
        assert!(matches!(
            ValueDescriptor::from_primitive_tag(0x1),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            ValueDescriptor::from_array_tags(0, TypeRef::Object),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_array_depth_limit() {
        let ty = (0..16).fold(TypeRef::Primitive(ElementKind::U1), |t, _| {
            TypeRef::array_of(t)
        });
        assert!(matches!(
            ValueDescriptor::of(&ty),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_kinds_of_named_types() {
        let e = TypeDefBuilder::enumeration("Mode", ElementKind::U1).build();
        let s = TypeDefBuilder::value_type("Pair").build();
        let i = TypeDefBuilder::interface("IShape").build();

        assert_eq!(BasicDescriptor::of(&TypeRef::named(&e)).kind, BasicKind::Enum);
        assert_eq!(BasicDescriptor::of(&TypeRef::named(&s)).kind, BasicKind::ValueType);
        assert_eq!(BasicDescriptor::of(&TypeRef::named(&i)).kind, BasicKind::Interface);
        assert!(BasicDescriptor::of(&TypeRef::named(&i)).needs_signature());
        assert!(!BasicDescriptor::of(&TypeRef::DateTime).needs_signature());
        assert!(BasicDescriptor::of(&TypeRef::List).is_list);
    }

    #[test]
    fn test_non_serializable_value_rejected() {
        let handle = TypeDefBuilder::class("Handle").not_serializable().build();
        let value = Value::object(crate::model::ObjectData::new(&handle));
        assert!(matches!(
            ValueDescriptor::of_value(&value),
            Err(Error::UnsupportedType(_))
        ));
        assert_eq!(ValueDescriptor::of_value(&Value::Null), Ok(None));
    }
}
