// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder API for TypeDef.

use std::sync::Arc;

use crate::model::{ElementKind, FieldDef, Hints, TypeDef, TypeKind, TypeRef};

/// Declared type of a pending field; `SelfType` resolves to the type under
/// construction.
#[derive(Debug, Clone)]
enum PendingType {
    Resolved(TypeRef),
    SelfType,
    ArrayOfSelf,
}

#[derive(Debug)]
struct PendingField {
    name: String,
    ty: PendingType,
    hints: Option<Hints>,
    transient: bool,
}

/// Builder for creating TypeDef instances.
///
/// ```
/// use bitgraph::model::{ElementKind, Hints, TypeDefBuilder, TypeRef};
///
/// let person = TypeDefBuilder::class("Person")
///     .string_field("name")
///     .field("age", TypeRef::Primitive(ElementKind::U1))
///     .field_with_hints("code", TypeRef::Primitive(ElementKind::I4), Hints::new().bit_packed(12))
///     .self_field("friend")
///     .build();
///
/// assert_eq!(person.field_count(), 4);
/// ```
#[derive(Debug)]
pub struct TypeDefBuilder {
    name: String,
    kind: TypeKind,
    base: Option<Arc<TypeDef>>,
    sealed: bool,
    serializable: bool,
    fields: Vec<PendingField>,
}

impl TypeDefBuilder {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base: None,
            sealed: false,
            serializable: true,
            fields: Vec::new(),
        }
    }

    /// Reference type.
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Value type (always sealed).
    pub fn value_type(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::ValueType)
    }

    /// Interface (never sealed, never instantiated).
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Enumeration over an integral kind. Its single field is synthesized.
    pub fn enumeration(name: impl Into<String>, underlying: ElementKind) -> Self {
        Self::new(name, TypeKind::Enum(underlying))
    }

    pub fn base(mut self, base: &Arc<TypeDef>) -> Self {
        self.base = Some(Arc::clone(base));
        self
    }

    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    /// Instances of this type are rejected by the formatter.
    pub fn not_serializable(mut self) -> Self {
        self.serializable = false;
        self
    }

    fn push(mut self, name: impl Into<String>, ty: PendingType, hints: Option<Hints>) -> Self {
        self.fields.push(PendingField {
            name: name.into(),
            ty,
            hints,
            transient: false,
        });
        self
    }

    /// Add a field with a declared type.
    pub fn field(self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.push(name, PendingType::Resolved(ty), None)
    }

    pub fn field_with_hints(self, name: impl Into<String>, ty: TypeRef, hints: Hints) -> Self {
        self.push(name, PendingType::Resolved(ty), Some(hints))
    }

    pub fn string_field(self, name: impl Into<String>) -> Self {
        self.field(name, TypeRef::STRING)
    }

    /// Add a field skipped by serialization and fingerprinting.
    pub fn transient_field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push(PendingField {
            name: name.into(),
            ty: PendingType::Resolved(ty),
            hints: None,
            transient: true,
        });
        self
    }

    /// Add a field whose type is the type being built.
    pub fn self_field(self, name: impl Into<String>) -> Self {
        self.push(name, PendingType::SelfType, None)
    }

    /// Add an array field whose elements are the type being built.
    pub fn self_array_field(self, name: impl Into<String>, hints: Option<Hints>) -> Self {
        self.push(name, PendingType::ArrayOfSelf, hints)
    }

    /// Build the TypeDef.
    pub fn build(self) -> Arc<TypeDef> {
        let def = Arc::new(TypeDef::with_flags(
            self.name,
            self.kind,
            self.base,
            self.sealed,
            self.serializable,
        ));
        if matches!(self.kind, TypeKind::Enum(_)) {
            return def;
        }

        let fields = self
            .fields
            .into_iter()
            .map(|pending| {
                let ty = match pending.ty {
                    PendingType::Resolved(ty) => ty,
                    PendingType::SelfType => TypeRef::named(&def),
                    PendingType::ArrayOfSelf => TypeRef::array_of(TypeRef::named(&def)),
                };
                FieldDef {
                    name: pending.name,
                    ty,
                    hints: pending.hints,
                    transient: pending.transient,
                }
            })
            .collect();
        // Freshly created, so the fields cannot be set yet.
        let _ = def.define(fields);
        def
    }
}
