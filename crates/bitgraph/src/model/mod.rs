// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type model for object graphs.
//!
//! Rust has no runtime reflection, so the types the formatter walks are
//! described explicitly: a [`TypeDef`] lists a type's kind, base and fields,
//! and a [`Value`] is the dynamic graph built from those types.
//!
//! # Example
//!
//! ```rust
//! use bitgraph::model::{ElementKind, ObjectData, TypeDefBuilder, TypeRef, Value};
//!
//! let person = TypeDefBuilder::class("Person")
//!     .string_field("name")
//!     .field("age", TypeRef::Primitive(ElementKind::I4))
//!     .self_field("friend")
//!     .build();
//!
//! let mut alice = ObjectData::new(&person);
//! alice.set("name", "Alice").unwrap();
//! alice.set("age", 31).unwrap();
//!
//! let value = Value::object(alice);
//! assert_eq!(value.runtime_type(), Some(TypeRef::named(&person)));
//! ```

mod builder;
mod hints;
mod types;
mod value;

pub use builder::TypeDefBuilder;
pub use hints::{HintOptions, Hints};
pub use types::{ElementKind, FieldDef, TypeDef, TypeKind, TypeRef, ENUM_VALUE_FIELD};
pub use value::{
    ArrayData, ArrayRef, EnumValue, ListRef, ObjectData, ObjectRef, Shared, StructValue, Value,
};
