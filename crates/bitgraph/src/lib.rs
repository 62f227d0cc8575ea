// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # bitgraph - compact bit-packed object-graph codec
//!
//! Serializes a graph of typed values (objects, value types, enums, arrays,
//! lists, strings, primitives, instants and durations) into a dense bit
//! stream and reconstructs it, preserving shared references and cycles.
//!
//! ## Quick Start
//!
//! ```rust
//! use bitgraph::model::{ElementKind, ObjectData, TypeDefBuilder, TypeRef};
//! use bitgraph::Value;
//!
//! # fn main() -> bitgraph::Result<()> {
//! let person = TypeDefBuilder::class("Person")
//!     .string_field("name")
//!     .field("age", TypeRef::Primitive(ElementKind::I4))
//!     .self_field("friend")
//!     .build();
//!
//! let bob = Value::object(ObjectData::new(&person).with("name", "Bob")?);
//! let alice = Value::object(
//!     ObjectData::new(&person)
//!         .with("name", "Alice")?
//!         .with("age", 31)?
//!         .with("friend", bob.clone())?,
//! );
//!
//! let bytes = bitgraph::serialize(&alice)?;
//! let back = bitgraph::deserialize(&bytes, &[TypeRef::named(&person)])?;
//! assert_eq!(back, alice);
//! # Ok(())
//! # }
//! ```
//!
//! ## Wire layout
//!
//! ```text
//! value  := signature data?
//! signature := [header] [type tag | fingerprint] [length]
//! data   := scalar bits | UTF-8 string | fields... | elements...
//! ```
//!
//! Which signature parts appear is decided from the declared type of the
//! slot and its [`Hints`](model::Hints) alone, identically on both sides
//! (see [`signature::compute_mask`]). Shared instances are written once and
//! referenced afterwards by encounter index.
//!
//! ## Modules Overview
//!
//! - [`model`] - type definitions, hints and the dynamic [`Value`] graph
//! - [`bitstream`] - chunked MSB-first bit buffer with blocking reads
//! - [`formatter`] - [`BinaryFormatter`] and [`FormatterConfig`]
//! - [`fingerprint`] - 32-bit structural type hashes
//! - [`signature`] - signature masks
//!
//! ## Logging
//!
//! The crate logs through the `log` facade (`trace!` per signature, value
//! and bit run; `debug!` per pass and registration). Install any logger to
//! see it.

pub mod bitstream;
pub mod checksum;
pub mod descriptor;
pub mod duplicates;
mod error;
pub mod fingerprint;
pub mod formatter;
pub mod model;
mod scalar;
pub mod signature;
mod traversal;

pub use bitstream::BitStream;
pub use error::{Error, Result};
pub use fingerprint::TypeFingerprintRegistry;
pub use formatter::{BinaryFormatter, FormatterConfig};
pub use model::{Hints, TypeDef, TypeRef, Value};

/// Serialize `value` with a default [`BinaryFormatter`].
pub fn serialize(value: &Value) -> Result<Vec<u8>> {
    BinaryFormatter::new().serialize(value)
}

/// Deserialize `bytes` with a default [`BinaryFormatter`] that knows
/// `types` (and everything reachable from them).
pub fn deserialize(bytes: &[u8], types: &[TypeRef]) -> Result<Value> {
    BinaryFormatter::new().with_types(types)?.deserialize(bytes)
}
