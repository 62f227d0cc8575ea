// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structural type fingerprints.
//!
//! A fingerprint is a 32-bit checksum over a type's name and the layout of
//! its serializable fields. It stands in for the type name on the wire, so
//! the registry rejects any two distinct types that hash alike.
//!
//! # Layout
//!
//! ```text
//! crc(name)
//! for each type in the chain, most-derived first:
//!     for each non-transient field, in declaration order:
//!         SZARRAY byte, once per array level
//!         element tag byte (primitive tag, CLASS, VALUETYPE or OBJECT)
//!         element type name (CLASS and VALUETYPE only)
//!         field name
//! ```
//!
//! `datetime` and `timespan` hash as if they declared one field `_ticks`
//! (`u64` and `i64` respectively). `list` has a fixed fingerprint.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::checksum::{crc32, crc32_byte, crc32_name, ChecksumFn};
use crate::error::{Error, Result};
use crate::model::{ElementKind, TypeKind, TypeRef};

pub const VALUETYPE_TAG: u8 = 0x11;
pub const CLASS_TAG: u8 = 0x12;
pub const OBJECT_TAG: u8 = 0x1C;
pub const SZARRAY_TAG: u8 = 0x1D;

/// Fixed fingerprint of [`TypeRef::List`].
pub const LIST_FINGERPRINT: u32 = 0xEDDD_427F;

/// Types every registry knows without being told.
static BUILTIN_TYPES: [TypeRef; 5] = [
    TypeRef::Object,
    TypeRef::DateTime,
    TypeRef::TimeSpan,
    TypeRef::Type,
    TypeRef::List,
];

/// Deepest array nesting the wire can describe.
const MAX_ARRAY_RANK: usize = 15;

/// Canonical field name of the time types.
const TICKS_FIELD: &str = "_ticks";

fn element_tag(ty: &TypeRef) -> u8 {
    match ty {
        TypeRef::Primitive(kind) => kind.tag(),
        TypeRef::Object => OBJECT_TAG,
        TypeRef::DateTime | TypeRef::TimeSpan => VALUETYPE_TAG,
        TypeRef::Type | TypeRef::List | TypeRef::Array(_) => CLASS_TAG,
        TypeRef::Named(def) => match def.kind() {
            TypeKind::Class | TypeKind::Interface => CLASS_TAG,
            TypeKind::ValueType | TypeKind::Enum(_) => VALUETYPE_TAG,
        },
    }
}

fn hash_field(checksum: ChecksumFn, name: &str, ty: &TypeRef, mut hash: u32) -> u32 {
    let mut inner = ty;
    while let TypeRef::Array(element) = inner {
        hash = crc32_byte(checksum, SZARRAY_TAG, hash);
        inner = element;
    }

    let tag = element_tag(inner);
    hash = crc32_byte(checksum, tag, hash);
    if tag == CLASS_TAG || tag == VALUETYPE_TAG {
        hash = crc32_name(checksum, &inner.name(), hash);
    }
    crc32_name(checksum, name, hash)
}

/// Fingerprint of `ty` under the given checksum.
pub fn compute_fingerprint(ty: &TypeRef, checksum: ChecksumFn) -> u32 {
    if matches!(ty, TypeRef::List) {
        return LIST_FINGERPRINT;
    }

    let mut hash = crc32_name(checksum, &ty.name(), 0);
    match ty {
        TypeRef::Named(def) => {
            for field in def.all_fields().filter(|f| !f.transient) {
                hash = hash_field(checksum, &field.name, &field.ty, hash);
            }
        }
        TypeRef::DateTime => {
            hash = hash_field(
                checksum,
                TICKS_FIELD,
                &TypeRef::Primitive(ElementKind::U8),
                hash,
            );
        }
        TypeRef::TimeSpan => {
            hash = hash_field(
                checksum,
                TICKS_FIELD,
                &TypeRef::Primitive(ElementKind::I8),
                hash,
            );
        }
        _ => {}
    }
    hash
}

/// Types that must be known whenever `ty` is.
fn dependencies(ty: &TypeRef) -> Vec<TypeRef> {
    match ty {
        TypeRef::Array(element) => vec![(**element).clone()],
        TypeRef::Named(def) => def
            .base()
            .map(TypeRef::named)
            .into_iter()
            .chain(
                def.declared_fields()
                    .iter()
                    .filter(|f| !f.transient)
                    .map(|f| f.ty.clone()),
            )
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Default)]
struct Tables {
    by_hash: HashMap<u32, TypeRef>,
    by_type: HashMap<TypeRef, u32>,
}

/// Bidirectional `fingerprint <-> type` map shared by encode and decode
/// passes.
///
/// Registering a type also registers its base, its array element type and
/// the declared type of every non-transient field. Registration is
/// all-or-nothing: a collision anywhere in that closure commits nothing.
#[derive(Debug)]
pub struct TypeFingerprintRegistry {
    checksum: ChecksumFn,
    tables: RwLock<Tables>,
}

impl Default for TypeFingerprintRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeFingerprintRegistry {
    pub fn new() -> Self {
        Self::with_checksum(crc32)
    }

    /// Registry hashing with a caller-supplied checksum.
    pub fn with_checksum(checksum: ChecksumFn) -> Self {
        Self {
            checksum,
            tables: RwLock::new(Tables::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.tables.read().by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, ty: &TypeRef) -> bool {
        self.tables.read().by_type.contains_key(ty)
    }

    /// Fingerprint of `ty`, registering it (and its closure) on first use.
    pub fn fingerprint(&self, ty: &TypeRef) -> Result<u32> {
        if let Some(hash) = self.tables.read().by_type.get(ty) {
            return Ok(*hash);
        }
        self.register(ty)
    }

    /// Register `ty` and every type reachable from it.
    pub fn register(&self, ty: &TypeRef) -> Result<u32> {
        let mut tables = self.tables.write();

        let mut staged: Vec<(TypeRef, u32)> = Vec::new();
        let mut staged_by_hash: HashMap<u32, TypeRef> = HashMap::new();
        let mut seen: HashSet<TypeRef> = HashSet::new();
        let mut pending = vec![ty.clone()];

        while let Some(next) = pending.pop() {
            if tables.by_type.contains_key(&next) || !seen.insert(next.clone()) {
                continue;
            }

            let hash = compute_fingerprint(&next, self.checksum);
            let existing = tables
                .by_hash
                .get(&hash)
                .or_else(|| staged_by_hash.get(&hash));
            if let Some(existing) = existing {
                log::warn!(
                    "[fingerprint] hash conflict 0x{:08x}: {} vs registered {}",
                    hash,
                    next,
                    existing
                );
                return Err(Error::TypeFingerprintCollision {
                    hash,
                    existing: existing.name(),
                    candidate: next.name(),
                });
            }

            pending.extend(dependencies(&next));
            staged_by_hash.insert(hash, next.clone());
            staged.push((next, hash));
        }

        for (registered, hash) in staged {
            log::debug!("[fingerprint] 0x{:08x} {}", hash, registered);
            tables.by_hash.insert(hash, registered.clone());
            tables.by_type.insert(registered, hash);
        }

        tables
            .by_type
            .get(ty)
            .copied()
            .ok_or_else(|| Error::UnsupportedType(format!("{} could not be registered", ty)))
    }

    /// Type registered under `hash`.
    ///
    /// Built-in types (object, time types, lists), primitives, strings and
    /// arrays of any of those or of a registered type resolve without
    /// prior registration.
    pub fn resolve(&self, hash: u32) -> Result<TypeRef> {
        if let Some(ty) = self.tables.read().by_hash.get(&hash) {
            return Ok(ty.clone());
        }
        let implicit = self
            .find_implicit(hash)
            .ok_or(Error::UnknownTypeFingerprint(hash))?;
        self.register(&implicit)?;
        Ok(implicit)
    }

    fn find_implicit(&self, hash: u32) -> Option<TypeRef> {
        let mut candidates: Vec<TypeRef> = BUILTIN_TYPES
            .iter()
            .cloned()
            .chain(ElementKind::ALL.into_iter().map(TypeRef::Primitive))
            .chain(
                self.tables
                    .read()
                    .by_type
                    .keys()
                    .filter(|ty| !matches!(ty, TypeRef::Array(_)))
                    .cloned(),
            )
            .collect();

        for _ in 0..=MAX_ARRAY_RANK {
            if let Some(found) = candidates
                .iter()
                .find(|ty| compute_fingerprint(ty, self.checksum) == hash)
            {
                return Some(found.clone());
            }
            candidates = candidates.into_iter().map(TypeRef::array_of).collect();
        }
        None
    }
}
