// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encounter-order table of visited composite values.
//!
//! Both directions record values in the same order, so an index written by
//! the encoder names the same instance when the decoder reads it back.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::Value;

/// Identity of a shared value (classes, arrays and lists).
fn identity(value: &Value) -> Option<usize> {
    match value {
        Value::Object(o) => Some(o.identity()),
        Value::Array(a) => Some(a.identity()),
        Value::List(l) => Some(l.identity()),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct DuplicateTable {
    index: HashMap<usize, u32>,
    values: Vec<Value>,
}

impl DuplicateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Record `value` at the next index. Type values are never recorded.
    ///
    /// Values without identity (value types, enums) still take an index so
    /// that numbering stays aligned between encoder and decoder, but they
    /// are never found by [`DuplicateTable::search`].
    pub fn track(&mut self, value: &Value) {
        if matches!(value, Value::Type(_)) {
            return;
        }
        let position = self.values.len() as u32;
        if let Some(id) = identity(value) {
            self.index.entry(id).or_insert(position);
        }
        log::trace!("[duplicates] track #{} {:?}", position, value);
        self.values.push(value.clone());
    }

    /// Index of an already recorded instance.
    pub fn search(&self, value: &Value) -> Option<u32> {
        identity(value).and_then(|id| self.index.get(&id).copied())
    }

    /// Instance recorded at `index`.
    pub fn get(&self, index: u32) -> Result<Value> {
        self.values
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::malformed(format!("duplicate index {} out of range", index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementKind, StructValue, TypeDefBuilder, TypeRef};

    #[test]
    fn test_same_instance_is_found() {
        let mut table = DuplicateTable::new();
        let list = Value::list(vec![]);
        let other = Value::list(vec![]);

        table.track(&list);
        assert_eq!(table.search(&list), Some(0));
        assert_eq!(table.search(&list.clone()), Some(0));
        assert_eq!(table.search(&other), None);

        table.track(&other);
        assert_eq!(table.search(&other), Some(1));
    }

    #[test]
    fn test_value_types_take_an_index_but_never_match() {
        let def = TypeDefBuilder::value_type("Pair")
            .field("a", TypeRef::Primitive(ElementKind::I4))
            .build();
        let pair = Value::Struct(StructValue::new(&def));
        let array = Value::array(TypeRef::Object, vec![]);

        let mut table = DuplicateTable::new();
        table.track(&pair);
        table.track(&array);

        assert_eq!(table.search(&pair), None);
        assert_eq!(table.search(&array), Some(1));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_type_values_are_ignored() {
        let mut table = DuplicateTable::new();
        table.track(&Value::Type(TypeRef::DateTime));
        assert!(table.is_empty());
    }

    #[test]
    fn test_get_out_of_range() {
        let table = DuplicateTable::new();
        assert!(matches!(table.get(3), Err(Error::Malformed(_))));
    }
}
