// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use bitgraph::model::{ElementKind, TypeDefBuilder, TypeRef};
use bitgraph::{BinaryFormatter, FormatterConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let marker = TypeDefBuilder::value_type("Marker").build();
    let node = TypeDefBuilder::class("Node")
        .string_field("name")
        .field("weight", TypeRef::Primitive(ElementKind::R8))
        .field("stamp", TypeRef::DateTime)
        .self_field("next")
        .self_array_field("children", None)
        .field("marks", TypeRef::array_of(TypeRef::named(&marker)))
        .build();
    let config = FormatterConfig::new().max_depth(64).max_length(1 << 16);
    let Ok(formatter) = BinaryFormatter::with_config(config)
        .with_types(&[TypeRef::named(&node)])
    else {
        return;
    };

    // Untyped root: every wire path is reachable.
    let _ = formatter.deserialize(data);

    // Typed root: signature-free paths.
    let _ = formatter.deserialize_typed(&TypeRef::named(&node), data);
});
