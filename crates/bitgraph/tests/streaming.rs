// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoding from a stream that a producer thread is still filling.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bitgraph::model::{ElementKind, ObjectData, TypeDefBuilder, TypeRef};
use bitgraph::{BinaryFormatter, BitStream, Error, Value};

fn sample_graph() -> (Value, TypeRef) {
    let sample = TypeDefBuilder::class("Sample")
        .string_field("source")
        .field(
            "values",
            TypeRef::array_of(TypeRef::Primitive(ElementKind::I8)),
        )
        .build();
    let values = (0..64).map(|i| Value::I64(i * 1_000_003)).collect();
    let value = Value::object(
        ObjectData::new(&sample)
            .with("source", "sensor-7")
            .and_then(|d| {
                d.with(
                    "values",
                    Value::array(TypeRef::Primitive(ElementKind::I8), values),
                )
            })
            .expect("sample"),
    );
    (value, TypeRef::named(&sample))
}

#[test]
fn test_consumer_waits_for_producer_chunks() {
    let (value, ty) = sample_graph();
    let formatter = BinaryFormatter::new();
    let bytes = formatter.serialize(&value).expect("serialize");

    let stream = Arc::new(BitStream::blocking());
    let consumer = {
        let stream = Arc::clone(&stream);
        let decoder = BinaryFormatter::new().with_types(&[ty]).expect("register");
        thread::spawn(move || decoder.deserialize_stream(&stream))
    };

    for chunk in bytes.chunks(7) {
        stream.append_chunk(chunk, chunk.len() * 8);
        thread::sleep(Duration::from_millis(1));
    }
    stream.mark_stream_end();

    let decoded = consumer.join().expect("join").expect("deserialize");
    assert_eq!(decoded, value);
}

#[test]
fn test_stream_end_releases_blocked_reader() {
    let (value, ty) = sample_graph();
    let bytes = BinaryFormatter::new().serialize(&value).expect("serialize");

    let stream = Arc::new(BitStream::blocking());
    let consumer = {
        let stream = Arc::clone(&stream);
        let decoder = BinaryFormatter::new().with_types(&[ty]).expect("register");
        thread::spawn(move || decoder.deserialize_stream(&stream))
    };

    stream.append_chunk(&bytes[..bytes.len() / 2], bytes.len() / 2 * 8);
    thread::sleep(Duration::from_millis(5));
    stream.mark_stream_end();

    assert!(matches!(
        consumer.join().expect("join"),
        Err(Error::EndOfStream)
    ));
}

#[test]
fn test_partial_last_byte() {
    // 21 bits: list header and length, then one signed bool. No padding.
    let list = Value::list(vec![Value::Bool(false)]);
    let bytes = BinaryFormatter::new().serialize(&list).expect("serialize");

    let stream = BitStream::new();
    stream.append_chunk(&bytes, 4 + 8 + 8 + 1);
    assert_eq!(stream.bits_available(), 21);
    assert_eq!(BinaryFormatter::new().deserialize_stream(&stream), Ok(list));
    assert_eq!(stream.bits_available(), 0);
}
