// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use bitgraph::BitStream;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&widths, payload)) = data.split_first() else {
        return;
    };

    // Compressed integers must re-encode to the bytes they came from.
    let stream = BitStream::from_bytes(payload);
    while let Ok(value) = stream.read_compressed_u32() {
        let echo = BitStream::new();
        if echo.write_compressed_u32(value).is_ok() {
            let again = BitStream::from_bytes(&echo.to_bytes());
            assert_eq!(again.read_compressed_u32().ok(), Some(value));
        }
    }

    // Mixed-width reads never read past the end.
    let stream = BitStream::from_bytes(payload);
    let width = u32::from(widths % 64) + 1;
    while stream.read_bits_wide(width).is_ok() {}
    assert!(stream.bits_available() < width as usize);
});
