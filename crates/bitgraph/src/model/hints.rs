// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-field serialization hints.

use std::ops::{BitAnd, BitOr};

/// Option flags carried by [`Hints`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HintOptions(u32);

impl HintOptions {
    pub const NONE: HintOptions = HintOptions(0);
    /// The value is never null.
    pub const POINTER_NEVER_NULL: HintOptions = HintOptions(0x0000_0010);
    /// The runtime type always equals the declared type.
    pub const FIXED_TYPE: HintOptions = HintOptions(0x0000_0100);

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn contains(self, other: HintOptions) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(self, other: HintOptions) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for HintOptions {
    type Output = HintOptions;

    fn bitor(self, rhs: Self) -> Self {
        HintOptions(self.0 | rhs.0)
    }
}

impl BitAnd for HintOptions {
    type Output = HintOptions;

    fn bitand(self, rhs: Self) -> Self {
        HintOptions(self.0 & rhs.0)
    }
}

/// Narrowing of the wire representation for one field.
///
/// * `array_size`: fixed element count, `-1` reads elements until the stream
///   runs out, `0` means no declared size.
/// * `bit_packed`: wire width override in bits, `0` keeps the type default.
/// * `range_bias`: subtracted before encoding, added after decoding.
/// * `scale`: divisor before encoding, multiplier after decoding, `0` disables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hints {
    pub options: HintOptions,
    pub array_size: i32,
    pub bit_packed: u32,
    pub range_bias: i64,
    pub scale: u64,
}

impl Hints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: HintOptions) -> Self {
        self.options = self.options | options;
        self
    }

    pub fn fixed_type(self) -> Self {
        self.with_options(HintOptions::FIXED_TYPE)
    }

    pub fn never_null(self) -> Self {
        self.with_options(HintOptions::POINTER_NEVER_NULL)
    }

    pub fn array_size(mut self, size: i32) -> Self {
        self.array_size = size;
        self
    }

    pub fn bit_packed(mut self, bits: u32) -> Self {
        self.bit_packed = bits;
        self
    }

    pub fn range_bias(mut self, bias: i64) -> Self {
        self.range_bias = bias;
        self
    }

    pub fn scale(mut self, scale: u64) -> Self {
        self.scale = scale;
        self
    }

    pub fn is_fixed_type(&self) -> bool {
        self.options.contains(HintOptions::FIXED_TYPE)
    }

    pub fn is_never_null(&self) -> bool {
        self.options.contains(HintOptions::POINTER_NEVER_NULL)
    }

    /// Hints handed to collection elements: only the type and null options
    /// survive, and only when at least one of them is set.
    pub fn for_elements(&self) -> Option<Hints> {
        let kept = self.options & (HintOptions::FIXED_TYPE | HintOptions::POINTER_NEVER_NULL);
        if kept.is_empty() {
            return None;
        }
        Some(Hints {
            options: kept,
            ..Hints::default()
        })
    }

    /// Hints used for a root bound to a declared type.
    pub fn root() -> Self {
        Hints::new().fixed_type().never_null()
    }
}
