// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for bitgraph.
//!
//! Every failure is terminal for the serialize/deserialize call that raised
//! it: no partial output is produced and nothing is retried internally.

use thiserror::Error;

/// Result type for bitgraph operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for bitgraph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Type cannot be classified or instantiated.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Null value where the hints declare the pointer never null.
    #[error("PointerNeverNull violation")]
    PointerNeverNullViolation,

    /// Null value in a context that writes no signature at all.
    #[error("NoSignature violation: null cannot be represented for {0}")]
    NoSignatureViolation(String),

    /// Shared instance in a context without a presence header.
    #[error("no duplicates allowed for FixedType + PointerNeverNull (index {0})")]
    NoDuplicatesAllowedViolation(u32),

    /// Array or list length does not match the declared size.
    #[error("ArraySize violation: expected {expected}, got {actual}")]
    ArraySizeViolation { expected: i64, actual: i64 },

    /// Runtime type differs from the fixed expected type.
    #[error("FixedType violation: expected {expected}, got {actual}")]
    FixedTypeViolation { expected: String, actual: String },

    /// Value does not fit the resolved wire representation.
    #[error("value outside range: {0}")]
    ValueOutOfRange(String),

    /// Two distinct types produced the same fingerprint.
    #[error("hash conflict: 0x{hash:08x} {candidate} (registered: {existing})")]
    TypeFingerprintCollision {
        hash: u32,
        existing: String,
        candidate: String,
    },

    /// Fingerprint read from the wire has no registered type.
    #[error("cannot find type for hash {0:08X}")]
    UnknownTypeFingerprint(u32),

    /// Non-blocking read past the available bits, or read after stream end.
    #[error("unexpected end of stream")]
    EndOfStream,

    /// Wire data that cannot be parsed.
    #[error("malformed stream: {0}")]
    Malformed(String),

    /// Traversal frame stack exceeded the configured maximum depth.
    #[error("traversal depth limit of {0} frames exceeded")]
    DepthLimitExceeded(usize),
}

impl Error {
    pub(crate) fn out_of_range(bits: u32, bias: i64, scale: u64) -> Self {
        Error::ValueOutOfRange(format!("Bits={} Bias={} Scale={}", bits, bias, scale))
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::Malformed(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_variants() {
        let err = Error::ArraySizeViolation {
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "ArraySize violation: expected 2, got 3");

        let err = Error::UnknownTypeFingerprint(0xDEAD_BEEF);
        assert_eq!(err.to_string(), "cannot find type for hash DEADBEEF");

        let err = Error::out_of_range(4, 0, 0);
        assert_eq!(err.to_string(), "value outside range: Bits=4 Bias=0 Scale=0");
    }

    #[test]
    fn test_collision_message_names_both_types() {
        let err = Error::TypeFingerprintCollision {
            hash: 0x0000_00ff,
            existing: "Person".into(),
            candidate: "Person".into(),
        };
        let text = err.to_string();
        assert!(text.starts_with("hash conflict: 0x000000ff"));
        assert!(text.contains("registered: Person"));
    }
}
