// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CRC-32 checksum used for type fingerprints.
//!
//! Type fingerprints are built by chaining CRC-32 over a sequence of tag
//! bytes and UTF-8 names, feeding each result back in as the seed of the
//! next step. The chaining property `crc32(b, crc32(a, s)) == crc32(a ++ b, s)`
//! is what makes the incremental fingerprint independent of how the input is
//! split.
//!
//! # Test Vector
//!
//! ```
//! use bitgraph::checksum::crc32;
//!
//! // Standard test vector: "123456789" -> 0xCBF43926
//! assert_eq!(crc32(b"123456789", 0), 0xCBF4_3926);
//! ```

/// Signature of a seeded checksum function.
///
/// The fingerprint registry takes one of these so tests (and exotic targets)
/// can substitute their own checksum.
pub type ChecksumFn = fn(&[u8], u32) -> u32;

/// CRC-32 (IEEE) of `data`, continuing from `seed`.
#[inline]
#[must_use]
pub fn crc32(data: &[u8], seed: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(seed);
    hasher.update(data);
    hasher.finalize()
}

/// Feed a single tag byte into a running checksum.
#[inline]
#[must_use]
pub fn crc32_byte(checksum: ChecksumFn, byte: u8, seed: u32) -> u32 {
    checksum(&[byte], seed)
}

/// Feed a UTF-8 name into a running checksum.
#[inline]
#[must_use]
pub fn crc32_name(checksum: ChecksumFn, name: &str, seed: u32) -> u32 {
    checksum(name.as_bytes(), seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_standard_vector() {
        assert_eq!(crc32(b"123456789", 0), 0xCBF4_3926);
    }

    #[test]
    fn test_crc32_empty_keeps_seed() {
        assert_eq!(crc32(&[], 0), 0);
        assert_eq!(crc32(&[], 0x1234_5678), 0x1234_5678);
    }

    #[test]
    fn test_crc32_chaining_matches_single_shot() {
        let data = b"Person.friend";
        let single_shot = crc32(data, 0);

        let mut incremental = 0;
        for chunk in data.chunks(3) {
            incremental = crc32(chunk, incremental);
        }

        assert_eq!(incremental, single_shot);
    }

    #[test]
    fn test_name_and_byte_helpers_chain() {
        let seed = crc32_name(crc32, "Node", 0);
        let seed = crc32_byte(crc32, 0x12, seed);
        assert_eq!(seed, crc32(b"Node\x12", 0));
    }

    #[test]
    fn test_crc32_detects_single_bit_flip() {
        let data = b"fingerprint";
        let original = crc32(data, 0);

        let mut modified = data.to_vec();
        for i in 0..modified.len() {
            for bit in 0..8 {
                modified[i] ^= 1 << bit;
                assert_ne!(crc32(&modified, 0), original, "byte {} bit {}", i, bit);
                modified[i] ^= 1 << bit;
            }
        }
    }
}
