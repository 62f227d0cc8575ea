// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Chunked, bit-addressable buffer.
//!
//! Bits are packed MSB-first: the first bit written lands in bit 7 of the
//! first byte. Storage is a list of fixed-capacity chunks so that a producer
//! can keep appending while a consumer reads from the front.
//!
//! # Concurrency
//!
//! Every operation takes `&self` and locks one `parking_lot::Mutex`. A stream
//! created with [`BitStream::blocking`] parks readers on a `Condvar` until the
//! producer appends more bits or calls [`BitStream::mark_stream_end`].
//!
//! ```
//! use bitgraph::BitStream;
//!
//! let stream = BitStream::new();
//! stream.write_bits(0b101, 3).unwrap();
//! stream.write_compressed_u32(300).unwrap();
//!
//! assert_eq!(stream.read_bits(3).unwrap(), 0b101);
//! assert_eq!(stream.read_compressed_u32().unwrap(), 300);
//! assert_eq!(stream.bits_available(), 0);
//! ```

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{Error, Result};

/// Default chunk capacity in bytes.
pub const DEFAULT_CHUNK_CAPACITY: usize = 512;

/// Sentinel carried by the one-byte compressed form `0xFF`.
pub const COMPRESSED_ABSENT: u32 = u32::MAX;

const COMPRESSED_1_LIMIT: u32 = 0x80;
const COMPRESSED_2_LIMIT: u32 = 0x3F00;
const COMPRESSED_4_LIMIT: u32 = 0x3F00_0000;

#[derive(Debug)]
struct Chunk {
    data: Vec<u8>,
    /// Valid bits in `data`.
    bits: usize,
    /// Capacity in bits; appended chunks are exactly as large as their data.
    capacity_bits: usize,
}

impl Chunk {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            data: vec![0; bytes],
            bits: 0,
            capacity_bits: bytes * 8,
        }
    }

    fn room(&self) -> usize {
        self.capacity_bits - self.bits
    }
}

#[derive(Debug)]
struct Inner {
    chunks: Vec<Chunk>,
    chunk_capacity: usize,
    read_chunk: usize,
    read_bit: usize,
    ended: bool,
}

impl Inner {
    fn push_bits(&mut self, value: u32, mut bits: u32) {
        while bits > 0 {
            let needs_chunk = self.chunks.last().map_or(true, |c| c.room() == 0);
            if needs_chunk {
                self.chunks.push(Chunk::with_capacity(self.chunk_capacity));
            }
            let Some(chunk) = self.chunks.last_mut() else {
                return;
            };

            let byte = chunk.bits / 8;
            let free_in_byte = 8 - (chunk.bits % 8) as u32;
            let take = bits.min(free_in_byte);
            let part = (value >> (bits - take)) & low_mask(take);

            chunk.data[byte] |= (part << (free_in_byte - take)) as u8;
            chunk.bits += take as usize;
            bits -= take;
        }
    }

    /// Bits readable right now, without waiting.
    fn buffered_bits(&self) -> usize {
        self.chunks
            .iter()
            .enumerate()
            .skip(self.read_chunk)
            .map(|(i, c)| {
                if i == self.read_chunk {
                    c.bits.saturating_sub(self.read_bit)
                } else {
                    c.bits
                }
            })
            .sum()
    }

    /// Take up to `want` bits from the current read position without
    /// crossing a byte boundary. Returns `None` when nothing is buffered.
    fn take_bits(&mut self, want: u32) -> Option<(u32, u32)> {
        loop {
            let chunk = self.chunks.get(self.read_chunk)?;
            if self.read_bit < chunk.bits {
                let byte = chunk.data[self.read_bit / 8] as u32;
                let used_in_byte = (self.read_bit % 8) as u32;
                let left_in_chunk = (chunk.bits - self.read_bit) as u32;
                let take = want.min(8 - used_in_byte).min(left_in_chunk);
                let part = (byte >> (8 - used_in_byte - take)) & low_mask(take);
                self.read_bit += take as usize;
                return Some((part, take));
            }
            if self.read_chunk + 1 >= self.chunks.len() {
                return None;
            }
            self.read_chunk += 1;
            self.read_bit = 0;
        }
    }
}

#[inline]
fn low_mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

fn check_width(bits: u32, limit: u32) -> Result<()> {
    if bits > limit {
        return Err(Error::ValueOutOfRange(format!(
            "bit count {} exceeds {}",
            bits, limit
        )));
    }
    Ok(())
}

/// Chunked bit stream shared by one producer and one consumer.
#[derive(Debug)]
pub struct BitStream {
    inner: Mutex<Inner>,
    readable: Condvar,
    blocking: bool,
}

impl Default for BitStream {
    fn default() -> Self {
        Self::new()
    }
}

impl BitStream {
    /// Empty, non-blocking stream with the default chunk capacity.
    pub fn new() -> Self {
        Self::with_chunk_capacity(DEFAULT_CHUNK_CAPACITY)
    }

    /// Empty, non-blocking stream whose write chunks hold `bytes` bytes.
    pub fn with_chunk_capacity(bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                chunks: Vec::new(),
                chunk_capacity: bytes.max(1),
                read_chunk: 0,
                read_bit: 0,
                ended: false,
            }),
            readable: Condvar::new(),
            blocking: false,
        }
    }

    /// Empty stream whose reads wait for more data instead of failing.
    pub fn blocking() -> Self {
        Self {
            blocking: true,
            ..Self::new()
        }
    }

    /// Non-blocking stream pre-loaded with `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let stream = Self::new();
        stream.append_chunk(bytes, bytes.len() * 8);
        stream
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Append `bit_len` bits taken MSB-first from `data` as a new chunk.
    ///
    /// The last byte may be partial; its unused low bits are ignored.
    pub fn append_chunk(&self, data: &[u8], bit_len: usize) {
        if bit_len == 0 {
            return;
        }
        let bytes = bit_len.div_ceil(8).min(data.len());
        let bits = bit_len.min(bytes * 8);

        let mut inner = self.inner.lock();
        inner.chunks.push(Chunk {
            data: data[..bytes].to_vec(),
            bits,
            capacity_bits: bits,
        });
        log::trace!("[bitstream] appended chunk of {} bits", bits);
        self.readable.notify_all();
    }

    /// Release blocked readers; reads past the buffered data now fail.
    pub fn mark_stream_end(&self) {
        let mut inner = self.inner.lock();
        inner.ended = true;
        self.readable.notify_all();
    }

    pub fn is_ended(&self) -> bool {
        self.inner.lock().ended
    }

    /// Move the read position back to the first bit.
    pub fn rewind(&self) {
        let mut inner = self.inner.lock();
        inner.read_chunk = 0;
        inner.read_bit = 0;
    }

    /// Bits that can be read without waiting.
    pub fn bits_available(&self) -> usize {
        self.inner.lock().buffered_bits()
    }

    /// Total bits written or appended.
    pub fn len_bits(&self) -> usize {
        self.inner.lock().chunks.iter().map(|c| c.bits).sum()
    }

    /// Concatenate all chunks.
    ///
    /// Each chunk contributes its used bytes; a chunk that ends inside a byte
    /// contributes that byte zero-padded, so only the last chunk may be
    /// unaligned for the result to be meaningful.
    pub fn to_bytes(&self) -> Vec<u8> {
        let inner = self.inner.lock();
        let total = inner.chunks.iter().map(|c| c.bits.div_ceil(8)).sum();
        let mut out = Vec::with_capacity(total);
        for chunk in &inner.chunks {
            out.extend_from_slice(&chunk.data[..chunk.bits.div_ceil(8)]);
        }
        out
    }

    /// Write the low `bits` bits of `value` (at most 32).
    pub fn write_bits(&self, value: u32, bits: u32) -> Result<()> {
        check_width(bits, 32)?;
        let value = value & low_mask(bits);
        log::trace!("[bitstream] OUTPUT: {:08X} {}", value, bits);

        let mut inner = self.inner.lock();
        inner.push_bits(value, bits);
        self.readable.notify_all();
        Ok(())
    }

    /// Read `bits` bits (at most 32) as an unsigned value.
    pub fn read_bits(&self, bits: u32) -> Result<u32> {
        check_width(bits, 32)?;
        let mut inner = self.inner.lock();
        let value = self.pull_bits(&mut inner, bits)?;
        log::trace!("[bitstream] INPUT: {:08X} {}", value, bits);
        Ok(value)
    }

    fn pull_bits(&self, inner: &mut MutexGuard<'_, Inner>, bits: u32) -> Result<u32> {
        let mut value = 0u32;
        let mut remaining = bits;
        while remaining > 0 {
            match inner.take_bits(remaining) {
                Some((part, taken)) => {
                    value = if taken >= 32 { part } else { (value << taken) | part };
                    remaining -= taken;
                }
                None if self.blocking && !inner.ended => {
                    self.readable.wait(inner);
                }
                None => return Err(Error::EndOfStream),
            }
        }
        Ok(value)
    }

    /// Write up to 64 bits: the high part first, then the low 32 bits.
    pub fn write_bits_wide(&self, value: u64, bits: u32) -> Result<()> {
        check_width(bits, 64)?;
        if bits > 32 {
            self.write_bits((value >> 32) as u32, bits - 32)?;
            self.write_bits(value as u32, 32)
        } else {
            self.write_bits(value as u32, bits)
        }
    }

    pub fn read_bits_wide(&self, bits: u32) -> Result<u64> {
        check_width(bits, 64)?;
        if bits > 32 {
            let high = self.read_bits(bits - 32)? as u64;
            let low = self.read_bits(32)? as u64;
            Ok((high << 32) | low)
        } else {
            Ok(self.read_bits(bits)? as u64)
        }
    }

    /// Write `data` as a run of 8-bit values under one lock.
    pub fn write_bytes(&self, data: &[u8]) {
        let mut inner = self.inner.lock();
        for &byte in data {
            inner.push_bits(byte as u32, 8);
        }
        self.readable.notify_all();
    }

    /// Read exactly `len` bytes as 8-bit values.
    pub fn read_bytes(&self, len: usize) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.pull_bits(&mut inner, 8)? as u8);
        }
        Ok(out)
    }

    /// Write `value` in the 1/2/4-byte compressed form.
    ///
    /// `u32::MAX` is the one-byte sentinel `0xFF`; values from `0x3F00_0000`
    /// up to `u32::MAX - 1` have no encoding.
    pub fn write_compressed_u32(&self, value: u32) -> Result<()> {
        if value == COMPRESSED_ABSENT {
            self.write_bits(0xFF, 8)
        } else if value < COMPRESSED_1_LIMIT {
            self.write_bits(value, 8)
        } else if value < COMPRESSED_2_LIMIT {
            self.write_bits(0x8000 | value, 16)
        } else if value < COMPRESSED_4_LIMIT {
            self.write_bits(0xC000_0000 | value, 32)
        } else {
            Err(Error::ValueOutOfRange(format!(
                "{:#x} has no compressed encoding",
                value
            )))
        }
    }

    pub fn read_compressed_u32(&self) -> Result<u32> {
        let first = self.read_bits(8)?;
        if first == 0xFF {
            return Ok(COMPRESSED_ABSENT);
        }
        match first & 0xC0 {
            0x80 => Ok(((first & 0x3F) << 8) | self.read_bits(8)?),
            0xC0 => Ok(((first & 0x3F) << 24) | self.read_bits(24)?),
            _ => Ok(first),
        }
    }
}
