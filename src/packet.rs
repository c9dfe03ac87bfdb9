// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Binary packet codec
//!
//! Every field is 4-byte aligned:
//! - numbers are little-endian `f32` (enums, counts and handles included)
//! - strings are a number byte-length prefix, UTF-8 bytes, zero padding to 4
//! - booleans are one byte followed by 3 padding bytes
//!
//! Reader and writer must walk fields in the same order. There is no
//! framing or type tagging, so a skipped field desynchronizes everything
//! after it; `pad_offset`/`pad_string` exist to skip fields without
//! materializing them.

use crate::error::{MirrorError, Result};

/// Field alignment in bytes
pub const FIELD_ALIGN: usize = 4;

/// Encoded width of a number field
pub const NUMBER_SIZE: usize = 4;

/// Encoded width of a bool field
pub const BOOL_SIZE: usize = 4;

/// Align value to power of 2, saturating at the largest aligned `usize`.
pub fn align_to(value: usize, alignment: usize) -> usize {
    value.saturating_add(alignment - 1) & !(alignment - 1)
}

/// Encoded width of a string field
pub fn string_size(s: &str) -> usize {
    NUMBER_SIZE + align_to(s.len(), FIELD_ALIGN)
}

/// Destination for encoded fields.
///
/// Implemented by [`Packet`] and by [`PacketSizer`], so one encode routine
/// can first measure and then fill an exactly-sized packet.
pub trait FieldSink {
    fn write_number(&mut self, value: f64) -> Result<()>;
    fn write_string(&mut self, value: &str) -> Result<()>;
    fn write_bool(&mut self, value: bool) -> Result<()>;
}

/// Counts encoded bytes without writing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketSizer {
    len: usize,
}

impl PacketSizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl FieldSink for PacketSizer {
    fn write_number(&mut self, _value: f64) -> Result<()> {
        self.len += NUMBER_SIZE;
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.len += string_size(value);
        Ok(())
    }

    fn write_bool(&mut self, _value: bool) -> Result<()> {
        self.len += BOOL_SIZE;
        Ok(())
    }
}

/// Write side: a pre-sized buffer plus a cursor.
#[derive(Debug, Clone)]
pub struct Packet {
    buffer: Vec<u8>,
    offset: usize,
}

impl Packet {
    /// Create a packet with exactly `len` bytes of room.
    pub fn with_len(len: usize) -> Self {
        Self {
            buffer: vec![0; len],
            offset: 0,
        }
    }

    /// Declared length in bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes written so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// True once every declared byte has been written.
    pub fn is_full(&self) -> bool {
        self.offset == self.buffer.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Reserve `width` bytes at the cursor and return the slot.
    fn claim(&mut self, width: usize) -> Result<&mut [u8]> {
        if self.offset % FIELD_ALIGN != 0 {
            return Err(MirrorError::Misaligned {
                offset: self.offset,
            });
        }
        let end = match self.offset.checked_add(width) {
            Some(end) if end <= self.buffer.len() => end,
            _ => {
                return Err(MirrorError::BufferOverrun {
                    offset: self.offset,
                    requested: width,
                    len: self.buffer.len(),
                })
            }
        };
        let start = self.offset;
        self.offset = end;
        Ok(&mut self.buffer[start..end])
    }
}

impl FieldSink for Packet {
    fn write_number(&mut self, value: f64) -> Result<()> {
        let slot = self.claim(NUMBER_SIZE)?;
        slot.copy_from_slice(&(value as f32).to_le_bytes());
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        // Check the whole field up front so a failed write leaves the cursor put.
        let needed = string_size(value);
        if self.offset + needed > self.buffer.len() {
            return Err(MirrorError::BufferOverrun {
                offset: self.offset,
                requested: needed,
                len: self.buffer.len(),
            });
        }
        self.write_number(bytes.len() as f64)?;
        let slot = self.claim(align_to(bytes.len(), FIELD_ALIGN))?;
        slot[..bytes.len()].copy_from_slice(bytes);
        slot[bytes.len()..].fill(0);
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        let slot = self.claim(BOOL_SIZE)?;
        slot[0] = u8::from(value);
        slot[1..].fill(0);
        Ok(())
    }
}

/// Read side: borrowed bytes plus a cursor.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, width: usize) -> Result<&'a [u8]> {
        if self.offset % FIELD_ALIGN != 0 {
            return Err(MirrorError::Misaligned {
                offset: self.offset,
            });
        }
        let end = match self.offset.checked_add(width) {
            Some(end) if end <= self.bytes.len() => end,
            _ => {
                return Err(MirrorError::ReadOverrun {
                    offset: self.offset,
                    requested: width,
                    len: self.bytes.len(),
                })
            }
        };
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn read_number(&mut self) -> Result<f64> {
        let raw = self.take(NUMBER_SIZE)?;
        let value = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        Ok(f64::from(value))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let start = self.offset;
        let len = self.string_len()?;
        let raw = self.take(align_to(len, FIELD_ALIGN))?;
        std::str::from_utf8(&raw[..len])
            .map(str::to_owned)
            .map_err(|_| MirrorError::InvalidString { offset: start })
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let raw = self.take(BOOL_SIZE)?;
        Ok(raw[0] != 0)
    }

    /// Read a number that must be a non-negative integer (counts, ids, handles).
    pub fn read_count(&mut self, what: &'static str) -> Result<usize> {
        let value = self.read_number()?;
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
            return Err(MirrorError::InvalidNumber { what, value });
        }
        Ok(value as usize)
    }

    /// Read a count that must also fit in 32 bits.
    pub fn read_u32(&mut self, what: &'static str) -> Result<u32> {
        let raw = self.read_count(what)?;
        u32::try_from(raw).map_err(|_| MirrorError::InvalidNumber {
            what,
            value: raw as f64,
        })
    }

    /// Length prefix of a string field, bounded by the bytes left.
    fn string_len(&mut self) -> Result<usize> {
        let len = self.read_count("string length")?;
        if len > self.remaining() {
            return Err(MirrorError::ReadOverrun {
                offset: self.offset,
                requested: len,
                len: self.bytes.len(),
            });
        }
        Ok(len)
    }

    /// Skip `bytes` bytes of fixed-width fields.
    pub fn pad_offset(&mut self, bytes: usize) -> Result<()> {
        self.take(bytes).map(|_| ())
    }

    /// Skip `count` number fields.
    pub fn pad_numbers(&mut self, count: usize) -> Result<()> {
        self.pad_offset(count * NUMBER_SIZE)
    }

    pub fn pad_bool(&mut self) -> Result<()> {
        self.pad_offset(BOOL_SIZE)
    }

    /// Skip a string field, honoring its length prefix.
    pub fn pad_string(&mut self) -> Result<()> {
        let len = self.string_len()?;
        self.pad_offset(align_to(len, FIELD_ALIGN))
    }
}
