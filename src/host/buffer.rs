// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Borrowed body buffer exposed to the guest for the duration of one call.

use crate::errors::{WasmError, WasmResult};
use bytes::BytesMut;

/// Bit set in a packed read result once the data is exhausted.
pub const END_OF_DATA: u64 = 1 << 32;

/// Which body a guest read or write targets. ABI codes 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Request,
    Response,
}

impl BodyKind {
    pub fn from_code(code: u32) -> WasmResult<Self> {
        match code {
            0 => Ok(BodyKind::Request),
            1 => Ok(BodyKind::Response),
            other => Err(WasmError::BadArgument(format!("unknown body kind {}", other))),
        }
    }
}

/// Decoded form of the packed word returned by [`HostBuffer::copy_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    pub copied: u32,
    pub end_of_data: bool,
}

impl ReadResult {
    pub fn unpack(word: u64) -> Self {
        Self {
            copied: word as u32,
            end_of_data: word & END_OF_DATA != 0,
        }
    }

    pub fn pack(self) -> u64 {
        u64::from(self.copied) | if self.end_of_data { END_OF_DATA } else { 0 }
    }
}

enum Source<'a> {
    Absent,
    ReadOnly(&'a [u8]),
    Writable(&'a mut BytesMut),
}

/// Non-owning view over proxy-managed body bytes plus a read cursor.
///
/// Built fresh for every guest call; the borrow makes it impossible to keep
/// it past the callback that produced it.
pub struct HostBuffer<'a> {
    source: Source<'a>,
    cursor: usize,
}

impl<'a> HostBuffer<'a> {
    /// A buffer with nothing bound. Reads report end of data.
    pub fn absent() -> Self {
        Self {
            source: Source::Absent,
            cursor: 0,
        }
    }

    /// Read-only view. Writes are accepted and ignored.
    pub fn read_only(data: &'a [u8]) -> Self {
        Self {
            source: Source::ReadOnly(data),
            cursor: 0,
        }
    }

    /// Mutable view. Writes replace the proxy's buffer contents.
    pub fn writable(data: &'a mut BytesMut) -> Self {
        Self {
            source: Source::Writable(data),
            cursor: 0,
        }
    }

    fn data(&self) -> Option<&[u8]> {
        match &self.source {
            Source::Absent => None,
            Source::ReadOnly(data) => Some(*data),
            Source::Writable(data) => Some(&data[..]),
        }
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self.source, Source::Absent)
    }

    pub fn len(&self) -> usize {
        self.data().map_or(0, <[u8]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes already handed to the guest.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Copies the next window of data into `dest`.
    ///
    /// Copies `min(dest.len(), remaining)` bytes and then treats the whole
    /// requested window as consumed: the cursor advances by `dest.len()`
    /// (clamped to the data length), not by the bytes copied. The packed
    /// result holds the copied count in the low 32 bits and [`END_OF_DATA`]
    /// once the copy reached the end. With nothing left to read only
    /// [`END_OF_DATA`] is returned.
    pub fn copy_to(&mut self, dest: &mut [u8]) -> u64 {
        let cursor = self.cursor;
        let Some(data) = self.data() else {
            return END_OF_DATA;
        };
        if cursor >= data.len() {
            return END_OF_DATA;
        }

        let len = data.len();
        let copied = dest.len().min(len - cursor);
        dest[..copied].copy_from_slice(&data[cursor..cursor + copied]);

        self.cursor = cursor.saturating_add(dest.len()).min(len);
        ReadResult {
            copied: copied as u32,
            end_of_data: self.cursor >= len,
        }
        .pack()
    }

    /// Replaces the buffer contents with `data`.
    ///
    /// The read cursor is left where it is. A read-only or absent buffer
    /// silently ignores the write.
    pub fn copy_from(&mut self, data: &[u8]) -> WasmResult<()> {
        if let Source::Writable(buffer) = &mut self.source {
            buffer.clear();
            buffer.extend_from_slice(data);
        }
        Ok(())
    }
}
