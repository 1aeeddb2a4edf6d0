//! Implementations of read/write cursors which assist with splitting a request payload into its
//! fields and packing result fields back into the shared data buffer
//!
//! These types are meant for internal use by the oracle variants. Note that the cursor methods
//! will **panic** if the respective buffers aren't the correct size; the command table guarantees
//! the payload lengths before any handler runs.

use core::cmp::min;
use core::convert::TryInto;

/// Cursor which enables reading from a buffer in strictly increasing indices; useful for unpacking
/// fixed-size fields from a payload
#[derive(Debug)]
pub struct ReadCursor<'a> {
    /// The buffer being read by the cursor
    buf: &'a [u8],
}

impl<'a> ReadCursor<'a> {
    /// Creates a new read cursor over the referenced buffer
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Advances the cursor `n` bytes on the referenced buffer
    pub fn advance(&mut self, n: usize) {
        self.buf = &self.buf[n..];
    }

    /// The number of bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Reads an N-byte array from the buffer, then advances by N bytes
    pub fn read_literal<const N: usize>(&mut self) -> [u8; N] {
        let val = self.buf[..N].try_into().unwrap();
        self.advance(N);
        val
    }

    /// Copies the content of the read cursor into `dst`, up to either the end of this cursor or
    /// of `dst`, whichever comes first
    pub fn copy_to(&mut self, dst: &mut [u8]) -> usize {
        let len = min(dst.len(), self.buf.len());
        dst[..len].copy_from_slice(&self.buf[..len]);
        self.advance(len);
        len
    }
}

/// Cursor which enables writing to a buffer in strictly increasing indices; useful for packing
/// result fields into the data buffer
///
/// Note that, to preserve the consistency of the mutated buffer, the functions here consume the
/// write cursor, returning the updated cursor to allow for chaining of writes
#[derive(Debug)]
pub struct WriteCursor<'a> {
    /// Buffer which is written to by this cursor
    buf: &'a mut [u8],
}

impl<'a> WriteCursor<'a> {
    /// Creates a new write cursor over the referenced buffer
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    /// Advances the cursor forward `n` bytes on the referenced buffer
    pub fn advance(self, n: usize) -> Self {
        Self {
            buf: &mut self.buf[n..],
        }
    }

    /// Writes the entire source buffer to the underlying buffer,
    /// then advances by the length of the source buffer
    pub fn write(self, src: &[u8]) -> Self {
        self.buf[..src.len()].copy_from_slice(src);
        self.advance(src.len())
    }

    /// Writes `n` copies of `byte`, then advances by `n`
    pub fn fill(self, byte: u8, n: usize) -> Self {
        for b in self.buf[..n].iter_mut() {
            *b = byte;
        }
        self.advance(n)
    }
}
