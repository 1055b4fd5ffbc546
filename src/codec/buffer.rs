//! Bounded relay message buffer.

use std::fmt;

/// Fixed-capacity message buffer shuttled between the two transports.
///
/// The buffer owns all bounds math: writes clamp to capacity and report how
/// much was kept, and the terminator index is clamped to the last valid
/// slot. Call sites hand over whatever length a peer claimed and rely on the
/// buffer to stay in range.
#[derive(Clone, Copy)]
pub struct RelayBuffer {
    data: [u8; Self::CAPACITY],
    len: usize,
}

impl RelayBuffer {
    /// Buffer capacity in bytes, matching the viewer message limit.
    pub const CAPACITY: usize = 128;

    /// Create an empty, zeroed buffer.
    pub fn new() -> Self {
        Self {
            data: [0; Self::CAPACITY],
            len: 0,
        }
    }

    /// Copy `bytes` into the buffer, truncating at capacity.
    ///
    /// Returns the number of bytes kept. A terminator is written after the
    /// content whenever room remains.
    pub fn copy_from(&mut self, bytes: &[u8]) -> usize {
        let keep = bytes.len().min(Self::CAPACITY);
        self.data[..keep].copy_from_slice(&bytes[..keep]);
        self.len = keep;
        if keep < Self::CAPACITY {
            self.data[keep] = 0;
        }
        keep
    }

    /// Write a terminator at `index`, clamped to the last valid slot.
    ///
    /// Peers may claim lengths larger than the buffer; clamping here is what
    /// makes a lying length field harmless.
    pub fn terminate_at(&mut self, index: usize) {
        let at = index.min(Self::CAPACITY - 1);
        self.data[at] = 0;
    }

    /// Stored content as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no content is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for RelayBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RelayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayBuffer")
            .field("len", &self.len)
            .field("data", &&self.data[..self.len])
            .finish()
    }
}
