//! CAN frame to relay buffer translation.
//!
//! Two framing profiles exist in the agent family: the bus relay carries the
//! full 8-byte CAN payload per frame, the companion agent sockets carry 7.
//! Both truncate to their working limit and neither pads.
//!
//! Viewer messages have no length prefix. A message ends at the first zero
//! byte, so the encode path measures content the way a C string would be
//! measured and an embedded zero truncates the message there.

use super::buffer::RelayBuffer;

/// Maximum payload bytes a classic CAN data frame can carry.
pub const MAX_FRAME_PAYLOAD: usize = 8;

/// Payload bytes captured per frame, by framing profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLimit {
    /// Bus relay framing: the full 8-byte CAN payload.
    Bus,
    /// Companion agent framing: 7 bytes per frame.
    Agent,
}

impl PayloadLimit {
    /// Working limit in bytes.
    pub const fn as_usize(self) -> usize {
        match self {
            Self::Bus => MAX_FRAME_PAYLOAD,
            Self::Agent => 7,
        }
    }
}

/// Length of a message measured as a zero-terminated string: the number of
/// bytes before the first zero, or all of `bytes` when none is present.
pub fn message_len(bytes: &[u8]) -> usize {
    bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len())
}

/// Decode one received frame payload into `buf`.
///
/// Copies `min(claimed_len, limit, data.len())` bytes but returns
/// `claimed_len` unchanged: callers treat a claimed length above the copy
/// limit as already truncated. The terminator write is clamped inside the
/// buffer, so a length field larger than the buffer is harmless.
pub fn decode_payload(
    data: &[u8],
    claimed_len: usize,
    limit: PayloadLimit,
    buf: &mut RelayBuffer,
) -> usize {
    let copy = claimed_len.min(limit.as_usize()).min(data.len());
    buf.copy_from(&data[..copy]);
    buf.terminate_at(claimed_len);
    claimed_len
}

/// Encode a relay message into CAN frame payload bytes.
///
/// The encoded length is `min(message_len, limit)`. Returns the payload
/// array and the encoded length; the frame identifier is always zero and is
/// supplied by the transport.
pub fn encode_payload(bytes: &[u8], limit: PayloadLimit) -> ([u8; MAX_FRAME_PAYLOAD], usize) {
    let len = message_len(bytes).min(limit.as_usize());
    let mut payload = [0u8; MAX_FRAME_PAYLOAD];
    payload[..len].copy_from_slice(&bytes[..len]);
    (payload, len)
}
