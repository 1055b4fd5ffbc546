//! Frame translation layer.
//!
//! The bounded relay buffer plus the rules that map CAN frame payloads to
//! and from it. Pure functions over byte slices; no sockets in here.

pub mod buffer;
pub mod frame;

pub use buffer::RelayBuffer;
pub use frame::{decode_payload, encode_payload, message_len, PayloadLimit, MAX_FRAME_PAYLOAD};
