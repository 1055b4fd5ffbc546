//! Core building blocks for the relay daemon.
//!
//! Holds the crate-wide error type and the shutdown signalling primitives.
//! Everything here is transport-agnostic.

pub mod error;
pub mod shutdown;

pub use error::{BridgeError, Result};
pub use shutdown::*;
