//! Crate-wide error type.
//!
//! Transport reads never surface here: a failed read closes its side and is
//! reported as a closure through the link seam. Everything else, from a bad
//! config file to a refused viewer connection, funnels into [`BridgeError`]
//! and propagates up to the process shell, which decides the exit code.

use thiserror::Error;

/// Unified result type for relay operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised by the relay and its collaborators.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// An interface provisioning command failed.
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// Establishing a transport connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// CAN socket I/O failure.
    #[error("CAN transport error: {0}")]
    Can(String),

    /// TCP socket I/O failure.
    #[error("TCP transport error: {0}")]
    Tcp(String),

    /// I/O failure outside the transports (signal registration and the like).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
