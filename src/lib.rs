//! # canbridge
//!
//! A relay daemon bridging one SocketCAN interface to one TCP viewer
//! connection on the local host.
//!
//! ## Features
//!
//! - **Bidirectional**: CAN frames become raw viewer messages and viewer
//!   messages become zero-identifier CAN frames
//! - **Bounded**: every payload passes through a fixed 128-byte relay
//!   buffer with clamped truncation, whatever a peer claims
//! - **Degradable**: a failed read closes one side while the other keeps
//!   being serviced; write failures are logged and swallowed
//! - **Provisioned**: the `can<N>` interface is brought up and torn down
//!   around the session, or left alone when managed externally
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use canbridge::config::BridgeConfig;
//! use canbridge::provision::ShellProvisioner;
//! use canbridge::relay::Relay;
//!
//! let config = BridgeConfig::default();
//! let relay = Relay::start(&config, Box::new(ShellProvisioner::new())).await?;
//! let stats = relay.run().await;
//! println!("session done: {stats}");
//! ```

pub mod codec;
pub mod config;
pub mod core;
pub mod provision;
pub mod relay;
pub mod transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{PayloadLimit, RelayBuffer};
    pub use crate::config::BridgeConfig;
    pub use crate::core::error::{BridgeError, Result};
    pub use crate::provision::{NoopProvisioner, Provisioner, ShellProvisioner};
    pub use crate::relay::{Relay, RelayState, RelayStats};
    pub use crate::transport::{LinkRead, RelayLink};
}

// Re-export core types at crate root for convenience
pub use crate::core::error::{BridgeError, Result};
pub use crate::relay::{Relay, RelayState, RelayStats};
