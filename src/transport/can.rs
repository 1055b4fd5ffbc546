//! SocketCAN endpoint.
//!
//! Owns the raw CAN socket bound to one `can<N>` interface. Reads arrive as
//! whole frames and pass through the codec; writes encode at the
//! transport's framing profile and carry a zero identifier, as the viewer
//! protocol expects.

use socketcan::tokio::CanSocket;
use socketcan::{CanFrame, EmbeddedFrame, StandardId};

use crate::codec::{decode_payload, encode_payload, PayloadLimit, RelayBuffer};
use crate::core::error::{BridgeError, Result};
use crate::transport::{LinkRead, RelayLink};

/// Interface name for a bus index (`can0`, `can1`, ...).
pub fn interface_name(index: u8) -> String {
    format!("can{index}")
}

/// The CAN side of the relay.
pub struct CanTransport {
    socket: Option<CanSocket>,
    interface: String,
    limit: PayloadLimit,
}

impl CanTransport {
    /// Open a raw CAN socket bound to `can<index>`.
    ///
    /// Socket creation, interface resolution and bind all happen here. Any
    /// failure is unrecoverable for the session and is reported to the
    /// caller, which exits.
    pub fn open(index: u8, limit: PayloadLimit) -> Result<Self> {
        let interface = interface_name(index);
        let socket = CanSocket::open(&interface)
            .map_err(|e| BridgeError::Can(format!("failed to open {interface}: {e}")))?;

        tracing::info!(interface = %interface, "CAN socket bound");

        Ok(Self {
            socket: Some(socket),
            interface,
            limit,
        })
    }

    /// Name of the bound interface.
    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl RelayLink for CanTransport {
    async fn recv(&mut self) -> LinkRead {
        let Some(socket) = self.socket.as_mut() else {
            return LinkRead::Closed;
        };

        match socket.read_frame().await {
            Ok(frame) => {
                let mut buf = RelayBuffer::new();
                let claimed = decode_payload(frame.data(), frame.dlc(), self.limit, &mut buf);
                if claimed == 0 {
                    LinkRead::Empty
                } else {
                    tracing::debug!(interface = %self.interface, len = claimed, "CAN frame received");
                    LinkRead::Data(buf)
                }
            }
            Err(e) => {
                tracing::warn!(interface = %self.interface, error = %e, "CAN read failed, closing");
                self.close();
                LinkRead::Closed
            }
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(BridgeError::Can("socket closed".to_string()));
        };

        let (bytes, len) = encode_payload(payload, self.limit);
        let frame = CanFrame::new(StandardId::ZERO, &bytes[..len])
            .ok_or_else(|| BridgeError::Can("payload does not fit a frame".to_string()))?;

        socket
            .write_frame(frame)
            .await
            .map_err(|e| BridgeError::Can(format!("write failed: {e}")))?;

        tracing::debug!(interface = %self.interface, len, "CAN frame sent");
        Ok(())
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            tracing::info!(interface = %self.interface, "CAN socket closed");
        }
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn label(&self) -> &'static str {
        "can"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_name() {
        assert_eq!(interface_name(0), "can0");
        assert_eq!(interface_name(2), "can2");
    }

    #[tokio::test]
    async fn test_open_unknown_interface_fails() {
        // No host in the test fleet has a can99 interface.
        let err = match CanTransport::open(99, PayloadLimit::Bus) {
            Ok(_) => panic!("open should fail without can99"),
            Err(e) => e,
        };
        assert!(matches!(err, BridgeError::Can(_)));
    }
}
