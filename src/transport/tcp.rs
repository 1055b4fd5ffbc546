//! TCP endpoint for the viewer connection.
//!
//! One outbound stream to the viewer process on the local host. The wire
//! carries no framing: whatever one receive call returns is one message,
//! and outgoing messages end at the first zero byte per the codec rules.

use std::net::{Ipv4Addr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::codec::{message_len, RelayBuffer};
use crate::core::error::{BridgeError, Result};
use crate::transport::{LinkRead, RelayLink};

/// The viewer side of the relay.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Connect to the viewer on the local host.
    ///
    /// Connection failure is unrecoverable for the session and is reported
    /// to the caller, which exits.
    pub async fn connect(port: u16) -> Result<Self> {
        let peer = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let stream = TcpStream::connect(peer)
            .await
            .map_err(|e| BridgeError::Connection(format!("viewer connect to {peer} failed: {e}")))?;

        tracing::info!(peer = %peer, "connected to viewer");

        Ok(Self {
            stream: Some(stream),
            peer,
        })
    }
}

impl RelayLink for TcpTransport {
    async fn recv(&mut self) -> LinkRead {
        let Some(stream) = self.stream.as_mut() else {
            return LinkRead::Closed;
        };

        let mut chunk = [0u8; RelayBuffer::CAPACITY];
        match stream.read(&mut chunk).await {
            Ok(0) => {
                tracing::info!(peer = %self.peer, "viewer closed the connection");
                self.close();
                LinkRead::Closed
            }
            Ok(n) => {
                let mut buf = RelayBuffer::new();
                buf.copy_from(&chunk[..n]);
                tracing::debug!(peer = %self.peer, len = n, "viewer message received");
                LinkRead::Data(buf)
            }
            Err(e) => {
                tracing::warn!(peer = %self.peer, error = %e, "viewer read failed, closing");
                self.close();
                LinkRead::Closed
            }
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(BridgeError::Tcp("stream closed".to_string()));
        };

        // Viewer messages are zero-terminated; an embedded zero ends the
        // message early.
        let len = message_len(payload);
        stream
            .write_all(&payload[..len])
            .await
            .map_err(|e| BridgeError::Tcp(format!("write failed: {e}")))?;

        tracing::debug!(peer = %self.peer, len, "forwarded to viewer");
        Ok(())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!(peer = %self.peer, "viewer socket closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn label(&self) -> &'static str {
        "tcp"
    }
}
