//! Transport endpoints and the seam between them and the relay loop.
//!
//! Both sides of the relay implement [`RelayLink`]; the loop is written
//! against the trait so its tests can substitute scripted links for real
//! sockets.

pub mod can;
pub mod tcp;

use std::future::Future;

use crate::codec::RelayBuffer;
use crate::core::error::Result;

/// Outcome of one transport read.
///
/// Read errors do not cross this boundary. A failed read closes the link on
/// the spot and reports [`LinkRead::Closed`]; the relay loop decides what a
/// closure means for the session.
#[derive(Debug, Clone)]
pub enum LinkRead {
    /// One message, translated into a relay buffer.
    Data(RelayBuffer),
    /// A successful read with nothing to forward.
    Empty,
    /// The link is no longer readable and its descriptor has been closed.
    Closed,
}

/// One side of the relay: a channel that produces and accepts messages.
pub trait RelayLink: Send {
    /// Await one read. Implementations must report [`LinkRead::Closed`]
    /// without blocking when the link is already closed; the loop only
    /// polls links it still considers open.
    fn recv(&mut self) -> impl Future<Output = LinkRead> + Send;

    /// Write one message. Failures are returned to the caller; the relay
    /// loop logs and swallows them without closing the link.
    fn send(&mut self, payload: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Release the underlying descriptor. Idempotent.
    fn close(&mut self);

    /// Whether the link is still part of the serviced set.
    fn is_open(&self) -> bool;

    /// Short name for log lines.
    fn label(&self) -> &'static str;
}
