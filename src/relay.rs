//! The relay session: lifecycle state machine and service loop.
//!
//! One task owns both links. Each wakeup services the CAN side before the
//! viewer side, read failures degrade one side while the other keeps
//! running, write failures are logged and swallowed, and a shutdown trigger
//! drains the session within one iteration.

use std::fmt;

use crate::codec::PayloadLimit;
use crate::config::BridgeConfig;
use crate::core::error::Result;
use crate::core::shutdown::{install_signal_listener, shutdown_pair, ShutdownToken};
use crate::provision::{CanInterface, Provisioner};
use crate::transport::can::CanTransport;
use crate::transport::tcp::TcpTransport;
use crate::transport::{LinkRead, RelayLink};

// ============================================================================
// Session state
// ============================================================================

/// Lifecycle of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayState {
    /// Provisioning the interface and opening transports.
    #[default]
    Starting,
    /// Servicing both links.
    Running,
    /// Stop observed; no further reads.
    Draining,
    /// Descriptors closed and the interface released.
    Stopped,
}

impl RelayState {
    /// Whether the session has fully ended.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Messages forwarded CAN to viewer.
    pub to_viewer: u64,
    /// Messages forwarded viewer to CAN.
    pub to_bus: u64,
    /// Empty CAN reads dropped.
    pub empty_frames: u64,
    /// Write failures logged and swallowed, both directions.
    pub write_failures: u64,
}

impl fmt::Display for RelayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "to_viewer={} to_bus={} empty={} write_failures={}",
            self.to_viewer, self.to_bus, self.empty_frames, self.write_failures
        )
    }
}

// ============================================================================
// Relay
// ============================================================================

/// A relay session over two links.
pub struct Relay<C: RelayLink, V: RelayLink> {
    can: C,
    viewer: V,
    shutdown: ShutdownToken,
    state: RelayState,
    stats: RelayStats,
    provision: Option<(CanInterface, Box<dyn Provisioner>)>,
}

impl Relay<CanTransport, TcpTransport> {
    /// Perform the startup sequence: provision the interface, open the CAN
    /// socket, install the signal listener, connect to the viewer.
    ///
    /// On any failure everything brought up so far is torn down again and
    /// the error is returned; the caller exits non-zero. Reads begin only
    /// in [`Relay::run`], so a failed viewer connection never leaves a
    /// half-serviced bus behind.
    pub async fn start(config: &BridgeConfig, provisioner: Box<dyn Provisioner>) -> Result<Self> {
        let mut iface = CanInterface::new(config.can.index, config.can.bitrate);
        provisioner.bring_up(&mut iface).await?;

        let startup: Result<(CanTransport, ShutdownToken, TcpTransport)> = async {
            let can = CanTransport::open(config.can.index, PayloadLimit::Bus)?;

            let (handle, token) = shutdown_pair();
            let _listener = install_signal_listener(handle)?;

            let viewer = TcpTransport::connect(config.tcp.port).await?;
            Ok((can, token, viewer))
        }
        .await;

        match startup {
            Ok((can, token, viewer)) => {
                tracing::info!(interface = can.interface(), "relay ready");
                let mut relay = Self::new(can, viewer, token);
                relay.provision = Some((iface, provisioner));
                Ok(relay)
            }
            Err(e) => {
                if let Err(td) = provisioner.tear_down(&mut iface).await {
                    tracing::warn!(error = %td, "teardown after failed startup");
                }
                Err(e)
            }
        }
    }
}

impl<C: RelayLink, V: RelayLink> Relay<C, V> {
    /// Assemble a relay over already-open links.
    ///
    /// Used by [`Relay::start`] once the real transports are up, and by
    /// callers that wire their own links. No interface teardown happens at
    /// the end of a session built this way.
    pub fn new(can: C, viewer: V, shutdown: ShutdownToken) -> Self {
        Self {
            can,
            viewer,
            shutdown,
            state: RelayState::Starting,
            stats: RelayStats::default(),
            provision: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Drive the session to completion and return the final counters.
    ///
    /// Returns when shutdown is triggered or both links have closed.
    /// Interface teardown failures at the end are logged, not returned; by
    /// then the session is over either way.
    pub async fn run(mut self) -> RelayStats {
        self.state = RelayState::Running;
        tracing::info!("relay running");

        while self.state == RelayState::Running {
            if self.shutdown.is_triggered() {
                tracing::info!("shutdown requested, draining");
                self.state = RelayState::Draining;
                break;
            }

            if !self.can.is_open() && !self.viewer.is_open() {
                tracing::info!("both links closed, draining");
                self.state = RelayState::Draining;
                break;
            }

            let can_open = self.can.is_open();
            let viewer_open = self.viewer.is_open();

            tokio::select! {
                biased;

                _ = self.shutdown.triggered() => {
                    tracing::info!("shutdown requested, draining");
                    self.state = RelayState::Draining;
                }

                read = self.can.recv(), if can_open => {
                    self.service_can(read).await;
                }

                read = self.viewer.recv(), if viewer_open => {
                    self.service_viewer(read).await;
                }
            }
        }

        self.finish().await
    }

    /// One CAN wakeup: forward data to the viewer, drop empty reads, note
    /// a closure and move on.
    async fn service_can(&mut self, read: LinkRead) {
        match read {
            LinkRead::Data(buf) => match self.viewer.send(buf.as_bytes()).await {
                Ok(()) => self.stats.to_viewer += 1,
                Err(e) => {
                    self.stats.write_failures += 1;
                    tracing::error!(link = self.viewer.label(), error = %e, "write failed, message dropped");
                }
            },
            LinkRead::Empty => self.stats.empty_frames += 1,
            LinkRead::Closed => {
                tracing::warn!(link = self.can.label(), "link closed, serving the remaining side");
            }
        }
    }

    /// One viewer wakeup, mirror of the CAN side.
    async fn service_viewer(&mut self, read: LinkRead) {
        match read {
            LinkRead::Data(buf) => match self.can.send(buf.as_bytes()).await {
                Ok(()) => self.stats.to_bus += 1,
                Err(e) => {
                    self.stats.write_failures += 1;
                    tracing::error!(link = self.can.label(), error = %e, "write failed, message dropped");
                }
            },
            LinkRead::Empty => {}
            LinkRead::Closed => {
                tracing::warn!(link = self.viewer.label(), "link closed, serving the remaining side");
            }
        }
    }

    /// Close whatever is still open, release the interface, report.
    async fn finish(mut self) -> RelayStats {
        tracing::info!("cleaning up");

        if self.can.is_open() {
            self.can.close();
        }
        if self.viewer.is_open() {
            self.viewer.close();
        }

        if let Some((mut iface, provisioner)) = self.provision.take() {
            if let Err(e) = provisioner.tear_down(&mut iface).await {
                tracing::warn!(error = %e, "interface teardown failed");
            }
        }

        self.state = RelayState::Stopped;
        tracing::info!(stats = %self.stats, "relay stopped");
        self.stats
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RelayBuffer;
    use crate::core::error::BridgeError;
    use crate::provision::NoopProvisioner;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::timeout;

    fn data(bytes: &[u8]) -> LinkRead {
        let mut buf = RelayBuffer::new();
        buf.copy_from(bytes);
        LinkRead::Data(buf)
    }

    struct LinkState {
        reads: VecDeque<LinkRead>,
        send_results: VecDeque<Result<()>>,
        sent: Vec<Vec<u8>>,
        open: bool,
        recv_polls: usize,
        closes: usize,
    }

    /// Scripted link. Yields the scripted reads in order, then blocks
    /// forever; a scripted closure closes it the way a real transport
    /// closes itself on a failed read.
    #[derive(Clone)]
    struct MockLink {
        state: Arc<Mutex<LinkState>>,
        name: &'static str,
    }

    impl MockLink {
        fn new(name: &'static str, reads: Vec<LinkRead>) -> Self {
            Self {
                state: Arc::new(Mutex::new(LinkState {
                    reads: reads.into(),
                    send_results: VecDeque::new(),
                    sent: Vec::new(),
                    open: true,
                    recv_polls: 0,
                    closes: 0,
                })),
                name,
            }
        }

        fn with_send_results(self, results: Vec<Result<()>>) -> Self {
            self.state.lock().unwrap().send_results = results.into();
            self
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.state.lock().unwrap().sent.clone()
        }

        fn closes(&self) -> usize {
            self.state.lock().unwrap().closes
        }

        fn recv_polls(&self) -> usize {
            self.state.lock().unwrap().recv_polls
        }
    }

    impl RelayLink for MockLink {
        async fn recv(&mut self) -> LinkRead {
            let next = {
                let mut st = self.state.lock().unwrap();
                st.recv_polls += 1;
                let next = st.reads.pop_front();
                if matches!(next, Some(LinkRead::Closed)) && st.open {
                    st.open = false;
                    st.closes += 1;
                }
                next
            };
            match next {
                Some(read) => read,
                None => std::future::pending().await,
            }
        }

        async fn send(&mut self, payload: &[u8]) -> Result<()> {
            let mut st = self.state.lock().unwrap();
            if !st.open {
                return Err(BridgeError::Tcp(format!("{} closed", self.name)));
            }
            match st.send_results.pop_front() {
                Some(Err(e)) => Err(e),
                _ => {
                    st.sent.push(payload.to_vec());
                    Ok(())
                }
            }
        }

        fn close(&mut self) {
            let mut st = self.state.lock().unwrap();
            if st.open {
                st.open = false;
                st.closes += 1;
            }
        }

        fn is_open(&self) -> bool {
            self.state.lock().unwrap().open
        }

        fn label(&self) -> &'static str {
            self.name
        }
    }

    async fn run_to_completion(relay: Relay<MockLink, MockLink>) -> RelayStats {
        timeout(Duration::from_secs(5), relay.run())
            .await
            .expect("relay should finish")
    }

    #[test]
    fn test_relay_state_machine_meta() {
        assert_eq!(RelayState::default(), RelayState::Starting);
        assert!(RelayState::Stopped.is_terminal());
        assert!(!RelayState::Draining.is_terminal());
        assert_eq!(RelayState::Running.to_string(), "running");
    }

    #[tokio::test]
    async fn test_new_relay_starts_idle() {
        let can = MockLink::new("can", vec![]);
        let viewer = MockLink::new("tcp", vec![]);
        let (_handle, token) = shutdown_pair();

        let relay = Relay::new(can, viewer, token);
        assert_eq!(relay.state(), RelayState::Starting);
        assert_eq!(relay.stats(), RelayStats::default());
    }

    #[tokio::test]
    async fn test_forwards_can_data_to_viewer() {
        let can = MockLink::new("can", vec![data(b"ABC"), LinkRead::Closed]);
        let viewer = MockLink::new("tcp", vec![LinkRead::Closed]);
        let (_handle, token) = shutdown_pair();

        let stats = run_to_completion(Relay::new(can.clone(), viewer.clone(), token)).await;

        assert_eq!(viewer.sent(), vec![b"ABC".to_vec()]);
        assert_eq!(stats.to_viewer, 1);
        assert_eq!(stats.to_bus, 0);
        assert_eq!(can.closes(), 1);
        assert_eq!(viewer.closes(), 1);
    }

    #[tokio::test]
    async fn test_forwards_viewer_data_to_bus() {
        let can = MockLink::new("can", vec![]);
        let viewer = MockLink::new("tcp", vec![data(b"hello!!"), LinkRead::Closed]);
        let (handle, token) = shutdown_pair();

        let task = tokio::spawn(Relay::new(can.clone(), viewer.clone(), token).run());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while can.sent().is_empty() {
            assert!(tokio::time::Instant::now() < deadline, "message never forwarded");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        handle.trigger();
        let stats = timeout(Duration::from_secs(5), task)
            .await
            .expect("relay should finish")
            .expect("relay task should not panic");

        assert_eq!(can.sent(), vec![b"hello!!".to_vec()]);
        assert_eq!(stats.to_bus, 1);
        assert_eq!(stats.to_viewer, 0);
        // The viewer closed itself; the CAN link is closed during cleanup.
        assert_eq!(viewer.closes(), 1);
        assert_eq!(can.closes(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_while_parked_closes_both() {
        let can = MockLink::new("can", vec![]);
        let viewer = MockLink::new("tcp", vec![]);
        let (handle, token) = shutdown_pair();

        let task = tokio::spawn(Relay::new(can.clone(), viewer.clone(), token).run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.trigger();

        let stats = timeout(Duration::from_secs(5), task)
            .await
            .expect("relay should finish")
            .expect("relay task should not panic");

        assert_eq!(stats, RelayStats::default());
        assert_eq!(can.closes(), 1);
        assert_eq!(viewer.closes(), 1);
        assert!(can.sent().is_empty());
        assert!(viewer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_pre_triggered_shutdown_relays_nothing() {
        let can = MockLink::new("can", vec![data(b"late")]);
        let viewer = MockLink::new("tcp", vec![]);
        let (handle, token) = shutdown_pair();
        handle.trigger();

        let stats = run_to_completion(Relay::new(can.clone(), viewer.clone(), token)).await;

        assert_eq!(stats, RelayStats::default());
        assert_eq!(can.recv_polls(), 0);
        assert_eq!(viewer.recv_polls(), 0);
        assert!(viewer.sent().is_empty());
        assert_eq!(can.closes(), 1);
        assert_eq!(viewer.closes(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_link_open() {
        let can = MockLink::new("can", vec![data(b"one"), data(b"two"), LinkRead::Closed]);
        let viewer = MockLink::new("tcp", vec![LinkRead::Closed])
            .with_send_results(vec![Err(BridgeError::Tcp("sink full".to_string()))]);
        let (_handle, token) = shutdown_pair();

        let stats = run_to_completion(Relay::new(can.clone(), viewer.clone(), token)).await;

        // The first write failed; the link stayed open and carried the
        // second message.
        assert_eq!(viewer.sent(), vec![b"two".to_vec()]);
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.to_viewer, 1);
    }

    #[tokio::test]
    async fn test_viewer_serviced_after_can_closes() {
        let can = MockLink::new("can", vec![LinkRead::Closed]);
        let viewer = MockLink::new("tcp", vec![data(b"ping"), LinkRead::Closed]);
        let (_handle, token) = shutdown_pair();

        let stats = run_to_completion(Relay::new(can.clone(), viewer.clone(), token)).await;

        // The viewer side kept being read after the CAN side died; its
        // message hit the closed bus and was counted as a failed write.
        assert!(viewer.recv_polls() >= 2);
        assert_eq!(stats.to_bus, 0);
        assert_eq!(stats.write_failures, 1);
        assert_eq!(can.closes(), 1);
        assert_eq!(viewer.closes(), 1);
    }

    #[tokio::test]
    async fn test_empty_frames_are_dropped() {
        let can = MockLink::new(
            "can",
            vec![LinkRead::Empty, LinkRead::Empty, data(b"real"), LinkRead::Closed],
        );
        let viewer = MockLink::new("tcp", vec![LinkRead::Closed]);
        let (_handle, token) = shutdown_pair();

        let stats = run_to_completion(Relay::new(can.clone(), viewer.clone(), token)).await;

        assert_eq!(stats.empty_frames, 2);
        assert_eq!(stats.to_viewer, 1);
        assert_eq!(viewer.sent(), vec![b"real".to_vec()]);
    }

    #[tokio::test]
    async fn test_both_closed_ends_session() {
        let can = MockLink::new("can", vec![LinkRead::Closed]);
        let viewer = MockLink::new("tcp", vec![LinkRead::Closed]);
        let (_handle, token) = shutdown_pair();

        let stats = run_to_completion(Relay::new(can.clone(), viewer.clone(), token)).await;

        assert_eq!(stats, RelayStats::default());
        assert_eq!(can.closes(), 1);
        assert_eq!(viewer.closes(), 1);
    }

    struct RecordingProvisioner {
        ups: Arc<AtomicUsize>,
        downs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Provisioner for RecordingProvisioner {
        async fn bring_up(&self, iface: &mut CanInterface) -> Result<()> {
            self.ups.fetch_add(1, Ordering::SeqCst);
            NoopProvisioner.bring_up(iface).await
        }

        async fn tear_down(&self, iface: &mut CanInterface) -> Result<()> {
            self.downs.fetch_add(1, Ordering::SeqCst);
            NoopProvisioner.tear_down(iface).await
        }
    }

    #[tokio::test]
    async fn test_failed_startup_tears_interface_down() {
        let ups = Arc::new(AtomicUsize::new(0));
        let downs = Arc::new(AtomicUsize::new(0));
        let provisioner = RecordingProvisioner {
            ups: ups.clone(),
            downs: downs.clone(),
        };

        // can99 does not exist, so the CAN open fails after provisioning.
        let mut config = BridgeConfig::default();
        config.can.index = 99;

        let err = match Relay::start(&config, Box::new(provisioner)).await {
            Ok(_) => panic!("start should fail without can99"),
            Err(e) => e,
        };
        assert!(matches!(err, BridgeError::Can(_)));
        assert_eq!(ups.load(Ordering::SeqCst), 1);
        assert_eq!(downs.load(Ordering::SeqCst), 1);
    }
}
