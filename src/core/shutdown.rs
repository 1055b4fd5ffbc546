//! Cooperative shutdown signalling.
//!
//! A single-writer flag shared between the signal listener and the relay
//! loop. Triggering wakes any pending readiness wait, so a signal delivered
//! while the loop is parked stops the session within one iteration instead
//! of waiting for the next frame.

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::error::Result;

/// Write half of the shutdown flag. Held by the signal listener.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Read half of the shutdown flag. Cloneable; held by the relay loop.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/token pair, initially untriggered.
pub fn shutdown_pair() -> (ShutdownHandle, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownToken { rx })
}

impl ShutdownHandle {
    /// Request shutdown. Every token observes the trigger.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownToken {
    /// Check the flag without waiting.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested.
    ///
    /// Also resolves if the handle is dropped without triggering, so a lost
    /// writer can never leave the loop unstoppable.
    pub async fn triggered(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Spawn the signal listener: SIGINT or SIGTERM triggers the handle.
///
/// Registration failure is reported to the caller; a relay that cannot be
/// stopped must not start.
pub fn install_signal_listener(handle: ShutdownHandle) -> Result<JoinHandle<()>> {
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;

    let task = tokio::spawn(async move {
        tokio::select! {
            _ = term.recv() => tracing::info!("received SIGTERM, stopping"),
            _ = int.recv() => tracing::info!("received SIGINT, stopping"),
        }
        handle.trigger();
    });

    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_is_observed() {
        let (handle, token) = shutdown_pair();
        assert!(!token.is_triggered());

        handle.trigger();
        assert!(token.is_triggered());

        let cloned = token.clone();
        assert!(cloned.is_triggered());
    }

    #[tokio::test]
    async fn test_trigger_wakes_pending_waiter() {
        let (handle, mut token) = shutdown_pair();

        let waiter = tokio::spawn(async move {
            token.triggered().await;
            token
        });

        handle.trigger();

        let token = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter should not panic");
        assert!(token.is_triggered());
    }

    #[tokio::test]
    async fn test_dropped_handle_releases_waiters() {
        let (handle, mut token) = shutdown_pair();
        drop(handle);

        tokio::time::timeout(Duration::from_secs(1), token.triggered())
            .await
            .expect("wait should resolve once the handle is gone");
    }
}
