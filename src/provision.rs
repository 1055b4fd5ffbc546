//! CAN interface provisioning.
//!
//! Bring-up and teardown of the `can<N>` network interface through the OS
//! configuration tools (`ifconfig`, `modprobe`, `canconfig`), kept behind a
//! narrow trait so the relay loop and its tests never touch process
//! spawning.

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::error::{BridgeError, Result};
use crate::transport::can::interface_name;

/// Kernel module loaded for the CAN controller.
const CAN_MODULE: &str = "flexcan";

// ============================================================================
// Interface state
// ============================================================================

/// State of the provisioned interface.
///
/// Flags are set in bring-up order and cleared in reverse; the interface is
/// never marked up while the controller module is not marked loaded.
#[derive(Debug)]
pub struct CanInterface {
    name: String,
    bitrate: u32,
    module_loaded: bool,
    interface_up: bool,
}

impl CanInterface {
    /// Describe an interface prior to provisioning. Both flags start clear.
    pub fn new(index: u8, bitrate: u32) -> Self {
        Self {
            name: interface_name(index),
            bitrate,
            module_loaded: false,
            interface_up: false,
        }
    }

    /// Interface name (`can0`, `can1`, ...).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured bitrate in bits per second.
    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Whether the link has been brought up.
    pub fn is_up(&self) -> bool {
        self.interface_up
    }
}

// ============================================================================
// Provisioners
// ============================================================================

/// Interface provisioning operations, substitutable in tests.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Bring the interface up: link down (best effort), load the controller
    /// module, configure the bitrate, link up. Any failure after the
    /// initial down is fatal to startup.
    async fn bring_up(&self, iface: &mut CanInterface) -> Result<()>;

    /// Tear the interface down, clearing flags in reverse order of setting.
    /// The controller module stays loaded.
    async fn tear_down(&self, iface: &mut CanInterface) -> Result<()>;
}

fn link_down_cmd(name: &str) -> String {
    format!("ifconfig {name} down")
}

fn modprobe_cmd() -> String {
    format!("modprobe {CAN_MODULE}")
}

fn bitrate_cmd(name: &str, bitrate: u32) -> String {
    format!("canconfig {name} bitrate {bitrate}")
}

fn link_up_cmd(name: &str) -> String {
    format!("ifconfig {name} up")
}

/// Provisioner that shells out to the OS configuration tools, as the
/// deployment targets expect.
#[derive(Debug, Default)]
pub struct ShellProvisioner;

impl ShellProvisioner {
    pub fn new() -> Self {
        Self
    }

    /// Run one configuration command, logging its combined output. A
    /// non-zero exit status is a failure.
    async fn run(cmd_line: &str) -> Result<()> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd_line)
            .output()
            .await
            .map_err(|e| BridgeError::Provision(format!("`{cmd_line}`: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            if !line.trim().is_empty() {
                tracing::debug!(cmd = cmd_line, "{}", line.trim_end());
            }
        }

        if !output.status.success() {
            return Err(BridgeError::Provision(format!(
                "`{cmd_line}` exited with {}",
                output.status
            )));
        }

        tracing::info!("cmd run: {cmd_line}");
        Ok(())
    }
}

#[async_trait]
impl Provisioner for ShellProvisioner {
    async fn bring_up(&self, iface: &mut CanInterface) -> Result<()> {
        // The link is normally not up yet; a failed pre-down is expected.
        if let Err(e) = Self::run(&link_down_cmd(iface.name())).await {
            tracing::debug!(error = %e, "pre-provision link down skipped");
        }

        Self::run(&modprobe_cmd()).await?;
        Self::run(&bitrate_cmd(iface.name(), iface.bitrate())).await?;
        iface.module_loaded = true;

        Self::run(&link_up_cmd(iface.name())).await?;
        iface.interface_up = true;

        tracing::info!(interface = iface.name(), bitrate = iface.bitrate(), "interface up");
        Ok(())
    }

    async fn tear_down(&self, iface: &mut CanInterface) -> Result<()> {
        let mut status = Ok(());

        if iface.interface_up {
            iface.interface_up = false;
            if let Err(e) = Self::run(&link_down_cmd(iface.name())).await {
                status = Err(e);
            }
        }

        if iface.module_loaded {
            // The module stays loaded for the next session.
            iface.module_loaded = false;
        }

        status
    }
}

/// Provisioner that records transitions without touching the system.
///
/// Used when the interface is managed externally, for example a `vcan`
/// device set up by hand or an init script that owns the link.
#[derive(Debug, Default)]
pub struct NoopProvisioner;

#[async_trait]
impl Provisioner for NoopProvisioner {
    async fn bring_up(&self, iface: &mut CanInterface) -> Result<()> {
        iface.module_loaded = true;
        iface.interface_up = true;
        Ok(())
    }

    async fn tear_down(&self, iface: &mut CanInterface) -> Result<()> {
        iface.interface_up = false;
        iface.module_loaded = false;
        Ok(())
    }
}
