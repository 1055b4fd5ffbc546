//! canbridge daemon entry point.
//!
//! Parses the command line, layers it over an optional config file, wires
//! up logging, then hands control to the relay. Startup failures exit
//! non-zero; a completed session exits zero whatever closed it.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use canbridge::config::BridgeConfig;
use canbridge::core::error::Result;
use canbridge::provision::{NoopProvisioner, Provisioner, ShellProvisioner};
use canbridge::relay::Relay;
use canbridge::transport::can::interface_name;

/// CAN bus to TCP viewer relay daemon
#[derive(Parser, Debug)]
#[command(name = "canbridge", version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// CAN bus index; the interface is can<N>
    #[arg(short = 'c', long = "can-port", value_name = "N")]
    can_port: Option<u8>,

    /// CAN bus bitrate in bits per second
    #[arg(short = 'b', long, value_name = "BPS")]
    baudrate: Option<u32>,

    /// TCP port of the viewer on the local host
    #[arg(short = 'p', long = "tcp-port", value_name = "PORT")]
    tcp_port: Option<u16>,

    /// Append logs to a file instead of stderr
    #[arg(short = 'o', long = "log-file", value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Skip interface provisioning (interface managed externally)
    #[arg(long)]
    no_provision: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Merge file configuration and command-line overrides, overrides last.
    fn resolve_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::from_file(path)?,
            None => BridgeConfig::default(),
        };

        if let Some(index) = self.can_port {
            config.can.index = index;
        }
        if let Some(bitrate) = self.baudrate {
            config.can.bitrate = bitrate;
        }
        if let Some(port) = self.tcp_port {
            config.tcp.port = port;
        }

        Ok(config)
    }
}

fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default_filter = if args.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    match &args.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .unwrap_or_else(|e| {
                    eprintln!("cannot open log file {}: {e}", path.display());
                    process::exit(1);
                });
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.resolve_config()?;

    tracing::info!(
        interface = %interface_name(config.can.index),
        bitrate = config.can.bitrate,
        tcp_port = config.tcp.port,
        "starting relay"
    );

    let provisioner: Box<dyn Provisioner> = if args.no_provision {
        Box::new(NoopProvisioner)
    } else {
        Box::new(ShellProvisioner::new())
    };

    let relay = Relay::start(&config, provisioner).await?;
    let stats = relay.run().await;
    tracing::info!(%stats, "session complete");

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _log_guard = init_logging(&args);

    if let Err(e) = run(args).await {
        tracing::error!(error = %e, "startup failed");
        process::exit(1);
    }
}
