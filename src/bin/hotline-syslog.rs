//! Syslog relay channel process.
//!
//! Binds a Unix datagram socket and forwards every log line it receives to
//! the clients subscribed to the channel.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hotline::channel::{self, Endpoint, StopReason};
use hotline::{logging, ServiceConfig, SyslogRelay};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Global flag for signal-triggered shutdown (as Arc for signal-hook compatibility)
static SHUTDOWN_FLAG: std::sync::LazyLock<Arc<AtomicBool>> =
    std::sync::LazyLock::new(|| Arc::new(AtomicBool::new(false)));

#[derive(Parser, Debug)]
#[command(name = "hotline-syslog")]
#[command(version)]
#[command(about = "Syslog relay channel service for the hotline relay")]
struct Cli {
    /// Relay address: a Unix socket path (`unix:/path` or any path) or `host:port`
    endpoint: Endpoint,

    /// Name of the channel to open
    channel: String,

    /// Datagram socket to receive log lines on
    socket_path: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn run(cli: &Cli, config: &ServiceConfig) -> Result<StopReason> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::flag;
    flag::register(SIGINT, Arc::clone(&SHUTDOWN_FLAG))?;
    flag::register(SIGTERM, Arc::clone(&SHUTDOWN_FLAG))?;
    flag::register(SIGHUP, Arc::clone(&SHUTDOWN_FLAG))?;

    let mut relay = SyslogRelay::bind(&cli.socket_path)?;
    channel::connect_and_run(
        &cli.endpoint,
        &cli.channel,
        &mut relay,
        &SHUTDOWN_FLAG,
        config.poll_interval(),
    )
    .context("syslog service failed")
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ServiceConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(&config.log, "hotline-syslog") {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    log::info!(
        "[syslog] starting v{} on channel {} ({})",
        env!("CARGO_PKG_VERSION"),
        cli.channel,
        cli.socket_path.display()
    );
    match run(&cli, &config) {
        Ok(StopReason::Shutdown) => ExitCode::SUCCESS,
        Ok(reason) => {
            log::error!("[syslog] stopped: {reason:?}");
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("[syslog] {e:#}");
            ExitCode::FAILURE
        }
    }
}
