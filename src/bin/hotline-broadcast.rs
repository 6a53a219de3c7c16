//! Broadcast channel process.
//!
//! Opens one channel on the relay and serves group subscriptions and
//! fan-out until SIGINT, SIGTERM or SIGHUP, or until the relay goes away.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hotline::channel::{self, Endpoint, StopReason};
use hotline::{logging, BroadcastEngine, ServiceConfig};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Global flag for signal-triggered shutdown (as Arc for signal-hook compatibility)
static SHUTDOWN_FLAG: std::sync::LazyLock<Arc<AtomicBool>> =
    std::sync::LazyLock::new(|| Arc::new(AtomicBool::new(false)));

#[derive(Parser, Debug)]
#[command(name = "hotline-broadcast")]
#[command(version)]
#[command(about = "Group broadcast channel service for the hotline relay")]
struct Cli {
    /// Relay address: a Unix socket path (`unix:/path` or any path) or `host:port`
    endpoint: Endpoint,

    /// Name of the channel to open
    channel: String,

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

    let mut engine = BroadcastEngine::new();
    channel::connect_and_run(
        &cli.endpoint,
        &cli.channel,
        &mut engine,
        &SHUTDOWN_FLAG,
        config.poll_interval(),
    )
    .context("broadcast service failed")
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
    if let Err(e) = logging::init(&config.log, "hotline-broadcast") {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    log::info!("[broadcast] starting v{} on channel {}", env!("CARGO_PKG_VERSION"), cli.channel);
    match run(&cli, &config) {
        Ok(StopReason::Shutdown) => ExitCode::SUCCESS,
        Ok(reason) => {
            log::error!("[broadcast] stopped: {reason:?}");
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("[broadcast] {e:#}");
            ExitCode::FAILURE
        }
    }
}
