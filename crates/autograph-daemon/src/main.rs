//! autograph-daemon - Autograph signing service binary.
//!
//! Runs the service loops on a current-thread runtime: the card presence
//! poll and the document integrity re-verification are independent
//! fixed-interval timers in a single control flow, suspending only at
//! I/O boundaries. SIGINT/SIGTERM trigger a clean middleware
//! finalization before exit.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use autograph_core::config::AutographConfig;
use autograph_core::token::TokenMiddleware;
use autograph_daemon::dispatch::Daemon;
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Autograph signing service.
#[derive(Parser, Debug)]
#[command(name = "autograph-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "autograph.toml")]
    config: PathBuf,

    /// Open this document on startup.
    #[arg(long)]
    document: Option<PathBuf>,

    /// Log filter, overriding `RUST_LOG`.
    #[arg(long)]
    log_filter: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_filter.as_deref());

    let config = load_config(&args.config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    runtime.block_on(run(&config, args.document))
}

fn init_tracing(filter: Option<&str>) {
    let filter = filter.map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        EnvFilter::new,
    );
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: &std::path::Path) -> Result<AutographConfig> {
    if path.exists() {
        AutographConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))
    } else {
        info!(path = %path.display(), "no config file, using defaults");
        Ok(AutographConfig::default())
    }
}

#[cfg(feature = "pkcs11")]
fn build_middleware(config: &AutographConfig) -> Box<dyn TokenMiddleware> {
    use autograph_core::token::pkcs11::CryptokiMiddleware;

    Box::new(CryptokiMiddleware::new(
        config.middleware.library_path.clone(),
    ))
}

#[cfg(not(feature = "pkcs11"))]
fn build_middleware(_config: &AutographConfig) -> Box<dyn TokenMiddleware> {
    use autograph_core::token::memory::MemoryMiddleware;

    warn!("built without the pkcs11 feature; card operations use the in-memory middleware");
    Box::new(MemoryMiddleware::new())
}

async fn run(config: &AutographConfig, document: Option<PathBuf>) -> Result<()> {
    let middleware = build_middleware(config);
    let mut daemon = Daemon::new(config, middleware);

    let init = daemon.initialize_card();
    if init.success {
        info!(connected = init.connected, "card middleware initialized");
    } else {
        // Not fatal: the poll loop re-attempts initialization, so plugging
        // in a reader after startup recovers on its own.
        warn!(error = init.error.as_deref().unwrap_or("unknown"), "card middleware unavailable");
    }

    if let Some(path) = document {
        let fingerprint = daemon
            .open_document(&path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        info!(path = %path.display(), %fingerprint, "document opened");
    }

    let mut card_ticks =
        tokio::time::interval(Duration::from_secs(config.polling.card_poll_secs));
    card_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut verify_ticks =
        tokio::time::interval(Duration::from_secs(config.polling.integrity_verify_secs));
    verify_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    loop {
        tokio::select! {
            _ = card_ticks.tick() => {
                daemon.poll_card();
            }
            _ = verify_ticks.tick() => {
                if daemon.document_open() {
                    daemon.verify_document().await;
                }
            }
            _ = sigint.recv() => {
                info!("interrupt received, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("termination requested, shutting down");
                break;
            }
        }
    }

    daemon.cleanup_card();
    Ok(())
}
