//! GlowSync Daemon - ambient lighting synchronization for the focused window.
//!
//! This daemon samples the focused window's pixels at a fixed rate, computes
//! a gamma-corrected average color, and pushes it to a WLED-style light
//! controller over HTTP.

mod capture;
mod color;
mod config;
mod error;
mod gamma;
mod gate;
mod logging;
mod publisher;
mod sampler;

use capture::X11Capture;
use config::ConfigManager;
use gamma::GammaCorrector;
use gate::ChangeGate;
use publisher::WledHttpPublisher;
use sampler::SamplingLoop;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Graceful shutdown timeout in seconds.
const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _log_guard = logging::init_logging().map_err(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        e
    })?;

    info!("GlowSync daemon starting...");

    let result = run_daemon().await;

    match &result {
        Ok(()) => info!("GlowSync daemon shut down gracefully"),
        Err(e) => error!("GlowSync daemon error: {}", e),
    }

    result.map_err(Into::into)
}

/// Main daemon entry point.
///
/// Everything that can fail here is fatal: configuration, the display
/// connection, and HTTP client construction. Once the sampling loop is
/// running, all errors are contained within individual ticks.
async fn run_daemon() -> Result<(), error::DaemonError> {
    let config_path = ConfigManager::default_path();
    let first_run = !config_path.exists();
    let config_manager = ConfigManager::load_or_default(&config_path)?;
    if first_run {
        config_manager.save()?;
        info!("Wrote default configuration to {:?}", config_path);
    } else {
        info!("Configuration loaded from {:?}", config_path);
    }
    let config = config_manager.get();

    // The one fatal runtime dependency: without a display connection
    // nothing in the loop can function.
    let windows = X11Capture::connect()?;
    info!("Connected to the X server");

    let publisher = WledHttpPublisher::new(&config.url, config.http_timeout())?;
    info!("Publishing to light controller at {}", publisher.url());

    let corrector = GammaCorrector::from_mode(config.correction, config.gamma);
    let gate = ChangeGate::new(config.change_threshold);
    let mut sampling_loop = SamplingLoop::new(
        windows,
        publisher,
        corrector,
        gate,
        config.scale_factor,
        config.sample_interval(),
    );

    // Create shutdown signal channel.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = setup_signal_handlers(shutdown_tx).await {
            error!("Signal handler error: {}", e);
        }
    });

    // Spawn the sampling task.
    let sampler_rx = shutdown_rx.clone();
    let sampler_handle = tokio::spawn(async move {
        sampling_loop.run(sampler_rx).await;
    });

    info!("GlowSync daemon initialized and running");

    // Wait for shutdown signal.
    let mut shutdown_rx_main = shutdown_rx;
    shutdown_rx_main.changed().await.ok();

    info!("Shutdown signal received, stopping sampler...");

    let shutdown_timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
    let _ = tokio::time::timeout(shutdown_timeout, sampler_handle).await;

    info!("Sampler stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown.
/// Handles SIGTERM and SIGINT.
#[cfg(unix)]
async fn setup_signal_handlers(
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Stub signal handler for non-Unix platforms.
#[cfg(not(unix))]
async fn setup_signal_handlers(
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C");
    let _ = shutdown_tx.send(true);
    Ok(())
}
