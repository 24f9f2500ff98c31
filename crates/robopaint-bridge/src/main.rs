//! # RoboPaint Mode Bridge
//!
//! Entry point: loads configuration, installs logging and runs the draw
//! mode over stdin/stdout until the host closes it.

use robopaint_bridge::run_mode;
use robopaint_config::ConfigLoader;
use robopaint_core::telemetry::{init_logging, LoggingConfig};
use robopaint_mode_runtime::LineTransport;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let loader = match ConfigLoader::from_default_location() {
        Ok(loader) => loader,
        Err(e) => {
            let _ = init_logging(&LoggingConfig::default());
            error!(code = e.error_code(), "Failed to load configuration: {}", e);
            return ExitCode::from(2);
        }
    };
    let config = loader.get().await;

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!("Starting RoboPaint mode bridge...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.environment);
    info!("Mode directory: {}", config.mode.directory.display());

    let outcome = tokio::select! {
        result = run_mode(&config, LineTransport::stdio()) => Some(result),
        () = shutdown_signal() => None,
    };

    match outcome {
        Some(Ok(state)) => {
            info!(%state, "Bridge shutdown complete");
            ExitCode::SUCCESS
        }
        Some(Err(e)) => {
            error!(code = e.error_code(), fatal = e.is_fatal_at_boot(), "Mode bridge failed: {}", e);
            ExitCode::FAILURE
        }
        None => {
            info!("Bridge interrupted");
            ExitCode::SUCCESS
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received terminate signal, shutting down"),
    }
}
