//! uamock server binary.
//!
//! # Usage
//!
//! ```bash
//! # Canonical test server (seven simulated variables, three methods)
//! uamock-server
//!
//! # Minimal address space, faster updates
//! uamock-server --profile minimal --update-interval-ms 500
//! ```

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uamock_core::Profile;
use uamock_server::{
    DEFAULT_ADVERTISED_ENDPOINT, DEFAULT_BIND_ENDPOINT, Server, ServerConfig, SystemEnv,
};

/// Mock OPC UA test server
#[derive(Parser, Debug)]
#[command(name = "uamock-server")]
#[command(about = "Mock OPC UA server with simulated variables and test methods")]
#[command(version)]
struct Args {
    /// Endpoint to bind to
    #[arg(short, long, default_value = DEFAULT_BIND_ENDPOINT)]
    bind: String,

    /// Endpoint advertised to clients
    #[arg(short, long, default_value = DEFAULT_ADVERTISED_ENDPOINT)]
    advertise: String,

    /// Address-space layout (full, minimal)
    #[arg(short, long, default_value = "full")]
    profile: Profile,

    /// Milliseconds between simulator cycles
    #[arg(long, default_value = "2000")]
    update_interval_ms: u64,

    /// Upper bound on shutdown in milliseconds
    #[arg(long, default_value = "5000")]
    shutdown_timeout_ms: u64,

    /// Server name
    #[arg(long)]
    server_name: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("uamock server starting");

    let defaults = ServerConfig::default();
    let config = ServerConfig {
        bind_endpoint: args.bind,
        advertised_endpoint: args.advertise,
        server_name: args.server_name.unwrap_or(defaults.server_name.clone()),
        profile: args.profile,
        update_interval: Duration::from_millis(args.update_interval_ms),
        shutdown_timeout: Duration::from_millis(args.shutdown_timeout_ms),
        ..defaults
    };

    let server = Server::new(SystemEnv::new(), config);
    if let Some(report) = server.run_until(shutdown_signal()).await? {
        tracing::info!(
            "Shutdown complete: tick {}, simulator aborted: {}, calls drained: {}",
            report.final_tick,
            report.simulator_aborted,
            report.drained
        );
    }

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
