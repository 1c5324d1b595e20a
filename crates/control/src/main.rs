//! Atrium - control plane entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use atrium_config::Config;
use atrium_control::domain::DomainHealthChecker;
use atrium_control::session::SessionSweeper;
use atrium_control::{api, app};

/// Atrium - multi-tenant SaaS control plane
#[derive(Parser, Debug)]
#[command(name = "atrium")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config", env = "ATRIUM_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose")]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration file and exit
    TestConfig {
        /// Configuration file to test
        #[arg(short = 'c', long = "config")]
        config: Option<String>,
    },
    /// Run the control plane (default)
    Run {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).context("Failed to load configuration file"),
        None => {
            info!("No configuration file given, using embedded defaults");
            Config::default_embedded().context("Failed to load embedded configuration")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::TestConfig { config }) => {
            test_config(config.as_deref().or(cli.config.as_deref()))
        }
        Some(Commands::Run { config }) => run_server(config.or(cli.config)).await,
        None => run_server(cli.config).await,
    }
}

/// Validate the configuration and exit.
fn test_config(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    config
        .ensure_valid()
        .context("Configuration validation failed")?;

    info!("Configuration test successful:");
    info!("  - listen {}", config.server.listen);
    info!("  - cache backend {:?}", config.cache.backend);
    info!("  - store backend {:?}", config.store.backend);
    info!("  - issuer {:?}", config.issuer.kind);
    info!(
        "  - ssl {} / wildcard {}",
        config.domains.allow_ssl, config.domains.allow_wildcard
    );
    Ok(())
}

/// Run the control plane until a shutdown signal arrives.
async fn run_server(config_path: Option<String>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    config
        .ensure_valid()
        .context("Configuration validation failed")?;

    let state = app::build_state(&config).await?;

    // Background tasks are owned here and cancelled together
    let shutdown = CancellationToken::new();

    let sweeper = SessionSweeper::new(
        Arc::clone(&state.sessions),
        Duration::from_secs(config.sessions.cleanup_interval_secs),
        shutdown.clone(),
    );
    let sweeper_handle = tokio::spawn(sweeper.run());

    let health_checker = DomainHealthChecker::new(
        Arc::clone(&state.store),
        Arc::clone(&state.resolver),
        Arc::clone(&state.metrics),
        config.domains.verification_prefix.clone(),
        Duration::from_secs(config.domains.health_check_interval_secs),
        shutdown.clone(),
    );
    let health_handle = tokio::spawn(health_checker.run());

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        });
    }

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;
    info!(listen = %config.server.listen, "Admin API listening");

    let router = api::router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("Admin API server failed")?;

    // Give background tasks the configured grace period to finish
    let drain = async {
        if let Err(e) = sweeper_handle.await {
            warn!(error = %e, "Session sweeper did not exit cleanly");
        }
        if let Err(e) = health_handle.await {
            warn!(error = %e, "Domain health checker did not exit cleanly");
        }
    };
    if tokio::time::timeout(
        Duration::from_secs(config.server.shutdown_timeout_secs.max(1)),
        drain,
    )
    .await
    .is_err()
    {
        error!("Background tasks did not stop within the shutdown timeout");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolve on SIGTERM or ctrl-c.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
