//! # Gatehouse - admin login guard
//!
//! Headless backend for the admin login page: a drag-to-target human
//! verification challenge and an attempt-counting lockout gate in front
//! of the admin credential check.
//!
//! ## Architecture
//! ```text
//! Browser ──pointer events──► Gatehouse ──► VerificationWidget
//!         ──credentials─────►     │     ──► AttemptGate ──► Authenticator
//!                                 ↓
//!                          Redis (optional: accounts, attempt records)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod auth;
mod captcha;
mod config;
mod gate;
mod routes;
mod session;
mod state;

use config::AppConfig;
use session::session_sweeper;
use state::AppState;

/// Gatehouse - drag verification and admin login lockout service
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/gatehouse.toml")]
    config: String,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,

    /// Print the Argon2 PHC string for a password (for `[auth.admins]`) and exit
    #[arg(long, value_name = "PASSWORD")]
    hash_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before clap reads env fallbacks
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let args = Args::parse();

    if let Some(ref password) = args.hash_password {
        println!("{}", auth::hash_password(password)?);
        return Ok(());
    }

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Gatehouse v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!(
        path = %args.config,
        max_attempts = config.lockout.max_attempts,
        lockout_ms = config.lockout.lockout_duration_ms,
        persistence = ?config.lockout.persistence,
        auth_backend = ?config.auth.backend,
        "Configuration loaded"
    );

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Initialize application state
    let state = AppState::new(config.clone()).await?;

    // Spawn idle-session sweeper
    let sweeper_sessions = state.sessions.clone();
    let sweeper_shutdown = shutdown_tx.subscribe();
    let sweep_interval = Duration::from_secs(config.sessions.sweep_interval_secs);
    tokio::spawn(async move {
        session_sweeper(sweeper_sessions, sweep_interval, sweeper_shutdown).await;
    });

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Gatehouse listening on {}", config.listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Gatehouse shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
