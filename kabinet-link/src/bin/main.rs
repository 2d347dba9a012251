//! kabinet-link server
//!
//! # Usage
//!
//! ```bash
//! # XDG config lookup (~/.config/kabinet-link/kabinet-link/config.toml, ./config.toml)
//! kabinet-link
//!
//! # Explicit config file
//! kabinet-link --config ./kabinet.toml
//! ```

use anyhow::{Context, Result};
use axum::Extension;
use clap::Parser;
use kabinet_link::prelude::*;
use kabinet_link::{handlers, observability};

const SERVICE_NAME: &str = "kabinet-link";

#[derive(Parser)]
#[command(name = "kabinet-link")]
#[command(version)]
#[command(about = "Link users to a Kabinet account over OAuth2", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the XDG lookup)
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging depends on the config, so load errors go to stderr via anyhow
    let config = match &cli.config {
        Some(path) => LinkConfig::load_from(path),
        None => LinkConfig::load_for_service(SERVICE_NAME),
    }
    .context("failed to load configuration")?;

    observability::init(&config.logging)?;

    let host = config.service.host.clone();
    let port = config.listen_port();
    let home_url = config.home_url.clone();
    let session = config.session.clone();

    let state = AppState::from_config(config).context("invalid configuration")?;
    let mut app = handlers::router(state);

    // Stand-in for the host application's session middleware
    if session.enabled {
        tracing::warn!(
            user_id = session.user_id,
            "Stub session enabled: every request is signed in as the configured user"
        );
        app = app.layer(Extension(UserPrincipal::new(session.user_id, session.user_name)));
    }

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;

    tracing::info!(address = %listener.local_addr()?, %home_url, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
