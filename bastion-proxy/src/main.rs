//! Bastion Proxy Engine
//!
//! The Tokio engine that binds the listener, runs the background health prober
//! and maintenance sweep, and drives one connection worker per client.

#![deny(missing_docs)]

mod config;
mod error;
mod forward;
mod handler;
mod health_check;
mod maintenance;
mod response;
mod server;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bastion_admin::SnapshotSource;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::state::ProxyState;

/// Weighted L4/L7 load balancer with rate limiting and response caching.
#[derive(Debug, Parser)]
#[command(name = "bastion", version, about)]
struct Args {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the proxy listen address.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Serve the admin endpoints on this address.
    #[arg(long)]
    admin_listen: Option<SocketAddr>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

/// The primary entrypoint for the Bastion load balancer.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = config::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(admin) = args.admin_listen {
        config.admin_listen = Some(admin);
    }

    let state = Arc::new(ProxyState::from_config(&config).context("building proxy state")?);
    if args.check {
        tracing::info!(backends = config.backends.len(), "configuration is valid");
        return Ok(());
    }

    let weights: Vec<u32> = config.backends.iter().map(|b| b.weight).collect();
    tracing::info!(
        listen = %config.listen,
        ?weights,
        rate_limit = %format!(
            "{}/{}s ban {}s",
            config.rate_limit.max_requests, config.rate_limit.window_secs, config.rate_limit.ban_secs
        ),
        cache_ttl_secs = config.cache.ttl_secs,
        "starting Bastion load balancer"
    );

    let health = health_check::prober::spawn_health_checker(
        Arc::clone(&state.pool),
        config.health.clone(),
    );
    let sweeper = maintenance::spawn_maintenance(Arc::clone(&state));

    let admin = match config.admin_listen {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding admin listener on {addr}"))?;
            let source: Arc<dyn SnapshotSource> = state.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = bastion_admin::server::start_admin_server(listener, source).await {
                    tracing::error!(error = %e, "admin listener stopped");
                }
            }))
        }
        None => None,
    };

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding proxy listener on {}", config.listen))?;
    server::start_server(listener, Arc::clone(&state), shutdown_signal()).await?;

    health.abort();
    sweeper.abort();
    if let Some(admin) = admin {
        admin.abort();
    }

    tracing::info!("shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
