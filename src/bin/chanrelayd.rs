//! chanrelay daemon - multi-user channel chat relay
//!
//! Accepts TCP clients, registers them by username, and relays chat lines
//! between clients that share a channel.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:6667)
//! chanrelayd
//!
//! # Use a specific config file and override the port
//! chanrelayd --config ./chanrelayd.toml --listen 127.0.0.1:7000
//!
//! # Accept 32-byte NUL-padded usernames from legacy clients
//! chanrelayd --legacy-username-frame
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chanrelay_protocol::UsernameFraming;
use chanrelayd::config::ServerConfig;
use chanrelayd::registry::spawn_registry;
use chanrelayd::server::RelayServer;

/// chanrelay daemon - channel chat relay server
#[derive(Parser, Debug)]
#[command(name = "chanrelayd", version, about)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/chanrelay/chanrelayd.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Maximum number of connected users, overriding the config file
    #[arg(short, long)]
    max_clients: Option<usize>,

    /// Expect the username as a fixed 32-byte NUL-padded frame
    #[arg(long)]
    legacy_username_frame: bool,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chanrelay").join("chanrelayd.toml"))
}

/// Resolves the effective configuration: file first, then CLI overrides.
fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match default_config_path().filter(|path| path.exists()) {
            Some(path) => ServerConfig::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        },
    };

    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(max_clients) = args.max_clients {
        config.max_clients = max_clients;
    }
    if args.legacy_username_frame {
        config.username_framing = UsernameFraming::Fixed;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chanrelayd=info".parse()?)
                .add_directive("chanrelay_core=info".parse()?)
                .add_directive("chanrelay_protocol=info".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "chanrelay daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry(config.max_clients);
    info!(capacity = config.max_clients, "Client registry started");

    let server = RelayServer::bind(config, registry, cancel_token).await?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("chanrelay daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
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
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
