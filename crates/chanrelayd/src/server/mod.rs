//! TCP acceptor for the relay server.
//!
//! The server:
//! - Listens on a TCP address for client connections
//! - Turns connections away while the registry is full
//! - Spawns a ConnectionHandler for each admitted client
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ broadcast
//!         ▼
//! ┌─────────────────┐
//! │ Channel members │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, ServerConfig};
use crate::registry::RegistryHandle;
use crate::transport::SessionWriter;

/// TCP server for the relay.
///
/// Accepts connections and hands each one to its own handler task.
pub struct RelayServer {
    /// Bound listener
    listener: TcpListener,

    /// Settings the server was started with
    config: ServerConfig,

    /// Handle to the client registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for log correlation
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Validates `config` and binds the listening socket.
    ///
    /// The registry must have been spawned with `config.max_clients` slots.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `registry` - Handle to the client registry
    /// * `cancel_token` - Token for graceful shutdown
    pub async fn bind(
        config: ServerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        if registry.capacity() != config.max_clients {
            return Err(ConfigError::Invalid(format!(
                "registry capacity {} does not match max_clients {}",
                registry.capacity(),
                config.max_clients
            ))
            .into());
        }

        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.listen,
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            config,
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the address the listener is bound to.
    ///
    /// Differs from the configured address when port 0 was requested.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(|e| ServerError::Bind {
            addr: self.config.listen,
            error: e.to_string(),
        })
    }

    /// Runs the accept loop.
    ///
    /// Listens for connections until the cancellation token is triggered.
    /// Sessions already running are left to finish on their own.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(
            addr = %self.local_addr()?,
            max_clients = self.config.max_clients,
            framing = ?self.config.username_framing,
            "Relay server listening"
        );

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, peer, conn_num).await;
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        let sessions = self.registry.occupancy().await;
        info!(sessions, "Server stopped accepting connections");
        Ok(())
    }

    /// Admits a new connection, or closes it if the registry is full.
    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, connection_number: u64) {
        if self.registry.is_full().await {
            warn!(
                peer = %peer,
                max = self.registry.capacity(),
                "Max clients reached, rejecting connection"
            );
            drop(stream);
            return;
        }

        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        debug!(peer = %peer, connection = connection_number, "Accepted connection");

        let (reader, writer) = stream.into_split();
        let writer = SessionWriter::new(writer, self.config.write_timeout());
        let handler = ConnectionHandler::new(
            reader,
            writer,
            self.registry.clone(),
            self.config.username_framing,
            connection_number,
        );

        tokio::spawn(async move {
            if let Some(session) = handler.run().await {
                info!(
                    peer = %peer,
                    username = %session.username,
                    connected_secs = session.connected_for().num_seconds(),
                    "Session closed"
                );
            }
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
