//! Client registry using Actor pattern.
//!
//! The registry is the only shared mutable state in the server: a fixed
//! number of slots, each empty or holding one live session. It receives
//! commands via a tokio mpsc channel and processes them one at a time, so
//! every mutation and every snapshot sees a consistent table.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryActor  │────▶│   Broadcaster   │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!         │                       │                       │
//!         │   RegistryCommand     │   Vec<Recipient>      │
//!         │   (mpsc channel)      │   (snapshot)          │
//!         ▼                       ▼                       ▼
//!  Register/Unregister     Vec<Option<Session>>     writes happen
//!  SetChannel              (fixed capacity)         outside the actor
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{Recipient, RegistryCommand, RegistryError};
pub use handle::RegistryHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawn the registry actor and return a handle for interaction.
///
/// Each call creates an independent registry, so several servers can run
/// in one process (as the integration tests do).
///
/// # Example
///
/// ```no_run
/// use chanrelayd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry(100);
///     let users = handle.usernames().await;
/// }
/// ```
pub fn spawn_registry(capacity: usize) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx, capacity);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, capacity)
}
