//! chanrelay daemon - session registry and channel broadcast server
//!
//! This crate provides the core infrastructure for the relay server:
//! - `registry` - Registry actor owning the fixed-capacity session table
//! - `broadcast` - Channel fan-out of notices to session transports
//! - `server` - TCP acceptor and per-connection session state machine
//! - `config` - Server configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      chanrelayd                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │   RelayServer   │────▶│     RegistryActor           │    │
//! │  │  (TcpListener)  │     │  (slot table owner)         │    │
//! │  └────────┬────────┘     └──────────────┬──────────────┘    │
//! │           │                             │ snapshots         │
//! │           │ connections                 ▼                   │
//! │           ▼              ┌─────────────────────────────┐    │
//! │  ┌─────────────────┐     │   Broadcaster               │    │
//! │  │ConnectionHandler│────▶│   (writes outside the actor)│    │
//! │  │  (per client)   │     └─────────────────────────────┘    │
//! │  └─────────────────┘                                        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod broadcast;
pub mod config;
pub mod registry;
pub mod server;
pub mod transport;
