//! chanrelay client - library modules
//!
//! This library provides the terminal client for the relay server: it
//! connects, sends the username frame, and relays lines between the
//! terminal and the server.

pub mod client;
pub mod error;

// Re-export commonly used types
pub use client::{ChatClient, ClientConfig, SessionEnd};
pub use error::{ClientError, Result};
