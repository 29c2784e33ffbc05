//! chanrelay core - shared domain types for the chat relay
//!
//! This crate provides the value types shared between
//! the relay server (chanrelayd), the wire protocol, and the client.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use session::{
    ChannelName, SessionState, SessionView, SlotId, Username, CHANNEL_MAX_LEN, CHANNEL_PREFIX,
    USERNAME_MAX_LEN, USERNAME_MIN_LEN,
};
