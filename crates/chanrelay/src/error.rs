//! Error types for the chanrelay terminal client.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use chanrelay_core::DomainError;

// ============================================================================
// Client Error Type
// ============================================================================

/// Terminal client errors.
///
/// Connection errors keep the address so the message tells the user which
/// server could not be reached.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The chosen username would be rejected by the server.
    #[error(transparent)]
    InvalidUsername(#[from] DomainError),

    /// Failed to connect to the relay server.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// I/O error on the terminal or the connection.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chanrelay_core::Username;

    #[test]
    fn test_invalid_username_message() {
        let err: ClientError = Username::parse("a").unwrap_err().into();
        assert!(err.to_string().starts_with("Invalid username:"));
    }

    #[test]
    fn test_connect_error_names_address() {
        let err = ClientError::Connect {
            addr: "127.0.0.1:6667".parse().unwrap(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(err.to_string().contains("127.0.0.1:6667"));
    }
}
