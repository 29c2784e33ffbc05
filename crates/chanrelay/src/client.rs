//! Relay connection client for the terminal.
//!
//! This module provides the `ChatClient` which handles:
//! - Connecting to the relay server over TCP
//! - Sending the username frame in the configured framing
//! - Copying server lines to the output and input lines to the server
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tracing::{debug, info};

use chanrelay_core::Username;
use chanrelay_protocol::{encode_username_frame, UsernameFraming};

use crate::error::{ClientError, Result};

/// Default server address
pub const DEFAULT_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 6667));

/// Input line that ends the session.
const EXIT_COMMAND: &str = "/exit";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the chat client.
///
/// # Example
///
/// ```rust
/// use chanrelay_client::client::ClientConfig;
/// use chanrelay_protocol::UsernameFraming;
///
/// let config = ClientConfig {
///     framing: UsernameFraming::Fixed,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Address of the relay server.
    pub addr: SocketAddr,

    /// Username framing the server expects.
    pub framing: UsernameFraming,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR,
            framing: UsernameFraming::default(),
        }
    }
}

/// How a chat session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed `/exit`.
    Exited,
    /// The input reached EOF; the connection was half-closed.
    InputClosed,
    /// The server closed the connection first.
    ServerClosed,
}

// ============================================================================
// Chat Client
// ============================================================================

/// Interactive client for the relay server.
///
/// # Session Lifecycle
///
/// 1. Connect to the server
/// 2. Send the username frame
/// 3. Relay lines both ways until `/exit`, input EOF, or server close
/// 4. After `/exit` or input EOF, keep printing until the server closes
pub struct ChatClient {
    config: ClientConfig,
}

impl ChatClient {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Connects and sends the username frame.
    pub async fn connect(&self, username: &Username) -> Result<TcpStream> {
        let addr = self.config.addr;
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect { addr, source })?;

        let frame = encode_username_frame(username, self.config.framing);
        stream.write_all(&frame).await?;
        stream.flush().await?;

        info!(addr = %addr, username = %username, "Connected to relay");
        Ok(stream)
    }

    /// Runs a full session, reading user lines from `input` and printing
    /// server lines to `output`.
    pub async fn run<I, O>(&self, username: &Username, input: I, output: O) -> Result<SessionEnd>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let stream = self.connect(username).await?;
        relay(stream, input, output).await
    }
}

/// Copies lines between the user and the server until the server closes.
pub async fn relay<S, I, O>(stream: S, input: I, mut output: O) -> Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut server_lines = BufReader::new(read_half).lines();
    let mut input_lines = input.lines();

    // Set once the user side is done; the server still gets to finish.
    let mut ended: Option<SessionEnd> = None;

    loop {
        tokio::select! {
            line = server_lines.next_line() => {
                match line? {
                    Some(line) => {
                        output.write_all(line.as_bytes()).await?;
                        output.write_all(b"\n").await?;
                        output.flush().await?;
                    }
                    None => {
                        debug!("Server closed the connection");
                        return Ok(ended.unwrap_or(SessionEnd::ServerClosed));
                    }
                }
            }

            line = input_lines.next_line(), if ended.is_none() => {
                match line? {
                    Some(line) => {
                        let line = line.trim_end_matches('\r');
                        write_half.write_all(line.as_bytes()).await?;
                        write_half.write_all(b"\n").await?;
                        write_half.flush().await?;

                        if line == EXIT_COMMAND {
                            ended = Some(SessionEnd::Exited);
                        }
                    }
                    None => {
                        debug!("Input closed, half-closing connection");
                        write_half.shutdown().await?;
                        ended = Some(SessionEnd::InputClosed);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::{AsyncReadExt, BufReader};

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.addr.to_string(), "127.0.0.1:6667");
        assert_eq!(config.framing, UsernameFraming::Line);
    }

    #[tokio::test]
    async fn test_relay_forwards_both_ways_and_stops_after_exit() {
        let (client_side, mut server_side) = tokio::io::duplex(1024);
        let input = BufReader::new(Cursor::new(b"hello\r\n/exit\nnever sent\n".to_vec()));
        let mut output = Vec::new();

        let server = tokio::spawn(async move {
            server_side.write_all(b"welcome\n").await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 64];
            while !received.ends_with(b"/exit\n") {
                let n = server_side.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
            }
            server_side.write_all(b"bye\n").await.unwrap();
            received
        });

        let end = relay(client_side, input, &mut output).await.unwrap();

        assert_eq!(end, SessionEnd::Exited);
        assert_eq!(server.await.unwrap(), b"hello\n/exit\n");
        assert_eq!(output, b"welcome\nbye\n");
    }

    #[tokio::test]
    async fn test_relay_half_closes_on_input_eof() {
        let (client_side, mut server_side) = tokio::io::duplex(1024);
        let input = BufReader::new(Cursor::new(Vec::new()));
        let mut output = Vec::new();

        let server = tokio::spawn(async move {
            let mut rest = Vec::new();
            server_side.read_to_end(&mut rest).await.unwrap();
            rest
        });

        let end = relay(client_side, input, &mut output).await.unwrap();

        assert_eq!(end, SessionEnd::InputClosed);
        assert!(server.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relay_reports_server_close() {
        let (client_side, server_side) = tokio::io::duplex(1024);
        drop(server_side);

        let (_keep_open, input) = tokio::io::duplex(16);
        let end = relay(client_side, BufReader::new(input), Vec::new())
            .await
            .unwrap();
        assert_eq!(end, SessionEnd::ServerClosed);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ChatClient::new(ClientConfig {
            addr,
            ..Default::default()
        });
        let result = client.connect(&Username::parse("alice").unwrap()).await;
        assert!(matches!(result, Err(ClientError::Connect { .. })));
    }
}
