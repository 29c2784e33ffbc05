//! Shared harness for the server integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.
//! We test the panic-free behavior of production code through assertions.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use chanrelayd::config::ServerConfig;
use chanrelayd::registry::{spawn_registry, RegistryHandle};
use chanrelayd::server::RelayServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Maximum time to wait for a line the test expects
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long "nothing arrives" is observed for
pub const SILENCE_WINDOW: Duration = Duration::from_millis(100);

/// Grace period for server shutdown
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(50);

/// Reply to an unknown command, used as an ordering barrier.
pub const BARRIER_REPLY: &str = "command not found, try /help\n";

// ============================================================================
// TestServer
// ============================================================================

/// Test server context that manages server lifecycle.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: RegistryHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    /// Spawns a server on an ephemeral port with default settings.
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawns a server after letting the test adjust its configuration.
    pub async fn spawn_with(configure: impl FnOnce(&mut ServerConfig)) -> Self {
        let mut config = ServerConfig {
            listen: "127.0.0.1:0".parse().unwrap(),
            max_clients: 16,
            write_timeout_secs: 1,
            ..ServerConfig::default()
        };
        configure(&mut config);

        let registry = spawn_registry(config.max_clients);
        let cancel_token = CancellationToken::new();
        let server = RelayServer::bind(config, registry.clone(), cancel_token.clone())
            .await
            .expect("bind test server");
        let addr = server.local_addr().expect("local addr");

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        TestServer {
            addr,
            registry,
            cancel_token,
        }
    }

    /// Opens a raw connection without sending anything.
    pub async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr)
            .await
            .expect("connect to server");
        TestClient::new(stream)
    }

    /// Connects, sends `username`, and consumes the greeting.
    pub async fn login(&self, username: &str) -> TestClient {
        let mut client = self.connect().await;
        client.send_line(username).await;
        let greeting = client.recv().await;
        assert!(
            greeting.starts_with(&format!("Hello {username},")),
            "unexpected greeting: {greeting:?}"
        );
        client
    }

    /// Polls the registry until `expected` sessions are registered.
    pub async fn wait_for_occupancy(&self, expected: usize) {
        let start = tokio::time::Instant::now();
        while start.elapsed() < RECV_TIMEOUT {
            if self.registry.occupancy().await == expected {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "occupancy stayed at {} (expected {expected})",
            self.registry.occupancy().await
        );
    }

    /// Shuts down the server gracefully.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

// ============================================================================
// TestClient
// ============================================================================

/// Test client connection with line helpers.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Sends one line, appending the terminator.
    pub async fn send_line(&mut self, line: &str) {
        self.send_raw(format!("{line}\n").as_bytes()).await;
    }

    /// Sends bytes exactly as given.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Receives one line, terminator included.
    pub async fn recv(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .unwrap();
        assert!(n > 0, "connection closed while waiting for a line");
        line
    }

    /// Receives `count` lines.
    pub async fn recv_lines(&mut self, count: usize) -> Vec<String> {
        let mut lines = Vec::with_capacity(count);
        for _ in 0..count {
            lines.push(self.recv().await);
        }
        lines
    }

    /// Waits until everything sent so far has been processed.
    ///
    /// Sends an unknown command and returns every line received before its
    /// reply. The server handles one client's lines in order, so the reply
    /// proves all earlier lines took effect.
    pub async fn sync(&mut self) -> Vec<String> {
        self.send_line("/sync").await;
        let mut before = Vec::new();
        loop {
            let line = self.recv().await;
            if line == BARRIER_REPLY {
                return before;
            }
            before.push(line);
        }
    }

    /// Asserts nothing arrives within the silence window.
    pub async fn expect_silence(&mut self) {
        let mut line = String::new();
        let result = timeout(SILENCE_WINDOW, self.reader.read_line(&mut line)).await;
        assert!(result.is_err(), "unexpected line: {line:?}");
    }

    /// Asserts the server closes the connection, skipping nothing.
    pub async fn expect_eof(&mut self) {
        let mut line = String::new();
        let n = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for close")
            .unwrap_or(0);
        assert_eq!(n, 0, "expected close, got {line:?}");
    }

    /// Half-closes the write side, as a client does on EOF.
    pub async fn close_write(&mut self) {
        self.writer.shutdown().await.unwrap();
    }
}
