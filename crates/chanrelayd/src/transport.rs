//! Write side of a session's transport.
//!
//! The read half of a connection belongs to its `ConnectionHandler`. The
//! write half is wrapped in a [`SessionWriter`]: a cheap-to-clone handle that
//! the registry stores and hands out in broadcast snapshots. Each write takes
//! the writer's async mutex for the whole line, so lines from concurrent
//! broadcasts never interleave and lines from one sender arrive in order.
//!
//! The first failed or timed-out write marks the writer as failed. Later
//! writes fail immediately, and the owning `ConnectionHandler` watches
//! [`SessionWriter::failed`] to move its session to `Leaving`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use chanrelay_protocol::Notice;

type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Errors writing to a client transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Write timeout after {0:?}")]
    WriteTimeout(Duration),

    #[error("Transport already failed")]
    Failed,
}

/// Shared handle to the write half of one client connection.
#[derive(Clone)]
pub struct SessionWriter {
    inner: Arc<Mutex<BufWriter<BoxedWrite>>>,
    write_timeout: Duration,
    failed: CancellationToken,
}

impl SessionWriter {
    /// Wraps a write half. Every write is bounded by `write_timeout`.
    pub fn new<W>(writer: W, write_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let boxed: BoxedWrite = Box::new(writer);
        Self {
            inner: Arc::new(Mutex::new(BufWriter::new(boxed))),
            write_timeout,
            failed: CancellationToken::new(),
        }
    }

    /// Writes already-terminated text and flushes it.
    ///
    /// An error marks the writer as failed for every clone.
    pub async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        if self.has_failed() {
            return Err(TransportError::Failed);
        }

        let mut writer = self.inner.lock().await;

        let result = match timeout(self.write_timeout, async {
            writer.write_all(text.as_bytes()).await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(result) => result.map_err(TransportError::from),
            Err(_) => Err(TransportError::WriteTimeout(self.write_timeout)),
        };

        if result.is_err() {
            self.failed.cancel();
        }
        result
    }

    /// Renders and writes a notice.
    pub async fn send_notice(&self, notice: &Notice) -> Result<(), TransportError> {
        self.send_text(&notice.render()).await
    }

    /// Whether an earlier write failed.
    pub fn has_failed(&self) -> bool {
        self.failed.is_cancelled()
    }

    /// Completes once a write through any clone has failed.
    pub async fn failed(&self) {
        self.failed.cancelled().await
    }

    /// Flushes and shuts down the write half, signalling EOF to the peer.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let mut writer = self.inner.lock().await;

        match timeout(self.write_timeout, writer.shutdown()).await {
            Ok(result) => result.map_err(TransportError::from),
            Err(_) => Err(TransportError::WriteTimeout(self.write_timeout)),
        }
    }
}

impl fmt::Debug for SessionWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionWriter")
            .field("write_timeout", &self.write_timeout)
            .field("failed", &self.has_failed())
            .finish_non_exhaustive()
    }
}
