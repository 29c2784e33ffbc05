//! Connection handler for individual client connections.
//!
//! Each accepted connection gets its own `ConnectionHandler`, which drives
//! one session through its lifecycle:
//!
//! ```text
//! Connecting -> Authenticating -> Active -> Leaving -> Closed
//! ```
//!
//! - `Authenticating`: read and validate the username frame, then register
//! - `Active`: read lines, dispatch commands, relay chat
//! - `Leaving`: announce departure to the channel and unregister
//! - `Closed`: shut the write half down
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use chanrelay_core::{ChannelName, DomainError, SessionState, SessionView, SlotId, Username};
use chanrelay_protocol::{
    decode_username_frame, Command, Input, Line, LineCodec, Notice, UsernameFraming,
    MAX_LINE_BYTES, USERNAME_FRAME_BYTES,
};

use crate::broadcast::Broadcaster;
use crate::registry::{RegistryError, RegistryHandle};
use crate::transport::{SessionWriter, TransportError};

/// Whether the read loop keeps going after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Connection handler for a single client.
///
/// Owns the read half of the transport; the write half is shared with the
/// registry through [`SessionWriter`].
pub struct ConnectionHandler<R> {
    /// Line frames from the client
    frames: FramedRead<R, LineCodec>,

    /// Write half of this connection
    writer: SessionWriter,

    /// Handle to the client registry
    registry: RegistryHandle,

    /// Fan-out for channel notices
    broadcaster: Broadcaster,

    /// How the username frame is delimited
    username_framing: UsernameFraming,

    /// Sequence number assigned by the acceptor
    connection_number: u64,

    state: SessionState,

    /// Registry slot (set once registered)
    slot: Option<SlotId>,

    /// Validated username (set once registered)
    username: Option<Username>,

    /// Current channel; the registry holds the authoritative copy
    channel: Option<ChannelName>,
}

impl<R> ConnectionHandler<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `reader` - Read half of the client transport
    /// * `writer` - Write half of the client transport
    /// * `registry` - Handle to the client registry
    /// * `username_framing` - Handshake framing to expect
    /// * `connection_number` - Unique number for this connection
    pub fn new(
        reader: R,
        writer: SessionWriter,
        registry: RegistryHandle,
        username_framing: UsernameFraming,
        connection_number: u64,
    ) -> Self {
        Self {
            frames: FramedRead::new(reader, LineCodec::new(USERNAME_FRAME_BYTES)),
            writer,
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            username_framing,
            connection_number,
            state: SessionState::Connecting,
            slot: None,
            username: None,
            channel: None,
        }
    }

    /// Runs the connection handler.
    ///
    /// This is the main entry point. Returns the session as it was when it
    /// left the registry, or `None` if it never registered.
    pub async fn run(mut self) -> Option<SessionView> {
        debug!(connection = self.connection_number, "New client connected");
        self.transition(SessionState::Authenticating);

        if let Err(e) = self.authenticate().await {
            warn!(
                connection = self.connection_number,
                error = %e,
                "Handshake failed"
            );
            self.transition(SessionState::Leaving);
            self.close().await;
            return None;
        }

        self.transition(SessionState::Active);

        if let Err(e) = self.process_lines().await {
            debug!(
                connection = self.connection_number,
                username = ?self.username,
                error = %e,
                "Connection closed"
            );
        }

        self.transition(SessionState::Leaving);
        let departed = self.leave().await;
        self.close().await;
        departed
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            warn!(
                connection = self.connection_number,
                from = %self.state,
                to = %next,
                "Unexpected session state transition"
            );
        }
        debug!(
            connection = self.connection_number,
            from = %self.state,
            to = %next,
            "Session state"
        );
        self.state = next;
    }

    // ========================================================================
    // Authenticating
    // ========================================================================

    /// Reads the username frame, validates it, and registers the session.
    async fn authenticate(&mut self) -> Result<(), ConnectionError> {
        let raw = self.read_username_frame().await?;
        let username = Username::parse(&raw)?;

        let slot = self
            .registry
            .register(username.clone(), self.writer.clone())
            .await?;

        info!(
            connection = self.connection_number,
            slot = %slot,
            username = %username,
            "Client authenticated"
        );

        self.slot = Some(slot);
        self.username = Some(username);
        self.frames.decoder_mut().set_max_length(MAX_LINE_BYTES);
        Ok(())
    }

    async fn read_username_frame(&mut self) -> Result<String, ConnectionError> {
        match self.username_framing {
            UsernameFraming::Fixed => {
                // Nothing has been polled through the codec yet, so reading
                // the inner stream directly cannot skip buffered bytes.
                let mut frame = [0u8; USERNAME_FRAME_BYTES];
                self.frames.get_mut().read_exact(&mut frame).await?;
                Ok(decode_username_frame(&frame))
            }
            UsernameFraming::Line => match self.frames.next().await {
                Some(Ok(Line::Text(text))) => Ok(decode_username_frame(text.as_bytes())),
                Some(Ok(Line::Overlong)) => Err(ConnectionError::UsernameTooLong {
                    max: USERNAME_FRAME_BYTES,
                }),
                Some(Err(e)) => Err(e.into()),
                None => Err(ConnectionError::Eof),
            },
        }
    }

    // ========================================================================
    // Active
    // ========================================================================

    /// Main line processing loop.
    ///
    /// Returns `Ok` on `/exit` or EOF, and `Err` on a transport or registry
    /// failure. A failed write from another session's broadcast also ends
    /// the loop. Either way the caller moves the session to `Leaving`.
    async fn process_lines(&mut self) -> Result<(), ConnectionError> {
        let (_, username) = self.identity()?;
        self.reply(&Notice::Greeting { username }).await?;

        loop {
            let frame = tokio::select! {
                frame = self.frames.next() => frame,
                _ = self.writer.failed() => {
                    return Err(TransportError::Failed.into());
                }
            };
            let Some(frame) = frame else {
                break;
            };

            let input = match frame? {
                Line::Text(text) => Input::parse(&text),
                Line::Overlong => {
                    debug!(connection = self.connection_number, "Dropped overlong line");
                    self.reply(&Notice::LineTooLong {
                        max: MAX_LINE_BYTES,
                    })
                    .await?;
                    continue;
                }
            };

            if self.handle_input(input).await? == Flow::Exit {
                debug!(connection = self.connection_number, "Client requested exit");
                return Ok(());
            }
        }

        debug!(connection = self.connection_number, "Client sent EOF");
        Ok(())
    }

    /// Handles a single line of client input.
    async fn handle_input(&mut self, input: Input) -> Result<Flow, ConnectionError> {
        let (slot, username) = self.identity()?;

        match input {
            Input::Empty => {}

            Input::Chat(text) => {
                let notice = Notice::Chat { username, text };
                self.broadcaster
                    .broadcast(&notice, self.channel.as_ref(), slot)
                    .await;
            }

            Input::Command(Command::ListChannels) => {
                let channels = self.registry.channels().await;
                self.reply(&Notice::ChannelList(channels)).await?;
            }

            Input::Command(Command::ListUsers) => {
                let users = self.registry.usernames().await;
                self.reply(&Notice::UserList(users)).await?;
            }

            Input::Command(Command::Join(Ok(channel))) => {
                self.handle_join(slot, username, channel).await?;
            }

            Input::Command(Command::Join(Err(e))) => {
                debug!(connection = self.connection_number, error = %e, "Rejected join");
                self.reply(&Notice::Error(e.to_string())).await?;
            }

            Input::Command(Command::Leave) => {
                let notice = Notice::LeftChannel { username };
                self.broadcaster
                    .broadcast(&notice, self.channel.as_ref(), slot)
                    .await;
                self.registry.set_channel(slot, None).await?;
                self.channel = None;
            }

            Input::Command(Command::Exit) => return Ok(Flow::Exit),

            Input::Command(Command::Help) => {
                self.reply(&Notice::Help).await?;
            }

            Input::Command(Command::Unknown(name)) => {
                debug!(connection = self.connection_number, command = %name, "Unknown command");
                self.reply(&Notice::UnknownCommand).await?;
            }
        }

        Ok(Flow::Continue)
    }

    /// Moves the session into `channel`.
    ///
    /// Switching away from another channel tells that channel the session
    /// left, since a session is never in two channels.
    async fn handle_join(
        &mut self,
        slot: SlotId,
        username: Username,
        channel: ChannelName,
    ) -> Result<(), ConnectionError> {
        let previous = self.registry.set_channel(slot, Some(channel.clone())).await?;
        self.channel = Some(channel.clone());

        if let Some(previous) = previous.filter(|previous| *previous != channel) {
            let notice = Notice::LeftChannel {
                username: username.clone(),
            };
            self.broadcaster
                .broadcast(&notice, Some(&previous), slot)
                .await;
        }

        let notice = Notice::Joined { username, channel };
        self.broadcaster
            .broadcast(&notice, self.channel.as_ref(), slot)
            .await;
        Ok(())
    }

    // ========================================================================
    // Leaving / Closed
    // ========================================================================

    /// Announces departure and unregisters. No-op if never registered.
    async fn leave(&mut self) -> Option<SessionView> {
        let slot = self.slot.take()?;

        if let Some(username) = self.username.clone() {
            let notice = Notice::Departed { username };
            self.broadcaster
                .broadcast(&notice, self.channel.as_ref(), slot)
                .await;
        }

        self.channel = None;
        self.registry.unregister(slot).await
    }

    async fn close(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!(
                connection = self.connection_number,
                error = %e,
                "Transport shutdown failed"
            );
        }
        self.transition(SessionState::Closed);
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Slot and username of the registered session.
    fn identity(&self) -> Result<(SlotId, Username), ConnectionError> {
        match (self.slot, &self.username) {
            (Some(slot), Some(username)) => Ok((slot, username.clone())),
            _ => Err(ConnectionError::NotRegistered),
        }
    }

    /// Sends a notice to this client only.
    async fn reply(&self, notice: &Notice) -> Result<(), ConnectionError> {
        debug!(connection = self.connection_number, notice = %notice, "Reply");
        self.writer.send_notice(notice).await?;
        Ok(())
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Username frame too long (max: {max} bytes)")]
    UsernameTooLong { max: usize },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session is not registered")]
    NotRegistered,

    #[error("Connection closed")]
    Eof,
}
