//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending
//! commands to the registry actor.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{mpsc, oneshot};

use chanrelay_core::{ChannelName, SessionView, SlotId, Username};

use super::commands::{Recipient, RegistryCommand, RegistryError};
use crate::transport::SessionWriter;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// let slot = handle.register(username, writer).await?;
/// handle.set_channel(slot, Some(channel)).await?;
/// let members = handle.channel_members(&channel).await;
/// handle.unregister(slot).await;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Slot table size, fixed at spawn time
    capacity: usize,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    /// * `capacity` - Number of slots the actor was created with
    pub fn new(sender: mpsc::Sender<RegistryCommand>, capacity: usize) -> Self {
        Self { sender, capacity }
    }

    /// Register an authenticated session.
    ///
    /// # Errors
    ///
    /// - `RegistryError::RegistryFull` if every slot is occupied
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(
        &self,
        username: Username,
        writer: SessionWriter,
    ) -> Result<SlotId, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register {
                username,
                writer,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove a session from the registry.
    ///
    /// Safe to call more than once for the same slot: returns `None` if the
    /// slot is already empty or the actor is gone.
    pub async fn unregister(&self, slot: SlotId) -> Option<SessionView> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Unregister {
                slot,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Set (`Some`) or clear (`None`) a session's channel.
    ///
    /// Returns the channel the session was in before.
    ///
    /// # Errors
    ///
    /// - `RegistryError::SlotNotFound` if the slot is empty
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn set_channel(
        &self,
        slot: SlotId,
        channel: Option<ChannelName>,
    ) -> Result<Option<ChannelName>, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::SetChannel {
                slot,
                channel,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Snapshot the sessions currently in `channel`.
    ///
    /// Returns an empty vector if the channel has no members or if
    /// communication with the actor fails.
    pub async fn channel_members(&self, channel: &ChannelName) -> Vec<Recipient> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::ChannelMembers {
                channel: channel.clone(),
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// All registered usernames, in slot order.
    pub async fn usernames(&self) -> Vec<Username> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Usernames { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Distinct channels with at least one member, sorted.
    pub async fn channels(&self) -> Vec<ChannelName> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Channels { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Get a single session by slot.
    pub async fn get_session(&self, slot: SlotId) -> Option<SessionView> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::GetSession {
                slot,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Number of occupied slots (0 if the actor is gone).
    pub async fn occupancy(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Occupancy { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or_default()
    }

    /// Maximum number of sessions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if no further session can register right now.
    pub async fn is_full(&self) -> bool {
        self.occupancy().await >= self.capacity
    }
}
