//! Registry actor commands, errors, and snapshot types.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `Recipient`: A broadcast target copied out of the registry
//!
//! All types are designed for async message passing and follow the panic-free policy.

use chanrelay_core::{ChannelName, SessionView, SlotId, Username};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::transport::SessionWriter;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Place a newly authenticated session in the first free slot.
    ///
    /// # Errors
    /// - `RegistryError::RegistryFull` if every slot is occupied
    Register {
        /// Validated username of the new session
        username: Username,
        /// Write half of the session's transport
        writer: SessionWriter,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<SlotId, RegistryError>>,
    },

    /// Empty a slot. Replies `None` if the slot was already empty.
    Unregister {
        /// Slot to clear
        slot: SlotId,
        /// Channel to send the removed session
        respond_to: oneshot::Sender<Option<SessionView>>,
    },

    /// Set or clear a session's channel, replying with the previous value.
    ///
    /// # Errors
    /// - `RegistryError::SlotNotFound` if the slot is empty
    SetChannel {
        /// Slot whose channel changes
        slot: SlotId,
        /// New channel; `None` leaves the current one
        channel: Option<ChannelName>,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<Option<ChannelName>, RegistryError>>,
    },

    /// Snapshot every session currently in a channel.
    ChannelMembers {
        /// Channel to snapshot
        channel: ChannelName,
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<Recipient>>,
    },

    /// List all registered usernames in slot order.
    Usernames {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<Username>>,
    },

    /// List distinct occupied channels, sorted.
    Channels {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<ChannelName>>,
    },

    /// Get a single session by slot.
    GetSession {
        /// Slot to look up
        slot: SlotId,
        /// Channel to send the result
        respond_to: oneshot::Sender<Option<SessionView>>,
    },

    /// Number of occupied slots.
    Occupancy {
        /// Channel to send the count
        respond_to: oneshot::Sender<usize>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every slot is occupied.
    #[error("registry is full (max: {max} clients)")]
    RegistryFull {
        /// Maximum number of sessions allowed
        max: usize,
    },

    /// The slot holds no session.
    #[error("no session in {0}")]
    SlotNotFound(SlotId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Snapshots
// ============================================================================

/// A broadcast target copied out of the registry.
///
/// Holding a `Recipient` does not keep the session registered; if the
/// session leaves before the write, the write simply fails or lands on a
/// transport that is about to close.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub slot: SlotId,
    pub username: Username,
    pub writer: SessionWriter,
}
