//! Registry actor - owns the session table and processes commands.
//!
//! The RegistryActor is the single owner of session state in the server.
//! Commands are handled one at a time, which is what makes every register,
//! unregister, channel change and snapshot atomic with respect to the others.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Slot access goes through `get`/`get_mut`, never `[i]`
//! - Response send failures are ignored (the caller went away)

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use chanrelay_core::{ChannelName, SessionView, SlotId, Username};

use super::commands::{Recipient, RegistryCommand, RegistryError};
use crate::transport::SessionWriter;

/// One occupied slot.
#[derive(Debug)]
struct SessionEntry {
    username: Username,
    channel: Option<ChannelName>,
    connected_at: DateTime<Utc>,
    writer: SessionWriter,
}

impl SessionEntry {
    fn view(&self, slot: SlotId) -> SessionView {
        SessionView {
            slot,
            username: self.username.clone(),
            channel: self.channel.clone(),
            connected_at: self.connected_at,
        }
    }
}

/// The registry actor - owns all session state.
///
/// # Ownership
///
/// The actor owns `slots`, a table of exactly `capacity` entries. A slot is
/// either empty or holds one live session, so occupancy can never exceed
/// capacity. `SlotId`s are indices into this table.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Fixed-capacity session table
    slots: Vec<Option<SessionEntry>>,

    /// Number of `Some` entries in `slots`
    occupied: usize,
}

impl RegistryActor {
    /// Creates a new registry actor with `capacity` slots.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            receiver,
            slots,
            occupied: 0,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!(capacity = self.capacity(), "Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(sessions = self.occupied, "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                username,
                writer,
                respond_to,
            } => {
                let result = self.handle_register(username, writer);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Unregister { slot, respond_to } => {
                let result = self.handle_unregister(slot);
                let _ = respond_to.send(result);
            }
            RegistryCommand::SetChannel {
                slot,
                channel,
                respond_to,
            } => {
                let result = self.handle_set_channel(slot, channel);
                let _ = respond_to.send(result);
            }
            RegistryCommand::ChannelMembers {
                channel,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_channel_members(&channel));
            }
            RegistryCommand::Usernames { respond_to } => {
                let _ = respond_to.send(self.handle_usernames());
            }
            RegistryCommand::Channels { respond_to } => {
                let _ = respond_to.send(self.handle_channels());
            }
            RegistryCommand::GetSession { slot, respond_to } => {
                let result = self.entry(slot).map(|entry| entry.view(slot));
                let _ = respond_to.send(result);
            }
            RegistryCommand::Occupancy { respond_to } => {
                let _ = respond_to.send(self.occupied);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_register(
        &mut self,
        username: Username,
        writer: SessionWriter,
    ) -> Result<SlotId, RegistryError> {
        let capacity = self.capacity();
        let Some((index, slot)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
        else {
            warn!(
                username = %username,
                max = capacity,
                "Registry is full, rejecting registration"
            );
            return Err(RegistryError::RegistryFull { max: capacity });
        };

        let slot_id = SlotId::new(index);
        *slot = Some(SessionEntry {
            username: username.clone(),
            channel: None,
            connected_at: Utc::now(),
            writer,
        });
        self.occupied += 1;

        info!(
            slot = %slot_id,
            username = %username,
            total_sessions = self.occupied,
            "Session registered"
        );

        Ok(slot_id)
    }

    fn handle_unregister(&mut self, slot: SlotId) -> Option<SessionView> {
        let entry = self.slots.get_mut(slot.index()).and_then(Option::take);

        match entry {
            Some(entry) => {
                self.occupied = self.occupied.saturating_sub(1);
                info!(
                    slot = %slot,
                    username = %entry.username,
                    total_sessions = self.occupied,
                    "Session unregistered"
                );
                Some(entry.view(slot))
            }
            None => {
                debug!(slot = %slot, "Unregister of empty slot ignored");
                None
            }
        }
    }

    fn handle_set_channel(
        &mut self,
        slot: SlotId,
        channel: Option<ChannelName>,
    ) -> Result<Option<ChannelName>, RegistryError> {
        let entry = self
            .slots
            .get_mut(slot.index())
            .and_then(Option::as_mut)
            .ok_or(RegistryError::SlotNotFound(slot))?;

        debug!(
            slot = %slot,
            username = %entry.username,
            from = ?entry.channel,
            to = ?channel,
            "Channel changed"
        );

        Ok(std::mem::replace(&mut entry.channel, channel))
    }

    fn handle_channel_members(&self, channel: &ChannelName) -> Vec<Recipient> {
        self.occupied_entries()
            .filter(|(_, entry)| entry.channel.as_ref() == Some(channel))
            .map(|(slot, entry)| Recipient {
                slot,
                username: entry.username.clone(),
                writer: entry.writer.clone(),
            })
            .collect()
    }

    fn handle_usernames(&self) -> Vec<Username> {
        self.occupied_entries()
            .map(|(_, entry)| entry.username.clone())
            .collect()
    }

    fn handle_channels(&self) -> Vec<ChannelName> {
        let distinct: BTreeSet<&ChannelName> = self
            .occupied_entries()
            .filter_map(|(_, entry)| entry.channel.as_ref())
            .collect();

        distinct.into_iter().cloned().collect()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn entry(&self, slot: SlotId) -> Option<&SessionEntry> {
        self.slots.get(slot.index()).and_then(Option::as_ref)
    }

    fn occupied_entries(&self) -> impl Iterator<Item = (SlotId, &SessionEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|entry| (SlotId::new(index), entry)))
    }

    /// Returns the number of occupied slots (for testing).
    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.occupied
    }
}
