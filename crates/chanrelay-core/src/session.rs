//! Session domain entities and value objects.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Limits
// ============================================================================

/// Minimum username length in bytes (after trimming).
pub const USERNAME_MIN_LEN: usize = 2;

/// Maximum username length in bytes (after trimming).
///
/// Leaves one byte of the 32-byte username frame for the terminator.
pub const USERNAME_MAX_LEN: usize = 31;

/// Maximum channel name length in bytes, including the prefix.
pub const CHANNEL_MAX_LEN: usize = 31;

/// Every channel name starts with this character.
pub const CHANNEL_PREFIX: char = '#';

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Handle for an occupied registry slot.
///
/// Slots are indices into the registry's fixed-capacity table. A slot id is
/// only meaningful while the session that received it is registered; after
/// unregistration the same index may be handed to a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// A validated username.
///
/// Immutable once a session is registered. Surrounding whitespace and NUL
/// padding are trimmed before validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Parses and validates a username.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidUsername` if the trimmed value is shorter
    /// than [`USERNAME_MIN_LEN`], longer than [`USERNAME_MAX_LEN`], or contains
    /// control characters.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || c == '\0');

        if trimmed.len() < USERNAME_MIN_LEN {
            return Err(DomainError::username(format!(
                "must be at least {USERNAME_MIN_LEN} characters"
            )));
        }
        if trimmed.len() > USERNAME_MAX_LEN {
            return Err(DomainError::username(format!(
                "must be at most {USERNAME_MAX_LEN} characters"
            )));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(DomainError::username(
                "must contain only printable characters",
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated channel name such as `#general`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelName(String);

impl ChannelName {
    /// Parses and validates a channel name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidChannelName` if the name is empty, does not
    /// start with [`CHANNEL_PREFIX`], exceeds [`CHANNEL_MAX_LEN`] bytes, or
    /// contains whitespace or control characters.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if !raw.starts_with(CHANNEL_PREFIX) {
            return Err(DomainError::channel(format!(
                "Channel name must start with {CHANNEL_PREFIX}"
            )));
        }
        if raw.len() > CHANNEL_MAX_LEN {
            return Err(DomainError::channel(format!(
                "Channel name must be at most {CHANNEL_MAX_LEN} bytes"
            )));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DomainError::channel(
                "Channel name must not contain spaces or control characters",
            ));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Session Lifecycle
// ============================================================================

/// Lifecycle state of one client connection.
///
/// ```text
/// Connecting -> Authenticating -> Active -> Leaving -> Closed
///                     |                        ^
///                     +------------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Transport accepted, no session yet
    #[default]
    Connecting,
    /// Waiting for the username frame
    Authenticating,
    /// Registered and processing lines
    Active,
    /// Announcing departure and unregistering
    Leaving,
    /// Transport closed; nothing further is valid
    Closed,
}

impl SessionState {
    /// Returns true if `next` is a legal successor of this state.
    #[must_use]
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Authenticating)
                | (Self::Authenticating, Self::Active)
                | (Self::Authenticating, Self::Leaving)
                | (Self::Active, Self::Leaving)
                | (Self::Leaving, Self::Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Active => "active",
            Self::Leaving => "leaving",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Session View
// ============================================================================

/// Point-in-time copy of a registered session's identity and membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub slot: SlotId,
    pub username: Username,
    pub channel: Option<ChannelName>,
    pub connected_at: DateTime<Utc>,
}

impl SessionView {
    /// Time elapsed since the session registered.
    #[must_use]
    pub fn connected_for(&self) -> Duration {
        Utc::now().signed_duration_since(self.connected_at)
    }
}
