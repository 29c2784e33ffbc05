//! Client input parsing.

use chanrelay_core::{ChannelName, DomainError};

/// A slash command sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/list-channels`
    ListChannels,
    /// `/list-users`
    ListUsers,
    /// `/join <name>`; carries the validation result for the argument
    Join(Result<ChannelName, DomainError>),
    /// `/leave`
    Leave,
    /// `/exit`
    Exit,
    /// `/help`
    Help,
    /// Any other word starting with `/`
    Unknown(String),
}

/// One line of client input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Blank line; ignored by the server
    Empty,
    Command(Command),
    /// Chat text to relay to the sender's channel
    Chat(String),
}

impl Input {
    /// Classifies a line with its terminator already removed.
    ///
    /// Commands are matched on the whole first word, so `/leaveall` is an
    /// unknown command rather than `/leave`. Extra words after commands that
    /// take no argument are ignored.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            return Self::Empty;
        }

        if !line.starts_with('/') {
            return Self::Chat(line.to_string());
        }

        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();

        let command = match name {
            "/list-channels" => Command::ListChannels,
            "/list-users" => Command::ListUsers,
            "/join" => Command::Join(ChannelName::parse(words.next().unwrap_or_default())),
            "/leave" => Command::Leave,
            "/exit" => Command::Exit,
            "/help" => Command::Help,
            other => Command::Unknown(other.to_string()),
        };

        Self::Command(command)
    }
}
