//! Server-to-client notices.

use std::fmt::{self, Write as _};

use chanrelay_core::{ChannelName, Username};

use crate::MAX_LINE_BYTES;

const HELP_TEXT: &str = "\
/list-channels: see a list of available channels.
/list-users: see a list of online users.
/join [channel_name]: to join a channel.
/leave: to exit the channel.
/exit: to disconnect from the server.
/help: to see this message.
";

/// Text the server sends to clients.
///
/// Every notice renders to newline-terminated text. Single-line notices are
/// capped at [`MAX_LINE_BYTES`] including the newline; list replies span
/// several lines and are not capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Sent once after a successful handshake
    Greeting { username: Username },
    /// Reply to `/list-channels`
    ChannelList(Vec<ChannelName>),
    /// Reply to `/list-users`
    UserList(Vec<Username>),
    /// Reply to `/help`
    Help,
    /// Reply to an unrecognized command
    UnknownCommand,
    /// Error reply to the sender only
    Error(String),
    /// Reply to a line over the input limit
    LineTooLong { max: usize },
    /// Broadcast when a session joins a channel
    Joined {
        username: Username,
        channel: ChannelName,
    },
    /// Broadcast when a session leaves its channel
    LeftChannel { username: Username },
    /// Broadcast when a session disconnects
    Departed { username: Username },
    /// Relayed chat text
    Chat { username: Username, text: String },
}

impl Notice {
    /// Renders the notice as wire text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self {
            Self::ChannelList(channels) => {
                out.push_str("Available channels:\n");
                for channel in channels {
                    let _ = writeln!(out, "{channel}");
                }
                out
            }
            Self::UserList(users) => {
                out.push_str("Online users:\n");
                for user in users {
                    let _ = writeln!(out, "{user}");
                }
                out
            }
            Self::Help => HELP_TEXT.to_string(),
            single => {
                let _ = write!(out, "{single}");
                cap_line(out)
            }
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Greeting { username } => write!(
                f,
                "Hello {username}, you are now connected. Type /help for the list of commands."
            ),
            Self::ChannelList(channels) => write!(f, "{} channel(s)", channels.len()),
            Self::UserList(users) => write!(f, "{} user(s)", users.len()),
            Self::Help => f.write_str("help"),
            Self::UnknownCommand => f.write_str("command not found, try /help"),
            Self::Error(message) => f.write_str(message),
            Self::LineTooLong { max } => write!(f, "Message too long (max {max} bytes)"),
            Self::Joined { username, channel } => {
                write!(f, "{username} joined channel {channel}")
            }
            Self::LeftChannel { username } => write!(f, "{username} left the channel"),
            Self::Departed { username } => write!(f, "{username} has left"),
            Self::Chat { username, text } => write!(f, "{username}: {text}"),
        }
    }
}

/// Truncates `line` on a char boundary so that, with its newline, it fits
/// in [`MAX_LINE_BYTES`].
fn cap_line(mut line: String) -> String {
    let limit = MAX_LINE_BYTES - 1;
    if line.len() > limit {
        let mut cut = limit;
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        line.truncate(cut);
    }
    line.push('\n');
    line
}
