//! chanrelay protocol - the line-oriented wire protocol
//!
//! This crate provides parsing of client input lines into commands,
//! rendering of server notices, and the framing codec shared by the
//! relay server and the terminal client.
//!
//! # Framing
//!
//! - The first frame of a connection is the username: a single line of at
//!   most [`USERNAME_FRAME_BYTES`] bytes, or (legacy) a fixed frame of exactly
//!   that many NUL-padded bytes.
//! - Every later frame is a `\n`-terminated line of at most
//!   [`MAX_LINE_BYTES`] bytes. A trailing `\r` is stripped.

pub mod codec;
pub mod command;
pub mod notice;

pub use codec::{decode_username_frame, encode_username_frame, Line, LineCodec, UsernameFraming};
pub use command::{Command, Input};
pub use notice::Notice;

/// Maximum size of one line in either direction, excluding the newline.
pub const MAX_LINE_BYTES: usize = 1024;

/// Size of the username frame.
pub const USERNAME_FRAME_BYTES: usize = 32;
