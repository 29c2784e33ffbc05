//! Bounded line framing.
//!
//! [`LineCodec`] splits a byte stream on `\n` like `tokio_util`'s
//! `LinesCodec`, with two differences that matter for a relay:
//! - a line longer than the limit is not an error; it is discarded up to the
//!   next newline and surfaced as [`Line::Overlong`] so the connection stays up
//! - invalid UTF-8 is decoded lossily instead of failing the stream

use std::{cmp, io};

use bytes::{Buf, BytesMut};
use serde::Deserialize;
use tokio_util::codec::Decoder;

use chanrelay_core::Username;

use crate::USERNAME_FRAME_BYTES;

/// How the username frame is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsernameFraming {
    /// A newline-terminated line of at most `USERNAME_FRAME_BYTES` bytes
    #[default]
    Line,
    /// Exactly `USERNAME_FRAME_BYTES` bytes, NUL padded
    Fixed,
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A complete line without its terminator
    Text(String),
    /// A line that exceeded the limit and was dropped
    Overlong,
}

/// Decoder for newline-delimited text with a hard length limit.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Maximum line length in bytes, excluding the newline
    max_length: usize,

    /// Where the next newline search starts
    next_index: usize,

    /// True while skipping the tail of an overlong line
    discarding: bool,
}

impl LineCodec {
    /// Creates a codec that accepts lines of at most `max_length` bytes.
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Changes the limit for subsequent lines.
    ///
    /// Used after the handshake to switch from the username limit to the
    /// chat line limit on the same stream.
    pub fn set_max_length(&mut self, max_length: usize) {
        self.max_length = max_length;
    }
}

fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for LineCodec {
    type Item = Line;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, io::Error> {
        loop {
            // Look at most one byte past the limit: a newline there still
            // terminates a line of exactly `max_length` bytes. A `\r` in that
            // position starts a CRLF terminator, so the window grows by one.
            let mut limit = self.max_length.saturating_add(1);
            if !self.discarding && buf.get(self.max_length) == Some(&b'\r') {
                limit = limit.saturating_add(1);
            }
            let read_to = cmp::min(limit, buf.len());
            let window = buf.get(self.next_index..read_to).unwrap_or_default();
            let newline = window.iter().position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                    return Ok(Some(Line::Overlong));
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    let text = decode_text(line.get(..end).unwrap_or_default());
                    return Ok(Some(Line::Text(text)));
                }
                (false, None) if buf.len() >= limit => {
                    self.discarding = true;
                    self.next_index = 0;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }

        // A partial final line from a peer that closed without a newline is
        // still delivered; the tail of an overlong line is not.
        if self.discarding || buf.is_empty() {
            self.discarding = false;
            self.next_index = 0;
            buf.clear();
            return Ok(None);
        }

        self.next_index = 0;
        let line = buf.split_to(buf.len());
        Ok(Some(Line::Text(decode_text(&line))))
    }
}

/// Extracts the username text from a raw username frame.
///
/// The frame ends at the first NUL or newline; anything after it (padding
/// or stale bytes) is ignored. Validation is left to `Username::parse`.
pub fn decode_username_frame(frame: &[u8]) -> String {
    let end = frame
        .iter()
        .position(|b| *b == 0 || *b == b'\n')
        .unwrap_or(frame.len());
    decode_text(frame.get(..end).unwrap_or_default())
}

/// Builds the username frame a client sends right after connecting.
///
/// `Fixed` frames are NUL padded to exactly [`USERNAME_FRAME_BYTES`];
/// usernames are always shorter than that, so at least one NUL remains.
pub fn encode_username_frame(username: &Username, framing: UsernameFraming) -> Vec<u8> {
    let mut frame = username.as_str().as_bytes().to_vec();
    match framing {
        UsernameFraming::Line => frame.push(b'\n'),
        UsernameFraming::Fixed => frame.resize(USERNAME_FRAME_BYTES, 0),
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::FramedRead;

    fn text(s: &str) -> Line {
        Line::Text(s.to_string())
    }

    #[test]
    fn test_decode_complete_lines() {
        let mut codec = LineCodec::new(16);
        let mut buf = BytesMut::from("hello\nworld\r\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(text("hello")));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(text("world")));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial_line_waits_for_newline() {
        let mut codec = LineCodec::new(16);
        let mut buf = BytesMut::from("hel");

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"lo\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(text("hello")));
    }

    #[test]
    fn test_line_at_exact_limit_is_accepted() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from("abcd\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(text("abcd")));
    }

    #[test]
    fn test_crlf_line_at_exact_limit_is_accepted() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from("abcd\r");

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\nabcde\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(text("abcd")));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Line::Overlong));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_overlong_line_is_skipped_and_stream_recovers() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from("abcdefgh");

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"ijk\nok\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Line::Overlong));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(text("ok")));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut codec = LineCodec::new(16);
        let mut buf = BytesMut::from(&b"hi\xff\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(text("hi\u{fffd}")));
    }

    #[test]
    fn test_decode_eof_flushes_partial_line() {
        let mut codec = LineCodec::new(16);
        let mut buf = BytesMut::from("bye");

        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(text("bye")));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_set_max_length() {
        let mut codec = LineCodec::new(2);
        codec.set_max_length(8);
        assert_eq!(codec.max_length(), 8);

        let mut buf = BytesMut::from("12345678\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(text("12345678")));
    }

    #[test]
    fn test_username_frame_padding() {
        let mut frame = [0u8; 32];
        frame[..5].copy_from_slice(b"alice");
        frame[10] = b'x';
        assert_eq!(decode_username_frame(&frame), "alice");

        assert_eq!(decode_username_frame(b"bob\n\0\0"), "bob");
        assert_eq!(decode_username_frame(b"carol"), "carol");
    }

    #[test]
    fn test_encode_username_frame() {
        let name = Username::parse("alice").unwrap();

        assert_eq!(encode_username_frame(&name, UsernameFraming::Line), b"alice\n");

        let fixed = encode_username_frame(&name, UsernameFraming::Fixed);
        assert_eq!(fixed.len(), USERNAME_FRAME_BYTES);
        assert_eq!(decode_username_frame(&fixed), "alice");
    }

    #[test]
    fn test_username_framing_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            framing: UsernameFraming,
        }

        let fixed: Wrapper = toml::from_str("framing = \"fixed\"").unwrap();
        assert_eq!(fixed.framing, UsernameFraming::Fixed);
        assert_eq!(UsernameFraming::default(), UsernameFraming::Line);
    }

    #[tokio::test]
    async fn test_framed_read_over_stream() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut frames = FramedRead::new(server, LineCodec::new(8));

        client.write_all(b"one\nthis-is-too-long\ntwo").await.unwrap();
        drop(client);

        assert_eq!(frames.next().await.unwrap().unwrap(), text("one"));
        assert_eq!(frames.next().await.unwrap().unwrap(), Line::Overlong);
        assert_eq!(frames.next().await.unwrap().unwrap(), text("two"));
        assert!(frames.next().await.is_none());
    }
}
