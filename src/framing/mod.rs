//! Length-prefixed text framing.
//!
//! A frame on the wire is the ASCII decimal byte length of the payload, a
//! line feed, then exactly that many payload bytes:
//!
//! ```text
//! <N>\n<N bytes of UTF-8>
//! ```
//!
//! A bare `\n` header, or a stream that ends before the first header byte,
//! carries an empty payload and no body.
//!
//! Submodules:
//! - `stream`: one-shot async [`read_frame`] / [`write_frame`] over any
//!   `AsyncRead` / `AsyncWrite`, with per-operation timeouts.
//! - `codec`: [`FrameCodec`] for [`tokio_util::codec::Framed`] transports.

pub mod codec;
pub mod stream;

use bytes::Bytes;

use crate::{AppError, Result};

pub use codec::FrameCodec;
pub use stream::{
    encode_frame, read_frame, read_frame_event, read_frame_event_with, write_frame,
    write_frame_with, FrameOptions, READ_CHUNK_LEN, WRITE_CHUNK_LEN,
};

/// Longest header accepted: enough digits for any `u64` length.
pub(crate) const MAX_HEADER_DIGITS: usize = 20;

/// One decoded frame.
///
/// `Empty` and `Closed` both carry an empty payload. They are kept apart so a
/// higher layer can tell a deliberate `\n` probe from a peer that hung up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A frame with a numeric header (possibly `0`) and its body.
    Payload(Bytes),
    /// A bare `\n` header.
    Empty,
    /// The stream ended before any header byte arrived.
    Closed,
}

impl Frame {
    /// Payload bytes; empty for [`Frame::Empty`] and [`Frame::Closed`].
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Payload(bytes) => bytes,
            Self::Empty | Self::Closed => Bytes::new(),
        }
    }

    /// Whether the frame carries no payload bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Payload(bytes) => bytes.is_empty(),
            Self::Empty | Self::Closed => true,
        }
    }
}

/// Parse the digits of a frame header (without the trailing `\n`).
pub(crate) fn parse_length(header: &[u8]) -> Result<usize> {
    if header.len() <= MAX_HEADER_DIGITS && header.iter().all(u8::is_ascii_digit) {
        // All-digit input is valid UTF-8 and only fails to parse on overflow.
        if let Some(len) = std::str::from_utf8(header)
            .ok()
            .and_then(|digits| digits.parse::<usize>().ok())
        {
            return Ok(len);
        }
    }

    Err(invalid_header(header))
}

pub(crate) fn invalid_header(header: &[u8]) -> AppError {
    AppError::Protocol(format!(
        "invalid frame header: {:?}",
        String::from_utf8_lossy(header)
    ))
}
