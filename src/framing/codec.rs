//! Frame codec for `tokio_util` framed transports.
//!
//! [`FrameCodec`] speaks the same wire format as
//! [`read_frame`](super::read_frame) / [`write_frame`](super::write_frame),
//! but decodes incrementally from a shared buffer, which suits long-lived
//! connections driven through [`tokio_util::codec::Framed`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//! use tokio_util::codec::Framed;
//! use buildwire::framing::FrameCodec;
//!
//! let mut framed = Framed::new(tcp_stream, FrameCodec::new());
//! while let Some(frame) = framed.next().await { /* ... */ }
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{parse_length, Frame, MAX_HEADER_DIGITS};
use crate::{AppError, Result};

/// Decoder position within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Header,
    Body(usize),
}

/// Length-prefixed frame codec.
///
/// # Decoder
///
/// Yields [`Frame::Payload`] for numeric headers and [`Frame::Empty`] for a
/// bare `\n`. End of stream is reported by the framed stream ending, so
/// [`Frame::Closed`] is never produced here. A stream that ends inside a
/// frame fails with [`AppError::ConnectionClosed`].
///
/// # Encoder
///
/// Accepts `&str`, `String`, or raw `Bytes` payloads and writes
/// `<len>\n<payload>`.
#[derive(Debug)]
pub struct FrameCodec {
    state: DecodeState,
    max_length: Option<usize>,
}

impl FrameCodec {
    /// Create a codec with no frame size cap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: DecodeState::Header,
            max_length: None,
        }
    }

    /// Create a codec that rejects frames declaring more than `max_length` bytes.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            state: DecodeState::Header,
            max_length: Some(max_length),
        }
    }

    /// Configured frame size cap, if any.
    #[must_use]
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if self.state == DecodeState::Header {
            let Some(pos) = src.iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_HEADER_DIGITS {
                    return Err(AppError::Protocol(format!(
                        "frame header exceeds {MAX_HEADER_DIGITS} bytes without a line feed"
                    )));
                }
                return Ok(None);
            };

            let header = src.split_to(pos + 1);
            let digits = &header[..pos];
            if digits.is_empty() {
                return Ok(Some(Frame::Empty));
            }

            let len = parse_length(digits)?;
            if let Some(max) = self.max_length {
                if len > max {
                    return Err(AppError::Protocol(format!(
                        "frame of {len} bytes exceeds the {max} byte limit"
                    )));
                }
            }
            self.state = DecodeState::Body(len);
        }

        let DecodeState::Body(len) = self.state else {
            return Ok(None);
        };
        if src.len() < len {
            return Ok(None);
        }

        self.state = DecodeState::Header;
        Ok(Some(Frame::Payload(src.split_to(len).freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        if src.is_empty() && self.state == DecodeState::Header {
            return Ok(None);
        }

        self.state = DecodeState::Header;
        Err(AppError::ConnectionClosed {
            partial: src.split().to_vec(),
        })
    }
}

impl Encoder<&str> for FrameCodec {
    type Error = AppError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<()> {
        encode_payload(item.as_bytes(), dst);
        Ok(())
    }
}

impl Encoder<String> for FrameCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        encode_payload(item.as_bytes(), dst);
        Ok(())
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = AppError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        encode_payload(&item, dst);
        Ok(())
    }
}

fn encode_payload(payload: &[u8], dst: &mut BytesMut) {
    let header = payload.len().to_string();
    dst.reserve(header.len() + 1 + payload.len());
    dst.put_slice(header.as_bytes());
    dst.put_u8(b'\n');
    dst.put_slice(payload);
}
