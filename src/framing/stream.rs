//! One-shot frame reads and writes over async byte streams.
//!
//! These functions own no state between calls. A timed-out read or write
//! leaves the stream open; whether the connection survives is the caller's
//! decision.

use std::future::Future;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::{invalid_header, parse_length, Frame, MAX_HEADER_DIGITS};
use crate::config::FramingConfig;
use crate::{AppError, Result};

/// Bytes written per chunk before the writer is flushed.
pub const WRITE_CHUNK_LEN: usize = 4096;

/// Upper bound on a single body read.
pub const READ_CHUNK_LEN: usize = 1024;

/// Chunk sizes used by [`write_frame_with`] and [`read_frame_event_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOptions {
    /// Bytes per write + flush.
    pub write_chunk: usize,
    /// Maximum bytes per body read.
    pub read_chunk: usize,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            write_chunk: WRITE_CHUNK_LEN,
            read_chunk: READ_CHUNK_LEN,
        }
    }
}

impl From<&FramingConfig> for FrameOptions {
    fn from(config: &FramingConfig) -> Self {
        Self {
            write_chunk: config.write_chunk_bytes,
            read_chunk: config.read_chunk_bytes,
        }
    }
}

/// Encode `payload` into its exact wire representation.
#[must_use]
pub fn encode_frame(payload: &str) -> Bytes {
    let body = payload.as_bytes();
    let header = body.len().to_string();

    let mut buf = BytesMut::with_capacity(header.len() + 1 + body.len());
    buf.put_slice(header.as_bytes());
    buf.put_u8(b'\n');
    buf.put_slice(body);
    buf.freeze()
}

/// Write `payload` as one frame using the default chunk size.
///
/// See [`write_frame_with`].
///
/// # Errors
///
/// Returns `AppError::Timeout` when a chunk is not flushed within `timeout`,
/// and `AppError::Io` on transport failures.
pub async fn write_frame<W>(
    writer: Option<&mut W>,
    payload: &str,
    timeout: Option<Duration>,
) -> Result<bool>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_frame_with(writer, payload, timeout, &FrameOptions::default()).await
}

/// Write `payload` as one frame.
///
/// Returns `Ok(false)` without touching anything when there is no writer
/// (peer not connected yet). Otherwise the encoded frame is written in
/// `options.write_chunk` pieces, each followed by a flush, and every
/// write + flush pair is bounded by `timeout`.
///
/// # Errors
///
/// Returns `AppError::Timeout` when a chunk is not flushed within `timeout`,
/// and `AppError::Io` on transport failures.
pub async fn write_frame_with<W>(
    writer: Option<&mut W>,
    payload: &str,
    timeout: Option<Duration>,
    options: &FrameOptions,
) -> Result<bool>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let Some(writer) = writer else {
        debug!("no writer attached, frame not sent");
        return Ok(false);
    };

    let wire = encode_frame(payload);
    trace!(payload_bytes = payload.len(), "writing frame");

    for chunk in wire.chunks(options.write_chunk.max(1)) {
        with_timeout(timeout, "frame write", async {
            writer.write_all(chunk).await?;
            writer.flush().await
        })
        .await?;
    }

    Ok(true)
}

/// Read one frame and return its raw payload bytes.
///
/// A bare `\n` header and a stream closed before the first byte both yield
/// an empty payload. Use [`read_frame_event`] to tell them apart.
///
/// # Errors
///
/// - `AppError::Timeout` — a single read exceeded `timeout`.
/// - `AppError::ConnectionClosed` — the stream ended mid-header or mid-body.
/// - `AppError::Protocol` — the header is not a decimal length.
/// - `AppError::Io` — transport failure.
pub async fn read_frame<R>(reader: &mut R, timeout: Option<Duration>) -> Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_frame_event(reader, timeout)
        .await
        .map(Frame::into_bytes)
}

/// Read one frame, keeping empty probes and closed streams distinct.
///
/// # Errors
///
/// Same as [`read_frame`].
pub async fn read_frame_event<R>(reader: &mut R, timeout: Option<Duration>) -> Result<Frame>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_frame_event_with(reader, timeout, &FrameOptions::default()).await
}

/// Read one frame with explicit chunk sizes.
///
/// The header is read one byte at a time so no byte past the frame is
/// consumed from `reader`. It is rejected as soon as a non-digit arrives or
/// it grows past the longest length a frame can declare. The body is then read in pieces of at most
/// `options.read_chunk` bytes until the declared length is reached.
///
/// # Errors
///
/// Same as [`read_frame`].
pub async fn read_frame_event_with<R>(
    reader: &mut R,
    timeout: Option<Duration>,
    options: &FrameOptions,
) -> Result<Frame>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = Vec::new();
    let mut byte = [0_u8; 1];

    loop {
        let n = with_timeout(timeout, "frame header read", reader.read(&mut byte)).await?;
        if n == 0 {
            if header.is_empty() {
                return Ok(Frame::Closed);
            }
            return Err(AppError::ConnectionClosed { partial: header });
        }
        if byte[0] == b'\n' {
            break;
        }
        header.push(byte[0]);
        if !byte[0].is_ascii_digit() || header.len() > MAX_HEADER_DIGITS {
            return Err(invalid_header(&header));
        }
    }

    if header.is_empty() {
        return Ok(Frame::Empty);
    }

    let len = parse_length(&header)?;
    trace!(len, "frame header read");

    let mut body = BytesMut::new();
    let mut chunk = vec![0_u8; options.read_chunk.clamp(1, len.max(1))];

    while body.len() < len {
        let want = (len - body.len()).min(chunk.len());
        let n = with_timeout(timeout, "frame body read", reader.read(&mut chunk[..want])).await?;
        if n == 0 {
            return Err(AppError::ConnectionClosed {
                partial: body.to_vec(),
            });
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Ok(Frame::Payload(body.freeze()))
}

/// Await `fut`, bounded by `timeout` when one is given.
async fn with_timeout<T, F>(timeout: Option<Duration>, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| AppError::Timeout(format!("{what} did not complete within {limit:?}")))?
            .map_err(AppError::from),
        None => fut.await.map_err(AppError::from),
    }
}
