//! Line reading with a `\r` fallback.
//!
//! Progress bars from tools like `pip`, `curl`, or `ffmpeg` redraw a single
//! terminal line with `\r` and may not emit `\n` for a long time. A reader
//! that only splits on `\n` would keep buffering until the producer is done.
//! [`SeparatorReader::read_line`] splits on `\n`, and once the buffered data
//! passes the configured limit without one, it splits on `\r` instead.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{AppError, Result};

/// Default buffer limit before the `\r` fallback kicks in: 64 KiB.
pub const DEFAULT_LINE_LIMIT: usize = 64 * 1024;

/// Result of a single [`SeparatorReader::read_until`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntilOutcome {
    /// Bytes up to and including the separator.
    Found(Bytes),
    /// No separator within the limit. Nothing was consumed.
    LimitExceeded {
        /// Bytes currently buffered.
        buffered: usize,
    },
    /// The stream ended first; holds whatever was buffered (may be empty).
    Eof(Bytes),
}

/// Buffered reader that splits on a caller-chosen separator byte.
///
/// Reads are cancel safe: data pulled from the inner reader stays in the
/// internal buffer if a pending call is dropped.
#[derive(Debug)]
pub struct SeparatorReader<R> {
    inner: R,
    buf: BytesMut,
    limit: usize,
    eof: bool,
}

impl<R> SeparatorReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wrap `inner` with the [`DEFAULT_LINE_LIMIT`].
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, DEFAULT_LINE_LIMIT)
    }

    /// Wrap `inner` with a custom limit (at least one byte).
    #[must_use]
    pub fn with_limit(inner: R, limit: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(limit.clamp(1, DEFAULT_LINE_LIMIT)),
            limit: limit.max(1),
            eof: false,
        }
    }

    /// Configured limit in bytes.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes buffered but not yet returned.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Unwrap the inner reader, discarding buffered bytes.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read up to and including the next `separator`.
    ///
    /// The limit bounds the position of the separator: if more than
    /// `limit` bytes precede it (or are buffered with no separator at all),
    /// [`UntilOutcome::LimitExceeded`] is returned and the buffer is left
    /// intact for a retry with another separator.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the inner reader.
    pub async fn read_until(&mut self, separator: u8) -> std::io::Result<UntilOutcome> {
        let mut offset = 0;

        loop {
            if let Some(pos) = self.buf[offset..].iter().position(|b| *b == separator) {
                let index = offset + pos;
                if index > self.limit {
                    return Ok(UntilOutcome::LimitExceeded {
                        buffered: self.buf.len(),
                    });
                }
                return Ok(UntilOutcome::Found(self.buf.split_to(index + 1).freeze()));
            }

            offset = self.buf.len();
            if offset > self.limit {
                return Ok(UntilOutcome::LimitExceeded { buffered: offset });
            }

            if self.eof {
                return Ok(UntilOutcome::Eof(self.buf.split().freeze()));
            }

            self.buf.reserve(self.limit.clamp(1, DEFAULT_LINE_LIMIT));
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                self.eof = true;
            }
        }
    }

    /// Read one line terminated by `\n`, or by `\r` when no `\n` shows up
    /// within the limit.
    ///
    /// At end of stream the remaining bytes are returned unterminated; an
    /// empty result means the stream is exhausted. The `\r` fallback is
    /// attempted once per call.
    ///
    /// # Errors
    ///
    /// - [`AppError::LineTooLong`] when neither separator fits in the limit.
    /// - [`AppError::Io`] on read failures.
    pub async fn read_line(&mut self) -> Result<Bytes> {
        match self.read_until(b'\n').await? {
            UntilOutcome::Found(line) | UntilOutcome::Eof(line) => Ok(line),
            UntilOutcome::LimitExceeded { .. } => match self.read_until(b'\r').await? {
                UntilOutcome::Found(line) | UntilOutcome::Eof(line) => Ok(line),
                UntilOutcome::LimitExceeded { .. } => {
                    Err(AppError::LineTooLong { limit: self.limit })
                }
            },
        }
    }
}
