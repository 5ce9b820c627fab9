//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error enumeration covering the framing, shell, and configuration failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Transport or OS-level failure, propagated unchanged.
    Io(std::io::Error),
    /// A read, write, flush, or process wait exceeded its deadline.
    Timeout(String),
    /// The stream ended before a complete frame was assembled.
    ///
    /// `partial` holds whatever bytes of the header or body had already been
    /// read. It is diagnostic only and never a valid frame.
    ConnectionClosed {
        /// Bytes received before the stream closed.
        partial: Vec<u8>,
    },
    /// Malformed frame header, or a frame above the codec's configured cap.
    Protocol(String),
    /// Neither `\n` nor `\r` appeared within the line reader's limit.
    LineTooLong {
        /// The limit that was exceeded, in bytes.
        limit: usize,
    },
    /// A shell command exited with a non-zero status.
    CommandExecution {
        /// Exit status reported by the operating system.
        exit_code: Option<i32>,
        /// Combined stdout and stderr captured up to the exit.
        output: String,
    },
    /// Background worker pool failure (shut down, or a task panicked).
    Worker(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::ConnectionClosed { partial } => write!(
                f,
                "connection closed: stream ended after {} byte(s) of an incomplete frame",
                partial.len()
            ),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::LineTooLong { limit } => {
                write!(f, "line too long: no line separator within {limit} bytes")
            }
            Self::CommandExecution { exit_code, output } => match exit_code {
                Some(code) => write!(f, "command failed with exit code {code}: {output}"),
                None => write!(f, "command failed: {output}"),
            },
            Self::Worker(msg) => write!(f, "worker: {msg}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
