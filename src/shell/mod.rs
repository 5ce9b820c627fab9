//! Shell command execution for build steps.
//!
//! Submodules:
//! - `env`: [`EnvOverlay`] merging caller variables onto the inherited
//!   environment.
//! - `line_reader`: [`SeparatorReader`], `\n` line splitting with a `\r`
//!   fallback for progress-bar output.
//! - `runner`: [`exec_command`], process-group scoped execution (Unix only).

pub mod env;
pub mod line_reader;
#[cfg(unix)]
pub mod runner;

pub use env::{interpolate_values, EnvOverlay};
pub use line_reader::{SeparatorReader, UntilOutcome, DEFAULT_LINE_LIMIT};
#[cfg(unix)]
pub use runner::{exec_command, ExecRequest, OutputLine, DEFAULT_TIMEOUT};
