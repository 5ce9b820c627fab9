#![forbid(unsafe_code)]

//! Length-prefixed socket framing and process-group scoped shell execution
//! for build runners.

pub mod config;
pub mod errors;
pub mod framing;
pub mod shell;
pub mod util;
pub mod workers;

pub use config::BuildwireConfig;
pub use errors::{AppError, Result};
