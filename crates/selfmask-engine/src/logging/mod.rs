//! Logger setup for binaries built on the engine.
//!
//! Library code only uses the `log` macros.

mod init;

pub use init::{init_logging, LoggingConfig};
