//! Process-wide logger setup.
//!
//! Library code logs through the `log` macros; binaries call [`init_logging`] once.

mod init;

pub use init::{init_logging, LoggingConfig};
