//! Logging utilities.
//!
//! Libraries in this workspace only talk to the `log` facade. Binaries call
//! [`init_logging`] once at startup to install `env_logger` behind it.

mod init;

pub use init::{init_logging, LoggingConfig};
