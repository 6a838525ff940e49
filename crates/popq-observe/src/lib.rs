//! Tracing initialization for popq binaries and tests.

mod config;
pub use config::{LoggerConfig, LoggerFormat};

mod error;
pub use error::LoggerError;

mod init;
pub use init::init_logger;
