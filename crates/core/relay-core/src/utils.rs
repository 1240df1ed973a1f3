//! Utility functions and helpers

pub mod logger;

pub use self::logger::{init_logging, subscribe_logs, LogEvent};
