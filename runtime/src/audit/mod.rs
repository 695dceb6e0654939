//! Job-scoped event logging.

pub mod logger;

pub use logger::{JobLog, LogLevel};
