//! Streaming output: one CSV or JSON file per category.

pub mod csv_sink;
pub mod json_sink;
pub mod writer;

pub use writer::{file_name, sanitize_label, FileListener, IncrementalWriter};
