//! CLI subcommand implementations for the `harvester` binary.

pub mod categories_cmd;
pub mod output;
pub mod progress;
pub mod run_cmd;
pub mod serve_cmd;
