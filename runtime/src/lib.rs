//! Listing harvester: concurrent extraction of property listings from
//! nested XML sitemaps into deduplicated per-category CSV/JSON files.
//!
//! The engine lives in [`job`]: an [`job::ExtractionJob`] resolves category
//! sitemap indexes, hands child sitemaps to a bounded [`pool::WorkerPool`],
//! parses listing URLs, admits each property once across the whole job and
//! streams rows through [`output::IncrementalWriter`]. Operators pause,
//! resume and stop it through [`job::JobControl`].

pub mod acquisition;
pub mod audit;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod job;
pub mod output;
pub mod pool;
pub mod server;
pub mod stealth;

pub use config::{CategorySource, JobConfig, OutputFormat};
pub use error::{ExtractError, ExtractResult};
pub use job::{ExtractionJob, JobManager, JobReport, Phase, StatusSnapshot};
