//! Worker pool, per-task processing and job-wide deduplication.

pub mod dedup;
pub mod manager;
pub mod worker;

pub use dedup::Deduplicator;
pub use manager::WorkerPool;
