//! Extraction jobs: control state, the run itself, and the single-job manager.

pub mod control;
pub mod extraction;
pub mod manager;

pub use control::{JobControl, Phase, StatusSnapshot};
pub use extraction::{ExtractionJob, JobReport};
pub use manager::JobManager;
