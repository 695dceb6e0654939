//! Owns at most one active extraction job for the control surfaces.

use crate::acquisition::fetcher::DocumentSource;
use crate::config::JobConfig;
use crate::error::{ExtractError, ExtractResult};
use crate::job::control::{JobControl, Phase, StatusSnapshot};
use crate::job::extraction::{ExtractionJob, JobReport};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct ActiveJob {
    control: Arc<JobControl>,
    output_dir: PathBuf,
    handle: Option<JoinHandle<ExtractResult<JobReport>>>,
    /// Set by the background task once `run` has returned. The phase turns
    /// terminal on stop while in-flight tasks are still writing.
    finished: Arc<AtomicBool>,
}

impl ActiveJob {
    fn is_running(&self) -> bool {
        !self.finished.load(Ordering::Acquire)
    }
}

/// Starts jobs in the background and routes operator requests to the
/// current one. The last job stays visible after it finishes.
pub struct JobManager {
    source: Arc<dyn DocumentSource>,
    current: Mutex<Option<ActiveJob>>,
}

impl JobManager {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self {
            source,
            current: Mutex::new(None),
        }
    }

    pub fn source(&self) -> Arc<dyn DocumentSource> {
        Arc::clone(&self.source)
    }

    /// Validate and launch a job. Fails until the previous job's workers
    /// have all exited, even if it was already stopped.
    pub async fn start(&self, config: JobConfig) -> ExtractResult<StatusSnapshot> {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(ActiveJob::is_running) {
            return Err(ExtractError::AlreadyRunning);
        }

        let output_dir = config.output_dir.clone();
        let job = ExtractionJob::new(config, Arc::clone(&self.source))?;
        let control = job.control();
        info!(output_dir = %output_dir.display(), "starting extraction job");

        let finished = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&finished);
        let handle = tokio::spawn(async move {
            let result = job.run().await;
            if let Err(e) = &result {
                warn!("extraction job ended with error: {e}");
            }
            done.store(true, Ordering::Release);
            result
        });

        let snapshot = control.snapshot();
        *current = Some(ActiveJob {
            control,
            output_dir,
            handle: Some(handle),
            finished,
        });
        Ok(snapshot)
    }

    pub async fn pause(&self) -> Option<Phase> {
        self.with_control(|c| c.request_pause()).await
    }

    pub async fn resume(&self) -> Option<Phase> {
        self.with_control(|c| c.request_resume()).await
    }

    pub async fn stop(&self) -> Option<Phase> {
        self.with_control(|c| c.request_stop()).await
    }

    /// Snapshot of the current or most recent job.
    pub async fn status(&self) -> Option<StatusSnapshot> {
        self.with_control(|c| c.snapshot()).await
    }

    /// Full path of a file the current or last job produced, by bare name.
    pub async fn output_file(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(|c: char| c == '/' || c == '\\') || name.contains("..") {
            return None;
        }
        let current = self.current.lock().await;
        let active = current.as_ref()?;
        active
            .control
            .owns_file(name)
            .then(|| active.output_dir.join(name))
    }

    /// Wait for the current job's background task and return its result.
    /// Returns `None` if there is no job or it was already joined.
    pub async fn join(&self) -> Option<ExtractResult<JobReport>> {
        let handle = self.current.lock().await.as_mut()?.handle.take()?;
        match handle.await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("extraction job task panicked: {e}");
                None
            }
        }
    }

    async fn with_control<T>(&self, f: impl FnOnce(&JobControl) -> T) -> Option<T> {
        let current = self.current.lock().await;
        current.as_ref().map(|active| f(&active.control))
    }
}
