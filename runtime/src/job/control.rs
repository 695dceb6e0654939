//! Shared job phase, counters and status snapshots.
//!
//! The phase lives in a `watch` channel so parked workers wake as soon as an
//! operator resumes or stops the job. Counters are atomics and the few
//! string fields sit behind short-lived locks, so [`JobControl::snapshot`]
//! never waits on in-flight work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Log lines kept for the status snapshot.
pub const LOG_TAIL_LINES: usize = 200;

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Running,
    Paused,
    Stopped,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Done | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of a job's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub tasks_total: u64,
    pub tasks_done: u64,
    pub tasks_failed: u64,
    pub listings_written: u64,
    pub parse_failures: u64,
    pub duplicates_skipped: u64,
    pub current_task: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub last_error: Option<String>,
    pub files: Vec<String>,
    pub log_file: Option<String>,
    pub recent_logs: Vec<String>,
}

#[derive(Default)]
struct Details {
    current_task: Option<String>,
    last_error: Option<String>,
    finished: Option<Instant>,
    files: Vec<String>,
    log_file: Option<String>,
    recent_logs: VecDeque<String>,
}

/// Single source of truth for one job's progress.
pub struct JobControl {
    phase: watch::Sender<Phase>,
    tasks_total: AtomicU64,
    tasks_done: AtomicU64,
    tasks_failed: AtomicU64,
    listings_written: AtomicU64,
    parse_failures: AtomicU64,
    duplicates_skipped: AtomicU64,
    started_at: DateTime<Utc>,
    started: Instant,
    details: Mutex<Details>,
}

impl Default for JobControl {
    fn default() -> Self {
        Self::new()
    }
}

impl JobControl {
    /// A fresh control state in the RUNNING phase.
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Running);
        Self {
            phase,
            tasks_total: AtomicU64::new(0),
            tasks_done: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            listings_written: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            duplicates_skipped: AtomicU64::new(0),
            started_at: Utc::now(),
            started: Instant::now(),
            details: Mutex::new(Details::default()),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    // --- operator requests ---

    /// RUNNING -> PAUSED. Returns the phase after the call.
    pub fn request_pause(&self) -> Phase {
        self.transition(|p| (p == Phase::Running).then_some(Phase::Paused))
    }

    /// PAUSED -> RUNNING.
    pub fn request_resume(&self) -> Phase {
        self.transition(|p| (p == Phase::Paused).then_some(Phase::Running))
    }

    /// RUNNING | PAUSED -> STOPPED.
    pub fn request_stop(&self) -> Phase {
        self.transition(|p| (!p.is_terminal()).then_some(Phase::Stopped))
    }

    // --- scheduler transitions ---

    /// Move to FAILED and record `reason`. A job already in a terminal phase
    /// keeps it, but the reason is still recorded.
    pub fn fail(&self, reason: impl Into<String>) -> Phase {
        self.details().last_error = Some(reason.into());
        self.transition(|p| (!p.is_terminal()).then_some(Phase::Failed))
    }

    /// Move to DONE unless the job was stopped or failed.
    pub fn finish(&self) -> Phase {
        self.transition(|p| (!p.is_terminal()).then_some(Phase::Done))
    }

    fn transition(&self, next: impl Fn(Phase) -> Option<Phase>) -> Phase {
        self.phase.send_if_modified(|phase| match next(*phase) {
            Some(target) => {
                *phase = target;
                true
            }
            None => false,
        });
        let phase = self.phase();
        if phase.is_terminal() {
            let mut details = self.details();
            details.current_task = None;
            details.finished.get_or_insert_with(Instant::now);
        }
        phase
    }

    /// Wait at a task boundary until the job is not paused.
    ///
    /// Returns `true` if the caller may dispatch another task.
    pub async fn wait_dispatchable(&self) -> bool {
        let mut rx = self.subscribe();
        let outcome = rx.wait_for(|p| *p != Phase::Paused).await;
        matches!(outcome.as_deref(), Ok(Phase::Running))
    }

    // --- counters ---

    pub fn set_tasks_total(&self, total: u64) {
        self.tasks_total.store(total, Ordering::SeqCst);
    }

    pub fn task_started(&self, label: impl Into<String>) {
        self.details().current_task = Some(label.into());
    }

    /// Count a finished task, successful or not.
    pub fn task_finished(&self, listings_written: u64, failed: bool) {
        self.listings_written
            .fetch_add(listings_written, Ordering::SeqCst);
        if failed {
            self.tasks_failed.fetch_add(1, Ordering::SeqCst);
        }
        self.tasks_done.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_parse_failures(&self, n: u64) {
        self.parse_failures.fetch_add(n, Ordering::SeqCst);
    }

    pub fn add_duplicates(&self, n: u64) {
        self.duplicates_skipped.fetch_add(n, Ordering::SeqCst);
    }

    // --- files and logs ---

    pub fn record_file(&self, name: &str) {
        self.details().files.push(name.to_string());
    }

    pub fn set_log_file(&self, name: &str) {
        self.details().log_file = Some(name.to_string());
    }

    /// Whether `name` is a file this job produced.
    pub fn owns_file(&self, name: &str) -> bool {
        let details = self.details();
        details.files.iter().any(|f| f == name) || details.log_file.as_deref() == Some(name)
    }

    pub fn push_log(&self, line: String) {
        let mut details = self.details();
        if details.recent_logs.len() == LOG_TAIL_LINES {
            details.recent_logs.pop_front();
        }
        details.recent_logs.push_back(line);
    }

    pub fn elapsed(&self) -> Duration {
        match self.details().finished {
            Some(at) => at.duration_since(self.started),
            None => self.started.elapsed(),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let phase = self.phase();
        let elapsed = self.elapsed();
        let details = self.details();
        StatusSnapshot {
            phase,
            tasks_total: self.tasks_total.load(Ordering::SeqCst),
            tasks_done: self.tasks_done.load(Ordering::SeqCst),
            tasks_failed: self.tasks_failed.load(Ordering::SeqCst),
            listings_written: self.listings_written.load(Ordering::SeqCst),
            parse_failures: self.parse_failures.load(Ordering::SeqCst),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::SeqCst),
            current_task: details.current_task.clone(),
            started_at: self.started_at,
            elapsed_seconds: (elapsed.as_secs_f64() * 10.0).round() / 10.0,
            last_error: details.last_error.clone(),
            files: details.files.clone(),
            log_file: details.log_file.clone(),
            recent_logs: details.recent_logs.iter().cloned().collect(),
        }
    }

    fn details(&self) -> MutexGuard<'_, Details> {
        self.details.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
