//! Per-job extraction log: append-only text file mirrored into the status tail.

use crate::error::{ExtractError, ExtractResult};
use crate::job::control::JobControl;
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

/// Severity of a job log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Append-only `extraction_<timestamp>.log` for one job.
///
/// Every line also goes to `tracing` and to the job's recent-log tail.
pub struct JobLog {
    file: Mutex<LineWriter<File>>,
    path: PathBuf,
    control: Arc<JobControl>,
}

impl JobLog {
    /// Open or create the job log inside `dir`.
    pub fn open(dir: &Path, timestamp: &str, control: Arc<JobControl>) -> ExtractResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| ExtractError::write(dir, e))?;

        let name = format!("extraction_{timestamp}.log");
        let path = dir.join(&name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ExtractError::write(&path, e))?;

        control.set_log_file(&name);
        Ok(Self {
            file: Mutex::new(LineWriter::new(file)),
            path,
            control,
        })
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message.as_ref());
    }

    /// Write one line. A failing log file never fails the job.
    pub fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => info!(target: "listing_harvester::job", "{message}"),
            LogLevel::Warn => warn!(target: "listing_harvester::job", "{message}"),
            LogLevel::Error => error!(target: "listing_harvester::job", "{message}"),
        }

        let line = format!(
            "{} {} {message}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level.as_str()
        );
        {
            let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = writeln!(file, "{line}") {
                warn!(path = %self.path.display(), "job log write failed: {e}");
            }
        }
        self.control.push_log(line);
    }
}
