//! One extraction run from configuration to closed output files.

use crate::acquisition::fetcher::DocumentSource;
use crate::acquisition::resolver::SitemapResolver;
use crate::audit::JobLog;
use crate::config::JobConfig;
use crate::error::ExtractResult;
use crate::job::control::{JobControl, Phase};
use crate::output::IncrementalWriter;
use crate::pool::dedup::Deduplicator;
use crate::pool::manager::WorkerPool;
use crate::pool::worker::WorkerContext;
use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Summary of a finished job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub phase: Phase,
    pub tasks_total: u64,
    pub tasks_done: u64,
    pub tasks_failed: u64,
    pub listings_written: u64,
    pub parse_failures: u64,
    pub duplicates_skipped: u64,
    pub files: Vec<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub elapsed: Duration,
}

/// A configured job with its own control state and dedup set.
pub struct ExtractionJob {
    config: JobConfig,
    source: Arc<dyn DocumentSource>,
    control: Arc<JobControl>,
    dedup: Arc<Deduplicator>,
}

impl ExtractionJob {
    /// Validate `config` and prepare a job in the RUNNING phase.
    pub fn new(config: JobConfig, source: Arc<dyn DocumentSource>) -> ExtractResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            control: Arc::new(JobControl::new()),
            dedup: Arc::new(Deduplicator::new()),
        })
    }

    /// Handle for status polling and pause/resume/stop.
    pub fn control(&self) -> Arc<JobControl> {
        Arc::clone(&self.control)
    }

    /// Resolve every category, then run the worker pool to completion.
    ///
    /// Resolution happens before any worker starts; a resolution or write
    /// failure leaves the job FAILED and is returned as the error.
    pub async fn run(self) -> ExtractResult<JobReport> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let dir = self.config.output_dir.clone();

        let log = match JobLog::open(&dir, &timestamp, Arc::clone(&self.control)) {
            Ok(log) => Arc::new(log),
            Err(e) => {
                self.control.fail(e.to_string());
                return Err(e);
            }
        };
        log.info(format!(
            "starting extraction: {} categor{}, {} worker(s), {} output",
            self.config.categories.len(),
            if self.config.categories.len() == 1 { "y" } else { "ies" },
            self.config.worker_count,
            self.config.output_format.extension()
        ));

        let resolver = SitemapResolver::new(Arc::clone(&self.source));
        let tasks = match resolver.resolve_all(&self.config.categories).await {
            Ok(tasks) => tasks,
            Err(e) => {
                log.error(format!("{e}"));
                self.control.fail(e.to_string());
                return Err(e);
            }
        };
        log.info(format!("resolved {} child sitemap(s)", tasks.len()));

        let control = Arc::clone(&self.control);
        let writer = Arc::new(
            IncrementalWriter::new(
                &dir,
                self.config.output_format,
                &timestamp,
                self.config.max_rows_per_file,
            )
            .with_listener(Arc::new(move |name: &str| control.record_file(name))),
        );
        for category in &self.config.categories {
            if let Err(e) = writer.open(&category.label) {
                log.error(format!("{e}"));
                self.control.fail(e.to_string());
                return Err(e);
            }
        }

        let ctx = Arc::new(WorkerContext {
            source: Arc::clone(&self.source),
            dedup: Arc::clone(&self.dedup),
            writer,
            control: Arc::clone(&self.control),
            log: Arc::clone(&log),
        });
        WorkerPool::new(ctx, self.config.request_delay_ms)
            .run(tasks, self.config.worker_count)
            .await?;

        let report = self.report();
        log.info(format!(
            "extraction {}: {} listings in {} file(s), {} of {} tasks failed, {:.1}s",
            report.phase.as_str().to_lowercase(),
            report.listings_written,
            report.files.len(),
            report.tasks_failed,
            report.tasks_total,
            report.elapsed.as_secs_f64()
        ));
        Ok(report)
    }

    fn report(&self) -> JobReport {
        let snap = self.control.snapshot();
        let dir = &self.config.output_dir;
        JobReport {
            phase: snap.phase,
            tasks_total: snap.tasks_total,
            tasks_done: snap.tasks_done,
            tasks_failed: snap.tasks_failed,
            listings_written: snap.listings_written,
            parse_failures: snap.parse_failures,
            duplicates_skipped: snap.duplicates_skipped,
            files: snap.files.iter().map(|f| dir.join(f)).collect(),
            log_file: snap.log_file.map(|f| dir.join(f)),
            elapsed: self.control.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::resolver::tests::{index_xml, StaticSource};
    use crate::config::CategorySource;
    use crate::error::ExtractError;
    use crate::stealth::behavior::DelayRange;

    fn config(dir: &std::path::Path, categories: Vec<CategorySource>) -> JobConfig {
        let mut config = JobConfig::new(dir, categories);
        config.request_delay_ms = DelayRange::none();
        config
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let result = ExtractionJob::new(
            JobConfig::new("/tmp", Vec::new()),
            Arc::new(StaticSource::default()),
        );
        assert!(matches!(result, Err(ExtractError::Config(_))));
    }

    #[tokio::test]
    async fn test_resolution_failure_starts_no_workers() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticSource::default().with("https://x/a.xml", index_xml(&["https://x/a-1.xml"]));
        let job = ExtractionJob::new(
            config(
                dir.path(),
                vec![
                    CategorySource::new("a", "https://x/a.xml"),
                    CategorySource::new("b", "https://x/b-missing.xml"),
                ],
            ),
            Arc::new(source),
        )
        .unwrap();
        let control = job.control();

        let err = job.run().await.unwrap_err();
        assert!(matches!(err, ExtractError::Resolution { .. }));
        let snap = control.snapshot();
        assert_eq!(snap.phase, Phase::Failed);
        assert_eq!(snap.tasks_total, 0);
        assert!(snap.files.is_empty());
    }

    #[tokio::test]
    async fn test_empty_category_still_gets_a_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticSource::default()
            .with("https://x/a.xml", index_xml(&["https://x/a-1.xml"]))
            .with("https://x/a-1.xml", "<urlset></urlset>");
        let mut cfg = config(dir.path(), vec![CategorySource::new("a", "https://x/a.xml")]);
        cfg.output_format = crate::config::OutputFormat::Json;

        let report = ExtractionJob::new(cfg, Arc::new(source))
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(report.phase, Phase::Done);
        assert_eq!(report.files.len(), 1);
        let text = std::fs::read_to_string(&report.files[0]).unwrap();
        assert_eq!(text, "[]\n");
        assert!(report.log_file.unwrap().exists());
    }
}
