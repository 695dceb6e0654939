//! Bounded worker pool over a shared task queue.
//!
//! Workers check the job's dispatch gate between tasks only: a pause lets
//! in-flight tasks finish before the worker parks, and a stop leaves the
//! remaining queue undispatched.

use crate::acquisition::resolver::ChildSitemapTask;
use crate::error::{ExtractError, ExtractResult};
use crate::pool::worker::{process_task, WorkerContext};
use crate::stealth::behavior::{sleep_polite, DelayRange};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, warn};

type TaskQueue = Arc<Mutex<VecDeque<ChildSitemapTask>>>;

/// Dispatches child sitemap tasks to a fixed number of workers.
pub struct WorkerPool {
    ctx: Arc<WorkerContext>,
    delay: DelayRange,
}

struct Shared {
    ctx: Arc<WorkerContext>,
    queue: TaskQueue,
    /// Undispatched-or-in-flight tasks per category.
    pending: HashMap<String, AtomicUsize>,
    fatal: StdMutex<Option<ExtractError>>,
    delay: DelayRange,
}

impl WorkerPool {
    pub fn new(ctx: Arc<WorkerContext>, delay: DelayRange) -> Self {
        Self { ctx, delay }
    }

    /// Run every task with at most `worker_count` in flight.
    ///
    /// Returns once the queue is drained or the job leaves the running
    /// phases. All output files are closed before returning. The first fatal
    /// error any worker hit is returned.
    pub async fn run(&self, tasks: Vec<ChildSitemapTask>, worker_count: usize) -> ExtractResult<()> {
        let control = &self.ctx.control;
        control.set_tasks_total(tasks.len() as u64);

        let mut pending: HashMap<String, AtomicUsize> = HashMap::new();
        for task in &tasks {
            pending
                .entry(task.category.clone())
                .or_insert_with(|| AtomicUsize::new(0))
                .fetch_add(1, Ordering::SeqCst);
        }

        let workers = worker_count.clamp(1, tasks.len().max(1));
        let shared = Arc::new(Shared {
            ctx: Arc::clone(&self.ctx),
            queue: Arc::new(Mutex::new(VecDeque::from(tasks))),
            pending,
            fatal: StdMutex::new(None),
            delay: self.delay,
        });

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move { worker_loop(id, shared).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!("worker task aborted: {e}");
                control.fail(format!("worker aborted: {e}"));
            }
        }

        let discarded = {
            let mut queue = shared.queue.lock().await;
            let n = queue.len();
            queue.clear();
            n
        };
        if discarded > 0 {
            self.ctx.log.info(format!(
                "job {}: discarded {discarded} undispatched task(s)",
                control.phase().as_str().to_lowercase()
            ));
        }

        let writer = Arc::clone(&self.ctx.writer);
        let closed = tokio::task::spawn_blocking(move || writer.close_all()).await;
        match closed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => record_fatal(&shared, e),
            Err(e) => warn!("closing output files panicked: {e}"),
        }

        let fatal = shared
            .fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match fatal {
            Some(e) => Err(e),
            None => {
                control.finish();
                Ok(())
            }
        }
    }
}

async fn worker_loop(id: usize, shared: Arc<Shared>) {
    let ctx = &shared.ctx;
    let mut first = true;

    loop {
        if shared.queue.lock().await.is_empty() {
            break;
        }
        if !first {
            sleep_polite(shared.delay).await;
        }
        if !ctx.control.wait_dispatchable().await {
            debug!(worker = id, phase = %ctx.control.phase(), "worker leaving at task boundary");
            break;
        }
        let Some(task) = shared.queue.lock().await.pop_front() else {
            break;
        };
        first = false;

        ctx.control
            .task_started(format!("{}: {}", task.category, task.url));

        match process_task(ctx, &task).await {
            Ok(outcome) => {
                ctx.control.add_duplicates(outcome.duplicates);
                ctx.control.add_parse_failures(outcome.parse_failures);
                ctx.control.task_finished(outcome.admitted, false);
                ctx.log.info(format!(
                    "{}: {} admitted, {} duplicate, {} unparsable of {} URLs in {}",
                    task.category,
                    outcome.admitted,
                    outcome.duplicates,
                    outcome.parse_failures,
                    outcome.urls,
                    task.url
                ));
            }
            Err(e) if e.is_fatal() => {
                ctx.control.task_finished(0, true);
                record_fatal(&shared, e);
                break;
            }
            Err(e) => {
                ctx.control.task_finished(0, true);
                ctx.log.error(format!("{}: task failed: {e}", task.category));
            }
        }

        if let Some(counter) = shared.pending.get(&task.category) {
            if counter.fetch_sub(1, Ordering::SeqCst) == 1 {
                close_category(&shared, &task.category).await;
            }
        }
    }
}

async fn close_category(shared: &Shared, category: &str) {
    let writer = Arc::clone(&shared.ctx.writer);
    let label = category.to_string();
    match tokio::task::spawn_blocking(move || writer.close(&label)).await {
        Ok(Ok(())) => shared
            .ctx
            .log
            .info(format!("{category}: all child sitemaps processed, output closed")),
        Ok(Err(e)) => record_fatal(shared, e),
        Err(e) => warn!(category, "closing output file panicked: {e}"),
    }
}

fn record_fatal(shared: &Shared, error: ExtractError) {
    shared.ctx.log.error(format!("fatal: {error}"));
    shared.ctx.control.fail(error.to_string());
    shared
        .fatal
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_insert(error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::resolver::tests::StaticSource;
    use crate::audit::JobLog;
    use crate::config::OutputFormat;
    use crate::job::control::{JobControl, Phase};
    use crate::output::IncrementalWriter;
    use crate::pool::dedup::Deduplicator;
    use std::path::Path;

    fn urlset(ids: std::ops::Range<u32>) -> String {
        let mut xml = String::from("<urlset>");
        for id in ids {
            xml.push_str(&format!(
                "<url><loc>https://www.zillow.com/homedetails/{id}-Main-St-Town-TX-75001/{id}_zpid/</loc></url>"
            ));
        }
        xml.push_str("</urlset>");
        xml
    }

    fn pool(source: StaticSource, dir: &Path) -> (WorkerPool, Arc<WorkerContext>) {
        let control = Arc::new(JobControl::new());
        let log = Arc::new(JobLog::open(dir, "20240101_000000", Arc::clone(&control)).unwrap());
        let ctx = Arc::new(WorkerContext {
            source: Arc::new(source),
            dedup: Arc::new(Deduplicator::new()),
            writer: Arc::new(IncrementalWriter::new(
                dir,
                OutputFormat::Json,
                "20240101_000000",
                None,
            )),
            control,
            log,
        });
        (WorkerPool::new(Arc::clone(&ctx), DelayRange::none()), ctx)
    }

    fn task(category: &str, url: &str) -> ChildSitemapTask {
        ChildSitemapTask {
            category: category.into(),
            url: url.into(),
        }
    }

    #[tokio::test]
    async fn test_runs_all_tasks_and_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticSource::default()
            .with("https://x/a-1.xml", urlset(0..10))
            .with("https://x/a-2.xml", urlset(10..20))
            .with("https://x/b-1.xml", urlset(15..25));
        let (pool, ctx) = pool(source, dir.path());

        pool.run(
            vec![
                task("a", "https://x/a-1.xml"),
                task("a", "https://x/a-2.xml"),
                task("b", "https://x/b-1.xml"),
                task("b", "https://x/missing.xml"),
            ],
            3,
        )
        .await
        .unwrap();

        let snap = ctx.control.snapshot();
        assert_eq!(snap.phase, Phase::Done);
        assert_eq!(snap.tasks_total, 4);
        assert_eq!(snap.tasks_done, 4);
        assert_eq!(snap.tasks_failed, 1);
        assert_eq!(snap.listings_written, 25);
        assert_eq!(snap.duplicates_skipped, 5);
        assert_eq!(ctx.dedup.len(), 25);
    }

    #[tokio::test]
    async fn test_stop_before_dispatch_discards_queue() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticSource::default().with("https://x/a-1.xml", urlset(0..3));
        let (pool, ctx) = pool(source, dir.path());
        ctx.control.request_stop();

        pool.run(vec![task("a", "https://x/a-1.xml")], 2).await.unwrap();

        let snap = ctx.control.snapshot();
        assert_eq!(snap.phase, Phase::Stopped);
        assert_eq!(snap.tasks_done, 0);
        assert!(snap.recent_logs.iter().any(|l| l.contains("discarded 1")));
    }

    #[tokio::test]
    async fn test_write_failure_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"").unwrap();

        let control = Arc::new(JobControl::new());
        let log = Arc::new(JobLog::open(dir.path(), "20240101_000000", Arc::clone(&control)).unwrap());
        let ctx = Arc::new(WorkerContext {
            source: Arc::new(StaticSource::default().with("https://x/a-1.xml", urlset(0..3))),
            dedup: Arc::new(Deduplicator::new()),
            writer: Arc::new(IncrementalWriter::new(
                &blocker,
                OutputFormat::Csv,
                "20240101_000000",
                None,
            )),
            control,
            log,
        });
        let pool = WorkerPool::new(Arc::clone(&ctx), DelayRange::none());

        let err = pool
            .run(vec![task("a", "https://x/a-1.xml")], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Write { .. }));
        let snap = ctx.control.snapshot();
        assert_eq!(snap.phase, Phase::Failed);
        assert!(snap.last_error.is_some());
    }
}
