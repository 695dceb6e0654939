//! `harvester run`: run one extraction job in the foreground.

use crate::acquisition::{RetryPolicy, SitemapFetcher};
use crate::catalog::{self, known_categories};
use crate::cli::output::{self, Styled};
use crate::cli::progress;
use crate::config::{CategorySource, JobConfig, OutputFormat};
use crate::job::{ExtractionJob, JobReport, Phase};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Options collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    /// `label=url` pairs, or bare labels from the built-in catalog.
    pub categories: Vec<String>,
    pub all: bool,
    pub format: Option<OutputFormat>,
    pub workers: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub max_rows_per_file: Option<u64>,
}

/// Merge a config file (if any) with command-line overrides.
pub fn build_config(opts: &RunOptions) -> Result<JobConfig> {
    let mut config = match &opts.config {
        Some(path) => JobConfig::from_file(path)?,
        None => JobConfig::new(".", Vec::new()),
    };

    if opts.all {
        for known in known_categories() {
            if !config.categories.iter().any(|c| c.label == known.label) {
                config.categories.push(known.source());
            }
        }
    }
    for arg in &opts.categories {
        let source = if arg.contains('=') {
            CategorySource::parse_pair(arg)?
        } else {
            catalog::find(arg)
                .map(|known| known.source())
                .with_context(|| {
                    format!("unknown category '{arg}' (see `harvester categories`, or pass LABEL=URL)")
                })?
        };
        config.categories.push(source);
    }

    if let Some(format) = opts.format {
        config.output_format = format;
    }
    if let Some(workers) = opts.workers {
        config.worker_count = workers;
    }
    if let Some(dir) = &opts.output_dir {
        config.output_dir = dir.clone();
    }
    if opts.max_rows_per_file.is_some() {
        config.max_rows_per_file = opts.max_rows_per_file;
    }

    config.validate()?;
    Ok(config)
}

/// Run the job, showing progress and turning Ctrl-C into a graceful stop.
pub async fn run(opts: RunOptions) -> Result<()> {
    let s = Styled::new();
    let config = build_config(&opts)?;
    let fetcher = SitemapFetcher::new(RetryPolicy::default())?;
    let job = ExtractionJob::new(config.clone(), Arc::new(fetcher))?;
    let control = job.control();

    if !output::is_quiet() && !output::is_json() {
        output::print_header(&s);
        output::print_section(&s, "Job");
        output::print_check(
            s.ok_sym(),
            "Categories",
            &config
                .categories
                .iter()
                .map(|c| c.label.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        );
        output::print_check(s.ok_sym(), "Output", &config.output_dir.display().to_string());
        output::print_check(
            s.ok_sym(),
            "Format / workers",
            &format!("{} / {}", config.output_format.extension(), config.worker_count),
        );
        eprintln!();
    }

    let bar = progress::create_job_progress(output::is_quiet() || output::is_json());
    let mut handle = tokio::spawn(job.run());
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut stop_requested = false;

    let result = loop {
        tokio::select! {
            joined = &mut handle => break joined.context("extraction task panicked")?,
            _ = tokio::signal::ctrl_c(), if !stop_requested => {
                stop_requested = true;
                control.request_stop();
                bar.println("  Stop requested, finishing in-flight sitemaps...");
            }
            _ = ticker.tick() => progress::update(&bar, &control.snapshot()),
        }
    };
    progress::finish(&bar, &control.snapshot());

    match result {
        Ok(report) => {
            print_summary(&s, &report);
            Ok(())
        }
        Err(e) => {
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "phase": Phase::Failed,
                    "error": e.to_string(),
                }));
            } else {
                eprintln!();
                eprintln!("  {} {}", s.fail_sym(), s.red(&e.to_string()));
            }
            Err(e.into())
        }
    }
}

fn print_summary(s: &Styled, report: &JobReport) {
    if output::is_json() {
        if let Ok(value) = serde_json::to_value(report) {
            output::print_json(&value);
        }
        return;
    }
    if output::is_quiet() {
        return;
    }

    let symbol = match report.phase {
        Phase::Done => s.ok_sym(),
        Phase::Stopped => s.warn_sym(),
        _ => s.fail_sym(),
    };
    eprintln!();
    output::print_section(s, "Summary");
    let phase = match report.phase {
        Phase::Done => s.green(report.phase.as_str()),
        Phase::Stopped => s.yellow(report.phase.as_str()),
        _ => s.red(report.phase.as_str()),
    };
    output::print_check(symbol, "Phase", &phase);
    output::print_check(
        symbol,
        "Execution time",
        &output::format_duration(report.elapsed.as_secs()),
    );
    output::print_check(
        symbol,
        "Listings",
        &output::format_count(report.listings_written),
    );
    output::print_check(
        symbol,
        "Sitemaps",
        &format!(
            "{} of {} processed, {} failed",
            report.tasks_done, report.tasks_total, report.tasks_failed
        ),
    );
    if report.duplicates_skipped > 0 || report.parse_failures > 0 {
        output::print_detail(&s.dim(&format!(
            "{} duplicates skipped, {} unparsable URLs",
            output::format_count(report.duplicates_skipped),
            output::format_count(report.parse_failures)
        )));
    }
    output::print_check(symbol, "Files", &report.files.len().to_string());
    for file in &report.files {
        output::print_detail(&file.display().to_string());
    }
    if let Some(log) = &report.log_file {
        output::print_check(symbol, "Log", &log.display().to_string());
    }
}
