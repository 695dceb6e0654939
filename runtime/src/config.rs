//! Job configuration as accepted from the control surface or the CLI.
//!
//! Field names follow the external JSON contract (`outputDir`,
//! `sitemapURL`, `workerCount`, ...); snake_case aliases are accepted too.

use crate::error::{ExtractError, ExtractResult};
use crate::stealth::behavior::DelayRange;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Upper bound on concurrent workers.
pub const MAX_WORKERS: usize = 64;

/// Workers used when the configuration does not say.
pub const DEFAULT_WORKERS: usize = 5;

/// Output file flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(ExtractError::Config(format!(
                "unknown output format '{other}' (expected csv or json)"
            ))),
        }
    }
}

/// One selected category: a label and its parent sitemap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySource {
    pub label: String,
    #[serde(rename = "sitemapURL", alias = "sitemap_url", alias = "sitemapUrl")]
    pub sitemap_url: String,
}

impl CategorySource {
    pub fn new(label: impl Into<String>, sitemap_url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sitemap_url: sitemap_url.into(),
        }
    }

    /// Parse a `label=url` pair as given on the command line.
    pub fn parse_pair(pair: &str) -> ExtractResult<Self> {
        let (label, url) = pair.split_once('=').ok_or_else(|| {
            ExtractError::Config(format!("expected LABEL=URL, got '{pair}'"))
        })?;
        Ok(Self::new(label.trim(), url.trim()))
    }
}

/// Everything needed to start one extraction job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    #[serde(default = "default_output_dir", alias = "output_dir")]
    pub output_dir: PathBuf,

    pub categories: Vec<CategorySource>,

    #[serde(default, alias = "output_format")]
    pub output_format: OutputFormat,

    #[serde(default = "default_workers", alias = "worker_count", alias = "workers")]
    pub worker_count: usize,

    /// Start a new part file once a category file holds this many rows.
    #[serde(default, alias = "max_rows_per_file")]
    pub max_rows_per_file: Option<u64>,

    /// Pause each worker takes between its own consecutive fetches.
    #[serde(default, alias = "request_delay_ms")]
    pub request_delay_ms: DelayRange,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl JobConfig {
    pub fn new(output_dir: impl Into<PathBuf>, categories: Vec<CategorySource>) -> Self {
        Self {
            output_dir: output_dir.into(),
            categories,
            output_format: OutputFormat::default(),
            worker_count: DEFAULT_WORKERS,
            max_rows_per_file: None,
            request_delay_ms: DelayRange::default(),
        }
    }

    /// Load a configuration from a JSON file.
    pub fn from_file(path: &Path) -> ExtractResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExtractError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> ExtractResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| ExtractError::Config(format!("malformed job configuration: {e}")))
    }

    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> ExtractResult<()> {
        if self.categories.is_empty() {
            return Err(ExtractError::Config("no categories selected".into()));
        }
        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(ExtractError::Config(format!(
                "worker count must be between 1 and {MAX_WORKERS}, got {}",
                self.worker_count
            )));
        }
        if !self.request_delay_ms.is_valid() {
            return Err(ExtractError::Config(format!(
                "request delay min ({}ms) exceeds max ({}ms)",
                self.request_delay_ms.min, self.request_delay_ms.max
            )));
        }
        if self.max_rows_per_file == Some(0) {
            return Err(ExtractError::Config("maxRowsPerFile must be at least 1".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ExtractError::Config("output directory is empty".into()));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.label.trim().is_empty() {
                return Err(ExtractError::Config("category label is empty".into()));
            }
            if !seen.insert(category.label.as_str()) {
                return Err(ExtractError::Config(format!(
                    "duplicate category label '{}'",
                    category.label
                )));
            }
            let url = url::Url::parse(&category.sitemap_url).map_err(|e| {
                ExtractError::Config(format!(
                    "category '{}' has an invalid sitemap URL: {e}",
                    category.label
                ))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ExtractError::Config(format!(
                    "category '{}' sitemap URL must be http(s)",
                    category.label
                )));
            }
        }
        Ok(())
    }
}
