//! Per-category output files with optional size-based rotation.
//!
//! Each category owns exactly one open file at a time. Files are named
//! `listings_<category>_<timestamp>.<ext>`; rotated parts append
//! `_part<N>`. Existing files are never overwritten: if a name is taken
//! (another job in the same directory and second), `-2`, `-3`, ... is
//! appended before the extension. Every file is left in a valid state when
//! closed, and any file still open when the writer is dropped is closed then.

use crate::config::OutputFormat;
use crate::error::{ExtractError, ExtractResult};
use crate::extraction::PropertyListing;
use crate::output::csv_sink::CsvSink;
use crate::output::json_sink::JsonArraySink;
use dashmap::DashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Called with the bare file name of every file the writer creates.
pub type FileListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Collision suffixes tried before giving up on a file name.
const MAX_NAME_COPIES: u32 = 100;

enum Sink {
    Csv(CsvSink<File>),
    Json(JsonArraySink<BufWriter<File>>),
}

impl Sink {
    fn create(path: &Path, format: OutputFormat) -> io::Result<Self> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        Ok(match format {
            OutputFormat::Csv => Self::Csv(CsvSink::new(file)?),
            OutputFormat::Json => Self::Json(JsonArraySink::new(BufWriter::new(file))),
        })
    }

    fn write_rows(&mut self, rows: &[PropertyListing]) -> io::Result<()> {
        match self {
            Self::Csv(sink) => sink.write_rows(rows),
            Self::Json(sink) => sink.write_rows(rows),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self {
            Self::Csv(sink) => sink.close(),
            Self::Json(sink) => sink.close(),
        }
    }
}

struct CategoryFile {
    /// 1-based part number of the current (or last) file.
    part: u32,
    rows_in_part: u64,
    path: PathBuf,
    sink: Option<Sink>,
}

/// Streams listings into one file per category.
pub struct IncrementalWriter {
    dir: PathBuf,
    format: OutputFormat,
    timestamp: String,
    max_rows_per_file: Option<u64>,
    categories: DashMap<String, Arc<Mutex<CategoryFile>>>,
    listener: Option<FileListener>,
}

impl IncrementalWriter {
    /// `timestamp` is the `YYYYMMDD_HHMMSS` stamp shared by all files of a job.
    pub fn new(
        dir: impl Into<PathBuf>,
        format: OutputFormat,
        timestamp: impl Into<String>,
        max_rows_per_file: Option<u64>,
    ) -> Self {
        Self {
            dir: dir.into(),
            format,
            timestamp: timestamp.into(),
            max_rows_per_file,
            categories: DashMap::new(),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: FileListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Preferred path of a category's given part, before any collision suffix.
    pub fn path_for(&self, category: &str, part: u32) -> PathBuf {
        self.dir
            .join(file_name(category, &self.timestamp, part, self.format))
    }


    /// Create the category's first file. A no-op if it is already open.
    pub fn open(&self, category: &str) -> ExtractResult<()> {
        let entry = self.entry(category);
        let mut file = lock(&entry);
        if file.sink.is_none() {
            self.start_part(category, &mut file)?;
        }
        Ok(())
    }

    /// Append a batch, rotating to a new part file whenever the current one is full.
    pub fn append_rows(&self, category: &str, rows: &[PropertyListing]) -> ExtractResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let entry = self.entry(category);
        let mut file = lock(&entry);
        let mut remaining = rows;

        while !remaining.is_empty() {
            let full = self
                .max_rows_per_file
                .is_some_and(|max| file.rows_in_part >= max);
            if file.sink.is_none() || full {
                self.finish_part(&mut file)?;
                self.start_part(category, &mut file)?;
            }

            let room = match self.max_rows_per_file {
                Some(max) => usize::try_from(max - file.rows_in_part).unwrap_or(usize::MAX),
                None => usize::MAX,
            };
            let (batch, rest) = remaining.split_at(room.min(remaining.len()));

            let path = file.path.clone();
            if let Some(sink) = file.sink.as_mut() {
                sink.write_rows(batch)
                    .map_err(|e| ExtractError::write(&path, e))?;
            }
            file.rows_in_part += batch.len() as u64;
            remaining = rest;
        }
        Ok(())
    }

    /// Finalize the category's current file.
    pub fn close(&self, category: &str) -> ExtractResult<()> {
        let Some(entry) = self.categories.get(category).map(|e| Arc::clone(e.value())) else {
            return Ok(());
        };
        let mut file = lock(&entry);
        self.finish_part(&mut file)
    }

    /// Finalize every open file. Returns the first error after trying all of them.
    pub fn close_all(&self) -> ExtractResult<()> {
        let entries: Vec<_> = self
            .categories
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        let mut first_error = None;
        for entry in entries {
            let mut file = lock(&entry);
            if let Err(e) = self.finish_part(&mut file) {
                warn!("closing output file failed: {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn entry(&self, category: &str) -> Arc<Mutex<CategoryFile>> {
        let entry = self
            .categories
            .entry(category.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(CategoryFile {
                    part: 0,
                    rows_in_part: 0,
                    path: PathBuf::new(),
                    sink: None,
                }))
            });
        Arc::clone(entry.value())
    }

    fn start_part(&self, category: &str, file: &mut CategoryFile) -> ExtractResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ExtractError::write(&self.dir, e))?;

        let part = file.part + 1;
        let (path, sink) = self.create_unique(category, part)?;
        debug!(category, path = %path.display(), "opened output file");

        file.part = part;
        file.rows_in_part = 0;
        file.path = path;
        file.sink = Some(sink);

        if let (Some(listener), Some(name)) = (&self.listener, file.path.file_name()) {
            listener(&name.to_string_lossy());
        }
        Ok(())
    }

    fn create_unique(&self, category: &str, part: u32) -> ExtractResult<(PathBuf, Sink)> {
        let preferred = self.path_for(category, part);
        let mut path = preferred.clone();
        for copy in 2..=MAX_NAME_COPIES + 1 {
            match Sink::create(&path, self.format) {
                Ok(sink) => return Ok((path, sink)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    path = self.dir.join(with_copy_suffix(
                        &file_name(category, &self.timestamp, part, self.format),
                        copy,
                    ));
                }
                Err(e) => return Err(ExtractError::write(&path, e)),
            }
        }
        Err(ExtractError::write(
            &preferred,
            io::Error::new(io::ErrorKind::AlreadyExists, "no free file name"),
        ))
    }

    fn finish_part(&self, file: &mut CategoryFile) -> ExtractResult<()> {
        if let Some(mut sink) = file.sink.take() {
            sink.close().map_err(|e| ExtractError::write(&file.path, e))?;
            debug!(path = %file.path.display(), rows = file.rows_in_part, "closed output file");
        }
        Ok(())
    }
}

impl Drop for IncrementalWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close_all() {
            warn!("output files not cleanly closed: {e}");
        }
    }
}

fn lock(entry: &Mutex<CategoryFile>) -> std::sync::MutexGuard<'_, CategoryFile> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Replace anything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `listings_<category>_<timestamp>[_part<N>].<ext>`
pub fn file_name(category: &str, timestamp: &str, part: u32, format: OutputFormat) -> String {
    let label = sanitize_label(category);
    let ext = format.extension();
    if part <= 1 {
        format!("listings_{label}_{timestamp}.{ext}")
    } else {
        format!("listings_{label}_{timestamp}_part{part}.{ext}")
    }
}

/// `listings_a_ts.csv` -> `listings_a_ts-2.csv`
fn with_copy_suffix(name: &str, copy: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{copy}.{ext}"),
        None => format!("{name}-{copy}"),
    }
}
