//! Durable storage for shot reports.
//!
//! Reports are appended as JSON lines, one file per run.

use crate::core::report::ShotReport;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Report store errors.
#[derive(Debug)]
pub enum StoreError {
    Io(String),
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "Store IO error: {msg}"),
            StoreError::Serialization(msg) => write!(f, "Store serialization error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Append-only JSON-lines report file.
///
/// Safe to share between threads; writes are serialized.
#[derive(Debug)]
pub struct ReportStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ReportStore {
    /// Open a store at `path`, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Open a new timestamped store file inside `dir`.
    pub fn in_dir(dir: &Path) -> Result<Self, StoreError> {
        let name = format!("shots_{}.jsonl", chrono::Utc::now().format("%Y%m%d_%H%M%S"));
        Self::open(dir.join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one report.
    pub fn append(&self, report: &ShotReport) -> Result<(), StoreError> {
        let line =
            serde_json::to_string(report).map_err(|e| StoreError::Serialization(e.to_string()))?;

        // A poisoned lock only means another writer panicked mid-append.
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Read back every report in this store.
    pub fn load(&self) -> Result<Vec<ShotReport>, StoreError> {
        read_reports(&self.path)
    }

    /// Read every `.jsonl` file in `dir`, oldest file first.
    ///
    /// Lines that do not parse as a report are skipped.
    pub fn load_dir(dir: &Path) -> Result<Vec<ShotReport>, StoreError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| StoreError::Io(e.to_string()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map_or(false, |ext| ext == "jsonl"))
            .collect();
        files.sort();

        let mut reports = Vec::new();
        for file in files {
            reports.extend(read_reports(&file)?);
        }
        Ok(reports)
    }
}

fn read_reports(path: &Path) -> Result<Vec<ShotReport>, StoreError> {
    let file = std::fs::File::open(path).map_err(|e| StoreError::Io(e.to_string()))?;

    let mut reports = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| StoreError::Io(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ShotReport>(&line) {
            Ok(report) => reports.push(report),
            Err(e) => tracing::warn!(
                "Skipping malformed report in {} line {}: {}",
                path.display(),
                line_no + 1,
                e
            ),
        }
    }
    Ok(reports)
}
