//! Persistent batch results
//!
//! Two artifacts live in the logs directory:
//! - `scrobbled_files.txt`: one line per batch file that finished a run
//! - `failed_songs.json`: JSON array of every event that failed, across runs
//!
//! The failure array only ever grows. Updates are read-modify-write of the whole
//! file, so at most one run may use a given logs directory at a time. When the
//! array cannot be updated, a run's failures go to a timestamped sibling
//! (`failed_songs.<timestamp>.json`) and the existing file is left as it was.

use crate::models::FailedEvent;
use crate::workflow::BatchReport;
use scrobbler_common::{Error, Result};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const PROCESSED_FILES_LOG: &str = "scrobbled_files.txt";
pub const FAILED_EVENTS_LOG: &str = "failed_songs.json";

#[derive(Debug, Clone)]
pub struct ResultLog {
    processed_path: PathBuf,
    failed_path: PathBuf,
}

impl ResultLog {
    pub fn new(processed_path: impl Into<PathBuf>, failed_path: impl Into<PathBuf>) -> Self {
        Self {
            processed_path: processed_path.into(),
            failed_path: failed_path.into(),
        }
    }

    /// Standard artifact names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(PROCESSED_FILES_LOG), dir.join(FAILED_EVENTS_LOG))
    }

    pub fn processed_path(&self) -> &Path {
        &self.processed_path
    }

    pub fn failed_path(&self) -> &Path {
        &self.failed_path
    }

    /// Create the directories holding both artifacts
    pub fn ensure_dirs(&self) -> Result<()> {
        for path in [&self.processed_path, &self.failed_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Append `name` as one line to the processed-files log
    pub fn record_processed_file(&self, name: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.processed_path)?;
        writeln!(file, "{}", name)?;
        Ok(())
    }

    /// Whether `name` already appears in the processed-files log
    pub fn was_processed(&self, name: &str) -> Result<bool> {
        match fs::read_to_string(&self.processed_path) {
            Ok(content) => Ok(content.lines().any(|line| line.trim() == name)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Append `failures` to the failed-events array
    ///
    /// Existing records are kept verbatim and in order. The whole array is written
    /// to a sibling temp file and renamed over the artifact. Returns the new total.
    pub fn record_failures(&self, failures: &[FailedEvent]) -> Result<usize> {
        let mut records = self.read_failures()?;
        if failures.is_empty() {
            return Ok(records.len());
        }

        for failure in failures {
            records.push(serde_json::to_value(failure)?);
        }

        let content = serde_json::to_string_pretty(&records)?;
        let temp_path = self.failed_path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.failed_path)?;

        Ok(records.len())
    }

    /// Every record in the failed-events array (empty if the artifact is missing)
    pub fn read_failures(&self) -> Result<Vec<Value>> {
        let content = match fs::read_to_string(&self.failed_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            Error::InvalidInput(format!(
                "{} is not a JSON array, refusing to overwrite: {}",
                self.failed_path.display(),
                e
            ))
        })
    }

    /// Final human-readable report line
    pub fn summarize(file_name: &str, succeeded: usize, failed: usize, total: usize) -> String {
        format!(
            "Finished scrobbling {}: {} successful, {} failed out of {} songs.",
            file_name, succeeded, failed, total
        )
    }

    /// Persist a finished run
    ///
    /// The processed-file marker is written whether or not the run halted early.
    /// Both artifacts are attempted independently; every write problem is reported
    /// together in one [`Error::ResultLog`].
    pub fn flush(&self, report: &BatchReport) -> Result<()> {
        let mut problems = Vec::new();

        match self.record_processed_file(&report.file_name) {
            Ok(()) => info!(
                file = %report.file_name,
                log = %self.processed_path.display(),
                "Added {} to {}",
                report.file_name,
                PROCESSED_FILES_LOG
            ),
            Err(e) => {
                error!(
                    file = %report.file_name,
                    log = %self.processed_path.display(),
                    error = %e,
                    "Failed to record processed file"
                );
                problems.push(format!("{}: {}", self.processed_path.display(), e));
            }
        }

        let failures = &report.state.failures;
        if !failures.is_empty() {
            match self.record_failures(failures) {
                Ok(_) => warn!(
                    count = failures.len(),
                    log = %self.failed_path.display(),
                    "Wrote {} failed songs to {}",
                    failures.len(),
                    FAILED_EVENTS_LOG
                ),
                Err(e) => {
                    problems.push(format!("{}: {}", self.failed_path.display(), e));
                    if let Err(aside_err) = self.record_failures_aside(failures) {
                        problems.push(aside_err.to_string());
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::ResultLog(problems.join("; ")))
        }
    }

    /// Sibling of the failure log for records that could not be appended to it
    pub fn aside_path(&self, stamp: &str) -> PathBuf {
        let stem = self
            .failed_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "failed_songs".to_string());
        self.failed_path
            .with_file_name(format!("{}.{}.json", stem, stamp))
    }

    /// Write `failures` to a fresh timestamped sibling of the failure log
    ///
    /// If that fails too, every record is logged at error level.
    fn record_failures_aside(&self, failures: &[FailedEvent]) -> Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S%3f").to_string();
        let path = self.aside_path(&stamp);

        let written = serde_json::to_string_pretty(failures)
            .map_err(Error::from)
            .and_then(|content| {
                let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
                file.write_all(content.as_bytes())?;
                Ok(())
            });

        match written {
            Ok(()) => {
                warn!(
                    count = failures.len(),
                    log = %path.display(),
                    "Could not update {}, wrote {} failed songs to {}",
                    FAILED_EVENTS_LOG,
                    failures.len(),
                    path.display()
                );
                Ok(path)
            }
            Err(e) => {
                for failure in failures {
                    let record = serde_json::to_string(failure)
                        .unwrap_or_else(|_| format!("{:?}", failure));
                    error!(record = %record, "Unsaved failed song");
                }
                Err(Error::ResultLog(format!("{}: {}", path.display(), e)))
            }
        }
    }
}
