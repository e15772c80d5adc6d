//! History Log - append-only JSON Lines log of finished candidates
//!
//! The first line is a [`HistoryHeader`] naming the run context and the
//! candidate source the log belongs to. Every following line is one
//! [`CandidateRecord`], appended as soon as the candidate finishes, so that
//! an interrupted search can be resumed from the candidates it already paid
//! for. A log written under a different context or source is never resumed.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::RunContext;
use crate::search::CandidateRecord;
use crate::{Error, Result};

/// File name of the log inside the tuning output directory.
pub const HISTORY_FILE: &str = "history.jsonl";

/// What the records of a log were produced under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryHeader {
    /// Run parameters
    pub context: RunContext,
    /// Canonical candidate source, see [`crate::config::TuningConfig::source_key`]
    pub source: String,
}

/// Append-only candidate log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    /// Log stored as [`HISTORY_FILE`] inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(HISTORY_FILE),
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the header and every complete record. A missing file is an
    /// empty history without a header.
    ///
    /// A truncated final line (the process died mid-write) is skipped with
    /// a warning; a malformed line anywhere else is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a line is malformed, or
    /// records are present without a header.
    pub fn load(&self) -> Result<(Option<HistoryHeader>, Vec<CandidateRecord>)> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((None, Vec::new())),
            Err(e) => return Err(e.into()),
        };

        let lines = BufReader::new(file)
            .lines()
            .collect::<std::io::Result<Vec<_>>>()?;
        let last = lines.len().saturating_sub(1);

        let mut header = None;
        let mut records = Vec::with_capacity(lines.len());
        for (number, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed = if header.is_none() {
                serde_json::from_str::<HistoryHeader>(line).map(|h| header = Some(h))
            } else {
                serde_json::from_str::<CandidateRecord>(line).map(|r| records.push(r))
            };
            match parsed {
                Ok(()) => {}
                Err(e) if number == last => {
                    warn!(path = %self.path.display(), error = %e, "skipping truncated history line");
                }
                Err(e) => {
                    let what = if header.is_none() { "history header" } else { "candidate record" };
                    return Err(Error::Other(format!(
                        "{}:{}: malformed {what}: {e}",
                        self.path.display(),
                        number + 1
                    )));
                }
            }
        }
        debug!(path = %self.path.display(), records = records.len(), "loaded history");
        Ok((header, records))
    }

    /// Start a fresh history under `header`, discarding any previous log.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn start(&self, header: &HistoryHeader) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(header)?;
        line.push('\n');
        let mut file = File::create(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Load the records of a previous run with the same `header`.
    ///
    /// A missing or empty log starts a fresh history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the log was written under another
    /// run context or candidate source, and the errors of
    /// [`HistoryLog::load`].
    pub fn resume(&self, header: &HistoryHeader) -> Result<Vec<CandidateRecord>> {
        let (found, records) = self.load()?;
        let Some(found) = found else {
            info!(path = %self.path.display(), "no history to resume, starting fresh");
            self.start(header)?;
            return Ok(Vec::new());
        };

        let mismatch = if found.context != header.context {
            Some("run context")
        } else if found.source != header.source {
            Some("candidate source")
        } else {
            None
        };
        if let Some(what) = mismatch {
            return Err(Error::config(
                "resume",
                format!(
                    "{} was written under a different {what}; rerun without --resume to start over",
                    self.path.display()
                ),
            ));
        }
        Ok(records)
    }

    /// Append one record and flush it to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    pub fn append(&self, record: &CandidateRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
