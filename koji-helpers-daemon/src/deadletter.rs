//! Journal of batches whose pipeline failed.
//!
//! The watermark moves past a failed batch so the monitor does not retry it
//! forever; the batch is appended here as one JSON line so an operator can
//! inspect and replay it.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use koji_helpers_core::{ChangeSnapshot, Watermark};

use crate::error::{io_err, DaemonError};
use crate::paths::{dead_letter_path, MonitorId};

/// Query window of the failed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub after: Watermark,
    pub before: Watermark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub failed_at: DateTime<Utc>,
    pub window: Window,
    pub error: String,
    pub changes: ChangeSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterJournal {
    path: PathBuf,
}

impl DeadLetterJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_monitor(state_dir: &Path, id: &MonitorId) -> Self {
        Self::new(dead_letter_path(state_dir, id))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, letter: &DeadLetter) -> Result<(), DaemonError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let line = serde_json::to_string(letter)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        writeln!(file, "{line}").map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    /// Every recorded letter, oldest first. An absent journal is empty.
    pub fn read_all(&self) -> Result<Vec<DeadLetter>, DaemonError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path).map_err(|e| io_err(&self.path, e))?;
        let mut letters = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| io_err(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            letters.push(serde_json::from_str(&line)?);
        }
        Ok(letters)
    }

    pub fn count(&self) -> Result<usize, DaemonError> {
        self.read_all().map(|letters| letters.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use koji_helpers_core::{Evidence, SubjectKey, TagActivity};
    use tempfile::TempDir;

    fn letter(error: &str) -> DeadLetter {
        let mut activity = TagActivity::default();
        activity.arriving.record("foo-1.0-1", "jdoe");
        let mut changes = ChangeSnapshot::new();
        changes.insert(SubjectKey::from("f38"), Evidence::Tagging(activity));
        DeadLetter {
            failed_at: Utc::now(),
            window: Window {
                after: "2017-05-01 12:00:00".parse().unwrap(),
                before: "2017-05-01 12:10:00".parse().unwrap(),
            },
            error: error.to_string(),
            changes,
        }
    }

    #[test]
    fn absent_journal_is_empty() {
        let tmp = TempDir::new().unwrap();
        let journal = DeadLetterJournal::for_monitor(tmp.path(), &MonitorId::Smashd);
        assert_eq!(journal.count().unwrap(), 0);
    }

    #[test]
    fn appends_one_line_per_failed_batch() {
        let tmp = TempDir::new().unwrap();
        let journal = DeadLetterJournal::for_monitor(tmp.path(), &MonitorId::Smashd);
        journal.append(&letter("sign failed")).unwrap();
        journal.append(&letter("compose failed")).unwrap();

        let raw = std::fs::read_to_string(journal.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let letters = journal.read_all().unwrap();
        assert_eq!(letters[0].error, "sign failed");
        assert_eq!(letters[1].error, "compose failed");
        assert_eq!(letters[1].changes, letter("compose failed").changes);
        assert_eq!(letters[1].window, letter("compose failed").window);
    }

    #[test]
    fn line_shape_is_stable() {
        let tmp = TempDir::new().unwrap();
        let journal = DeadLetterJournal::for_monitor(tmp.path(), &MonitorId::Smashd);
        journal.append(&letter("boom")).unwrap();
        let raw = std::fs::read_to_string(journal.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
        assert_eq!(json["window"]["after"], "2017-05-01 12:00:00.000000");
        assert_eq!(json["error"], "boom");
        assert!(json["changes"]["f38"].is_object());
    }
}
