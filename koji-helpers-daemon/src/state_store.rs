//! Per-monitor state file: the watermark plus, for metadata monitors, the
//! last acknowledged fingerprints.
//!
//! Writes use the `.tmp` + rename pattern so a crash never leaves a torn
//! file behind. Reads are forgiving: an absent file is a normal first start
//! and an unreadable one is logged and replaced, never fatal.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use koji_helpers_core::{ChangeSnapshot, Evidence, Fingerprint, SubjectKey, Watermark};

use crate::error::{io_err, DaemonError};
use crate::paths::{state_path, MonitorId};

/// On-disk monitor state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    pub watermark: Watermark,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<ChangeSnapshot>,
    pub saved_at: DateTime<Utc>,
}

impl MonitorState {
    /// State for a first start: nothing before now is of interest.
    pub fn fresh() -> Self {
        Self {
            watermark: Watermark::now(),
            baseline: None,
            saved_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StateCompat {
    Structured(StructuredCompat),
    /// Older smashd: a bare "last run" timestamp string.
    LastRun(Watermark),
    /// Older gojira: `{url: [etag, last_modified]}`.
    LastMetadata(BTreeMap<String, (String, String)>),
}

#[derive(Debug, Deserialize)]
struct StructuredCompat {
    watermark: Watermark,
    #[serde(default)]
    baseline: Option<ChangeSnapshot>,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

impl From<StateCompat> for MonitorState {
    fn from(compat: StateCompat) -> Self {
        match compat {
            StateCompat::Structured(state) => MonitorState {
                watermark: state.watermark,
                baseline: state.baseline,
                saved_at: state.saved_at.unwrap_or_else(Utc::now),
            },
            StateCompat::LastRun(watermark) => MonitorState {
                watermark,
                baseline: None,
                saved_at: Utc::now(),
            },
            StateCompat::LastMetadata(metadata) => MonitorState {
                baseline: Some(
                    metadata
                        .into_iter()
                        .map(|(url, (etag, last_modified))| {
                            (
                                SubjectKey::from(url),
                                Evidence::Fingerprint(Fingerprint {
                                    etag,
                                    last_modified,
                                }),
                            )
                        })
                        .collect(),
                ),
                ..MonitorState::fresh()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_monitor(state_dir: &Path, id: &MonitorId) -> Self {
        Self::new(state_path(state_dir, id))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read: `Ok(None)` when absent, an error when unreadable.
    pub fn read(&self) -> Result<Option<MonitorState>, DaemonError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        let compat: StateCompat =
            serde_json::from_str(&contents).map_err(|e| DaemonError::CorruptState {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(Some(compat.into()))
    }

    /// Startup read: falls back to [`MonitorState::fresh`] on absence or
    /// corruption.
    pub fn load(&self) -> MonitorState {
        match self.read() {
            Ok(Some(state)) => {
                tracing::debug!(
                    path = %self.path.display(),
                    watermark = %state.watermark,
                    "loaded state",
                );
                state
            }
            Ok(None) => {
                let state = MonitorState::fresh();
                tracing::debug!(
                    path = %self.path.display(),
                    watermark = %state.watermark,
                    "initialized state since file is absent",
                );
                state
            }
            Err(err) => {
                let state = MonitorState::fresh();
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    watermark = %state.watermark,
                    "discarding unreadable state; starting fresh",
                );
                state
            }
        }
    }

    /// Persist `state` atomically, creating the parent directory if needed.
    pub fn save(&self, state: &MonitorState) -> Result<(), DaemonError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid state file path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let json = serde_json::to_string_pretty(state)?;
        let tmp = tmp_path(&self.path);
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        tracing::debug!(
            path = %self.path.display(),
            watermark = %state.watermark,
            "saved state",
        );
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
