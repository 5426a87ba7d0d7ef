//! Read-only view of every configured monitor's persisted state.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use koji_helpers_core::{Config, Watermark};

use crate::deadletter::DeadLetterJournal;
use crate::paths::MonitorId;
use crate::state_store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateStatus {
    Ok,
    Absent,
    Corrupt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    pub monitor: String,
    pub path: PathBuf,
    pub status: StateStatus,
    pub watermark: Option<Watermark>,
    pub saved_at: Option<DateTime<Utc>>,
    pub baseline_entries: usize,
    pub dead_letters: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// smashd when configured, then one id per buildroot.
pub fn configured_monitors(config: &Config) -> Vec<MonitorId> {
    let mut ids = Vec::new();
    if config.smashd.is_some() {
        ids.push(MonitorId::Smashd);
    }
    ids.extend(config.buildroots.keys().map(MonitorId::gojira));
    ids
}

pub fn summarize(config: &Config, id: &MonitorId) -> StateSummary {
    let store = StateStore::for_monitor(&config.state_dir, id);
    let journal = DeadLetterJournal::for_monitor(&config.state_dir, id);
    let dead_letters = match journal.count() {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!(path = %journal.path().display(), error = %err, "unreadable dead-letter journal");
            0
        }
    };

    let mut summary = StateSummary {
        monitor: id.to_string(),
        path: store.path().to_path_buf(),
        status: StateStatus::Absent,
        watermark: None,
        saved_at: None,
        baseline_entries: 0,
        dead_letters,
        error: None,
    };
    match store.read() {
        Ok(Some(state)) => {
            summary.status = StateStatus::Ok;
            summary.watermark = Some(state.watermark);
            summary.saved_at = Some(state.saved_at);
            summary.baseline_entries = state.baseline.map(|b| b.len()).unwrap_or(0);
        }
        Ok(None) => {}
        Err(err) => {
            summary.status = StateStatus::Corrupt;
            summary.error = Some(err.to_string());
        }
    }
    summary
}

pub fn summarize_all(config: &Config) -> Vec<StateSummary> {
    configured_monitors(config)
        .iter()
        .map(|id| summarize(config, id))
        .collect()
}
