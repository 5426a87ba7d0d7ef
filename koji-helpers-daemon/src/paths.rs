use std::fmt;
use std::path::{Path, PathBuf};

pub const SMASHD: &str = "smashd";
pub const GOJIRA: &str = "gojira";

/// Identity of one monitor instance; decides where its files live.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MonitorId {
    /// The single tag-history monitor.
    Smashd,
    /// One metadata monitor per buildroot.
    Gojira { buildroot: String },
}

impl MonitorId {
    pub fn gojira(buildroot: impl Into<String>) -> Self {
        MonitorId::Gojira {
            buildroot: buildroot.into(),
        }
    }

    pub fn daemon(&self) -> &'static str {
        match self {
            MonitorId::Smashd => SMASHD,
            MonitorId::Gojira { .. } => GOJIRA,
        }
    }

    pub fn instance(&self) -> &str {
        match self {
            MonitorId::Smashd => SMASHD,
            MonitorId::Gojira { buildroot } => buildroot,
        }
    }

    fn state_file_name(&self) -> String {
        match self {
            MonitorId::Smashd => "state".to_string(),
            MonitorId::Gojira { buildroot } => format!("{buildroot}-state"),
        }
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorId::Smashd => f.write_str(SMASHD),
            MonitorId::Gojira { buildroot } => write!(f, "{GOJIRA}/{buildroot}"),
        }
    }
}

pub fn daemon_dir(state_dir: &Path, id: &MonitorId) -> PathBuf {
    state_dir.join(id.daemon())
}

/// `<state_dir>/smashd/state` or `<state_dir>/gojira/<buildroot>-state`.
pub fn state_path(state_dir: &Path, id: &MonitorId) -> PathBuf {
    daemon_dir(state_dir, id).join(id.state_file_name())
}

/// `<state_dir>/<daemon>/<instance>.failed.jsonl`
pub fn dead_letter_path(state_dir: &Path, id: &MonitorId) -> PathBuf {
    daemon_dir(state_dir, id).join(format!("{}.failed.jsonl", id.instance()))
}
