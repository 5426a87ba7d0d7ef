use std::path::PathBuf;

use thiserror::Error;

/// Error surface for monitors, their state files and the runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] koji_helpers_core::ConfigError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] koji_helpers_pipeline::PipelineError),

    #[error("corrupt state in {path}: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    #[error("{0} task join failure: {1}")]
    Join(String, String),

    #[error("signal handler failed: {0}")]
    Signal(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
