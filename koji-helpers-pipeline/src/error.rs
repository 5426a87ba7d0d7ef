//! Error types for koji-helpers-pipeline.

use std::path::PathBuf;

use thiserror::Error;

use koji_helpers_core::ConfigError;
use koji_helpers_tools::ToolError;

/// All errors that can arise while running one pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An external tool could not be run or reported failure.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A subject has no usable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Template(#[from] tera::Error),

    /// Filesystem error (work directories, template overrides).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A Koji task finished in a state other than `closed`.
    #[error("task {task} ended as '{state}'")]
    TaskFailed { task: String, state: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.into(),
        source,
    }
}
