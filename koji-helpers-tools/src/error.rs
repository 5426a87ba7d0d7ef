//! Error types for koji-helpers-tools.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from driving external tools and endpoints.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The executable could not be started at all.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The executable ran and exited non-zero (or was killed).
    #[error("{program} terminated abnormally ({status}){}", render_output(.output))]
    Failed {
        program: PathBuf,
        status: String,
        output: String,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tool output did not contain what we expected to parse.
    #[error("unexpected output from {what}: {detail}")]
    UnexpectedOutput { what: String, detail: String },

    /// HTTP request could not be completed.
    #[error("HTTP request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    /// HTTP response lacked a header needed for fingerprinting.
    #[error("'{header}' not in HTTP HEAD for {url}")]
    MissingHeader { url: String, header: &'static str },
}

fn render_output(output: &str) -> String {
    if output.trim().is_empty() {
        " and silently".to_string()
    } else {
        format!(" and output:\n{output}")
    }
}

/// Convenience constructor for [`ToolError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ToolError {
    ToolError::Io {
        path: path.into(),
        source,
    }
}
