//! Error types for koji-helpers-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// A daemon was started without its config section.
    #[error("config has no '{0}' section")]
    MissingSection(&'static str),

    /// A tag was referenced that has no `repositories` entry.
    #[error("no repository configured for tag '{0}'")]
    MissingRepository(String),

    /// Semantically invalid values (bounds, recipients, paths).
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure of one or more stages of an action pipeline run.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A single stage failed for one subject.
    #[error("{stage} failed for '{subject}': {reason}")]
    Stage {
        stage: &'static str,
        subject: String,
        reason: String,
    },

    /// Several stages failed during one run; every stage was still attempted.
    #[error("{} stage failure(s): {}", .0.len(), join_failures(.0))]
    Multiple(Vec<ActionError>),
}

impl ActionError {
    pub fn stage(stage: &'static str, subject: impl Into<String>, reason: impl ToString) -> Self {
        ActionError::Stage {
            stage,
            subject: subject.into(),
            reason: reason.to_string(),
        }
    }

    /// Collapse a list of failures: none → `Ok`, one → itself, many → `Multiple`.
    pub fn collect(mut failures: Vec<ActionError>) -> Result<(), ActionError> {
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(ActionError::Multiple(failures)),
        }
    }
}

fn join_failures(failures: &[ActionError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_none_is_ok() {
        assert!(ActionError::collect(vec![]).is_ok());
    }

    #[test]
    fn collect_one_keeps_stage() {
        let err = ActionError::collect(vec![ActionError::stage("sign", "f38", "sigul exited 1")])
            .unwrap_err();
        assert!(matches!(err, ActionError::Stage { stage: "sign", .. }));
        assert_eq!(err.to_string(), "sign failed for 'f38': sigul exited 1");
    }

    #[test]
    fn collect_many_joins_messages() {
        let err = ActionError::collect(vec![
            ActionError::stage("sign", "f38", "boom"),
            ActionError::stage("compose", "f39", "bang"),
        ])
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("2 stage failure(s)"), "got: {msg}");
        assert!(msg.contains("compose failed for 'f39'"));
    }
}
