//! Compose stage: turn each affected tag into a consumable package repo.
//!
//! Two methods are supported:
//!
//! | method      | how                                                           |
//! |-------------|---------------------------------------------------------------|
//! | `dist-repo` | `koji dist-repo --nowait <tag> <key>`; Koji does the rest      |
//! | `mash`      | `mash` into a scratch directory, then `rsync` into `repo_dir` |
//!
//! With `mash` the public repository is only touched by `rsync`, which keeps
//! disruption to consumers short and lets ownership differ from mash's.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use koji_helpers_core::config::{ComposeMethod, RepositoryConfig, ToolPaths};
use koji_helpers_core::{ActionError, ChangeSnapshot, ConfigError};
use koji_helpers_tools::{run_tool, KojiClient};

use crate::error::{io_err, PipelineError};

pub const COMPOSE_STAGE: &str = "compose";
pub const SYNC_STAGE: &str = "sync";

/// Fixed rsync options used when publishing a mashed repository.
pub const RSYNC_ARGS: &[&str] = &[
    "--archive",
    "--copy-links",
    "--delay-updates",
    "--delete",
    "--delete-delay",
    "--exclude=lost+found/",
    "--no-group",
    "--no-owner",
    "--stats",
];

#[derive(Debug, Clone)]
pub struct Composer {
    method: ComposeMethod,
    koji: KojiClient,
    mash: PathBuf,
    rsync: PathBuf,
    repo_dir: Option<PathBuf>,
    repositories: BTreeMap<String, RepositoryConfig>,
}

impl Composer {
    pub fn new(
        method: ComposeMethod,
        tools: &ToolPaths,
        repo_dir: Option<PathBuf>,
        repositories: BTreeMap<String, RepositoryConfig>,
    ) -> Self {
        Self {
            method,
            koji: KojiClient::new(&tools.koji),
            mash: tools.mash.clone(),
            rsync: tools.rsync.clone(),
            repo_dir,
            repositories,
        }
    }

    pub fn method(&self) -> ComposeMethod {
        self.method
    }

    /// Compose every tag of `changes`, collecting per-tag failures.
    pub fn compose_all(&self, changes: &ChangeSnapshot) -> Vec<ActionError> {
        tracing::info!(method = ?self.method, tags = %changes.subject_list(), "composing");
        let failures: Vec<ActionError> = changes
            .subjects()
            .filter_map(|tag| self.compose(&tag.0).err())
            .collect();
        tracing::info!(failed = failures.len(), "composing completed");
        failures
    }

    /// Compose a single tag.
    pub fn compose(&self, tag: &str) -> Result<(), ActionError> {
        let repo = self
            .repositories
            .get(tag)
            .ok_or_else(|| ConfigError::MissingRepository(tag.to_string()))
            .map_err(|e| ActionError::stage(COMPOSE_STAGE, tag, e))?;
        match self.method {
            ComposeMethod::DistRepo => self
                .dist_repo(tag, repo)
                .map_err(|e| ActionError::stage(COMPOSE_STAGE, tag, e)),
            ComposeMethod::Mash => self.mash_and_sync(tag, repo),
        }
    }

    fn dist_repo(&self, tag: &str, repo: &RepositoryConfig) -> Result<(), PipelineError> {
        let key = repo.koji_key();
        tracing::info!(tag, key = %key, "composing dist-repo");
        match self.koji.dist_repo(tag, &key)? {
            Some(task) => tracing::info!(tag, task = %task, "dist-repo task started"),
            None => tracing::warn!(tag, "dist-repo gave no task id"),
        }
        Ok(())
    }

    fn mash_and_sync(&self, tag: &str, repo: &RepositoryConfig) -> Result<(), ActionError> {
        let mash_path = repo.mash_path.as_deref().ok_or_else(|| {
            ActionError::stage(
                COMPOSE_STAGE,
                tag,
                ConfigError::Invalid(format!("repository '{tag}' has no mash_path")),
            )
        })?;
        let repo_dir = self.repo_dir.as_deref().ok_or_else(|| {
            ActionError::stage(
                SYNC_STAGE,
                tag,
                ConfigError::Invalid("smashd.repo_dir is not set".to_string()),
            )
        })?;

        let work = tempfile::Builder::new()
            .prefix(&format!("mash-{tag}-"))
            .tempdir()
            .map_err(|e| ActionError::stage(COMPOSE_STAGE, tag, io_err(std::env::temp_dir(), e)))?;
        tracing::debug!(work = %work.path().display(), "created work directory");

        self.mash(tag, work.path())
            .map_err(|e| ActionError::stage(COMPOSE_STAGE, tag, e))?;

        let source = dir_arg(&work.path().join(tag).join(mash_path));
        let target = dir_arg(&repo_dir.join(mash_path));
        self.sync(&source, &target)
            .map_err(|e| ActionError::stage(SYNC_STAGE, tag, e))
    }

    fn mash(&self, tag: &str, work: &Path) -> Result<(), PipelineError> {
        tracing::info!(tag, out = %work.join(tag).display(), "mashing");
        let args = ["-o".to_string(), work.display().to_string(), tag.to_string()];
        run_tool("mash", &self.mash, &args, None)?;
        Ok(())
    }

    fn sync(&self, source: &str, target: &str) -> Result<(), PipelineError> {
        tracing::info!(from = source, to = target, "synchronizing");
        let mut args: Vec<String> = RSYNC_ARGS.iter().map(|a| a.to_string()).collect();
        args.push(source.to_string());
        args.push(target.to_string());
        run_tool("rsync", &self.rsync, &args, None)?;
        Ok(())
    }
}

/// Directory argument with the trailing slash rsync needs to copy contents.
fn dir_arg(path: &Path) -> String {
    let mut arg = path.display().to_string();
    if !arg.ends_with('/') {
        arg.push('/');
    }
    arg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_arg_appends_one_slash() {
        assert_eq!(dir_arg(Path::new("/srv/repos/f38")), "/srv/repos/f38/");
        assert_eq!(dir_arg(Path::new("/srv/repos/f38/")), "/srv/repos/f38/");
    }

    #[test]
    fn unknown_tag_is_a_compose_failure() {
        let composer = Composer::new(
            ComposeMethod::DistRepo,
            &ToolPaths::default(),
            None,
            BTreeMap::new(),
        );
        let err = composer.compose("f38").unwrap_err();
        assert!(
            err.to_string().starts_with("compose failed for 'f38'"),
            "got: {err}"
        );
    }
}
