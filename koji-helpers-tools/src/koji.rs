//! Typed client over the Koji CLI.
//!
//! One method per operation the daemons need; argument spelling and output
//! parsing stay in here so callers never see argv or raw text.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use koji_helpers_core::Watermark;

use crate::error::ToolError;
use crate::parse;
use crate::runner::run_tool;

/// Identifier of an asynchronous Koji task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle on the `koji` executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KojiClient {
    program: PathBuf,
}

impl KojiClient {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn call(&self, args: &[String]) -> Result<String, ToolError> {
        run_tool("koji", &self.program, args, None).map(|out| out.combined())
    }

    /// Raw `koji list-history` output for events in `(after, before)`.
    pub fn list_history(&self, after: &Watermark, before: &Watermark) -> Result<String, ToolError> {
        self.call(&[
            "list-history".to_string(),
            format!("--after={after}"),
            format!("--before={before}"),
        ])
    }

    /// Ask Koji to regenerate the repo for `tag`; returns the newRepo task.
    pub fn regen_repo(&self, tag: &str) -> Result<TaskId, ToolError> {
        let output = self.call(&[
            "regen-repo".to_string(),
            "--nowait".to_string(),
            tag.to_string(),
        ])?;
        parse::created_task(&output)
            .map(TaskId)
            .ok_or_else(|| ToolError::UnexpectedOutput {
                what: "koji regen-repo".to_string(),
                detail: format!("no task id in: {}", output.trim()),
            })
    }

    /// Block until the repo for `tag` is current.
    pub fn wait_repo(&self, tag: &str) -> Result<(), ToolError> {
        self.call(&["wait-repo".to_string(), tag.to_string()])
            .map(|_| ())
    }

    /// State of `task` as reported by `koji taskinfo` (`closed`, `failed`, …).
    pub fn task_state(&self, task: &TaskId) -> Result<String, ToolError> {
        let output = self.call(&["taskinfo".to_string(), task.0.clone()])?;
        Ok(parse::task_state(&output).unwrap_or_else(|| "unknown".to_string()))
    }

    /// RPM file names produced by `build` (source and binary).
    pub fn build_rpms(&self, build: &str) -> Result<BTreeSet<String>, ToolError> {
        let output = self.call(&["buildinfo".to_string(), build.to_string()])?;
        Ok(parse::buildinfo_rpms(&output))
    }

    /// RPM file names in `tag` that already carry a signed copy.
    pub fn list_signed(&self, tag: &str) -> Result<BTreeSet<String>, ToolError> {
        let output = self.call(&["list-signed".to_string(), format!("--tag={tag}")])?;
        Ok(parse::signed_rpms(&output))
    }

    /// Write out signed copies of every RPM of `builds` for `key`.
    pub fn write_signed_rpm(&self, key: &str, builds: &[String]) -> Result<(), ToolError> {
        let mut args = vec!["write-signed-rpm".to_string(), key.to_string()];
        args.extend(builds.iter().cloned());
        self.call(&args).map(|_| ())
    }

    /// Submit a dist-repo compose for `tag` restricted to packages signed
    /// with `key`. Does not wait for the task.
    pub fn dist_repo(&self, tag: &str, key: &str) -> Result<Option<TaskId>, ToolError> {
        let output = self.call(&[
            "dist-repo".to_string(),
            "--nowait".to_string(),
            tag.to_string(),
            key.to_string(),
        ])?;
        Ok(parse::created_task(&output).map(TaskId))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// A fake `koji` that logs its argv and prints canned output.
    fn fake_koji(dir: &TempDir, stdout: &str, exit: i32) -> KojiClient {
        let script = dir.path().join("koji");
        let log = dir.path().join("argv.log");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" >> '{}'\ncat <<'OUT'\n{}\nOUT\nexit {}\n",
                log.display(),
                stdout,
                exit
            ),
        )
        .expect("write script");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");
        KojiClient::new(script)
    }

    fn argv(dir: &TempDir) -> String {
        fs::read_to_string(dir.path().join("argv.log")).unwrap_or_default()
    }

    #[test]
    fn list_history_passes_bounds() {
        let dir = TempDir::new().expect("tempdir");
        let koji = fake_koji(&dir, "", 0);
        let after: Watermark = "2017-05-01 12:00:00".parse().unwrap();
        let before: Watermark = "2017-05-01 12:05:00".parse().unwrap();
        koji.list_history(&after, &before).expect("list-history");
        assert_eq!(
            argv(&dir).trim(),
            "list-history --after=2017-05-01 12:00:00.000000 --before=2017-05-01 12:05:00.000000"
        );
    }

    #[test]
    fn regen_repo_returns_task_id() {
        let dir = TempDir::new().expect("tempdir");
        let koji = fake_koji(&dir, "Created task: 77\nTask info: …", 0);
        let task = koji.regen_repo("f38-build").expect("regen");
        assert_eq!(task, TaskId("77".to_string()));
        assert_eq!(argv(&dir).trim(), "regen-repo --nowait f38-build");
    }

    #[test]
    fn regen_repo_without_task_is_unexpected_output() {
        let dir = TempDir::new().expect("tempdir");
        let koji = fake_koji(&dir, "permission denied", 0);
        let err = koji.regen_repo("f38-build").unwrap_err();
        assert!(matches!(err, ToolError::UnexpectedOutput { .. }), "got: {err}");
    }

    #[test]
    fn task_state_defaults_to_unknown() {
        let dir = TempDir::new().expect("tempdir");
        let koji = fake_koji(&dir, "Task: 77", 0);
        assert_eq!(koji.task_state(&TaskId("77".into())).expect("taskinfo"), "unknown");
    }

    #[test]
    fn failing_koji_surfaces_output() {
        let dir = TempDir::new().expect("tempdir");
        let koji = fake_koji(&dir, "GenericError: no such tag", 1);
        let err = koji.wait_repo("nope").unwrap_err();
        assert!(err.to_string().contains("no such tag"), "got: {err}");
    }

    #[test]
    fn write_signed_rpm_appends_builds() {
        let dir = TempDir::new().expect("tempdir");
        let koji = fake_koji(&dir, "", 0);
        koji.write_signed_rpm("1a2b3c4d", &["foo-1-1".into(), "bar-2-1".into()])
            .expect("write-signed-rpm");
        assert_eq!(argv(&dir).trim(), "write-signed-rpm 1a2b3c4d foo-1-1 bar-2-1");
    }
}
