//! Blocking execution of external helper programs.
//!
//! stdout and stderr are both captured; callers get them concatenated, the
//! way the tools' own logs read when run from a terminal.

use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{io_err, ToolError};

/// Captured result of a successful tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout.trim_end(), self.stderr)
        }
    }
}

/// Run `program args…`, optionally feeding `stdin`, and wait for it.
///
/// Non-zero exit is an error carrying the combined output. On success each
/// output line is logged at debug level under `label`.
pub fn run_tool<S: AsRef<str>>(
    label: &str,
    program: &Path,
    args: &[S],
    stdin: Option<&[u8]>,
) -> Result<ToolOutput, ToolError> {
    let argv: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    tracing::debug!(program = %program.display(), args = ?argv, "about to call");

    let mut command = Command::new(program);
    command
        .args(&argv)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    let mut child = command.spawn().map_err(|source| ToolError::Spawn {
        program: program.to_path_buf(),
        source,
    })?;

    // A tool that exits without draining stdin closes the pipe; its exit
    // status and output below say why, so the child is always reaped.
    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            match pipe.write_all(input) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    tracing::debug!(program = %program.display(), "stdin closed early");
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(io_err(program, e));
                }
            }
        }
    }

    let output = child.wait_with_output().map_err(|e| io_err(program, e))?;
    let captured = ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !output.status.success() {
        let status = match output.status.code() {
            Some(code) => format!("exit status {code}"),
            None => "killed by signal".to_string(),
        };
        tracing::error!(
            program = %program.display(),
            status = %status,
            output = %captured.combined(),
            "{label} failed",
        );
        return Err(ToolError::Failed {
            program: program.to_path_buf(),
            status,
            output: captured.combined(),
        });
    }

    for line in captured.combined().lines() {
        tracing::debug!("{label}: {line}");
    }
    Ok(captured)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_on_success() {
        let out = run_tool("sh", Path::new("/bin/sh"), &["-c", "echo hello"], None)
            .expect("run");
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn feeds_stdin() {
        let out = run_tool("sh", Path::new("/bin/sh"), &["-c", "cat"], Some(&b"secret\0"[..]))
            .expect("run");
        assert_eq!(out.stdout, "secret\0");
    }

    #[test]
    fn non_zero_exit_carries_output() {
        let err = run_tool(
            "sh",
            Path::new("/bin/sh"),
            &["-c", "echo partial; echo broken >&2; exit 3"],
            None,
        )
        .unwrap_err();
        match err {
            ToolError::Failed { status, output, .. } => {
                assert_eq!(status, "exit status 3");
                assert!(output.contains("partial"));
                assert!(output.contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn early_exit_without_reading_stdin_reports_exit_status() {
        let input = vec![b'x'; 1 << 20];
        let err = run_tool(
            "sh",
            Path::new("/bin/sh"),
            &["-c", "echo 'bad args' >&2; exit 2"],
            Some(&input[..]),
        )
        .unwrap_err();
        match err {
            ToolError::Failed { status, output, .. } => {
                assert_eq!(status, "exit status 2");
                assert!(output.contains("bad args"), "got: {output}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = run_tool::<&str>("nope", Path::new("/nonexistent/tool"), &[], None).unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[test]
    fn silent_failure_message() {
        let err = run_tool("sh", Path::new("/bin/sh"), &["-c", "exit 1"], None).unwrap_err();
        assert!(err.to_string().ends_with("and silently"), "got: {err}");
    }
}
