//! Running external tools on the host.
//!
//! Inside a Flatpak sandbox the PipeWire tools live on the host, so every
//! invocation goes through `flatpak-spawn --host`.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{PwError, PwResult};

/// When to escalate commands to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostSpawn {
    /// Escalate only when running inside a Flatpak sandbox
    #[default]
    Auto,
    /// Always prefix commands with `flatpak-spawn --host`
    Always,
    /// Run commands directly
    Never,
}

impl HostSpawn {
    /// Resolve whether commands must be escalated.
    #[must_use]
    pub fn escalate(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => in_flatpak(),
        }
    }
}

fn in_flatpak() -> bool {
    Path::new("/.flatpak-info").exists() || std::env::var_os("FLATPAK_ID").is_some()
}

/// Runs a program and captures its standard output.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`.
    ///
    /// # Errors
    /// Returns [`PwError::Execution`] on a non-zero exit and
    /// [`PwError::Spawn`] if the process could not be started.
    fn run(&self, program: &str, args: &[String]) -> PwResult<String>;
}

/// [`CommandRunner`] backed by real subprocesses.
#[derive(Debug, Clone)]
pub struct HostCommandRunner {
    escalate: bool,
}

impl HostCommandRunner {
    /// Create a runner using the given escalation mode.
    #[must_use]
    pub fn new(mode: HostSpawn) -> Self {
        Self { escalate: mode.escalate() }
    }

    fn command(&self, program: &str, args: &[String]) -> Command {
        if self.escalate {
            let mut cmd = Command::new("flatpak-spawn");
            cmd.arg("--host").arg(program).args(args);
            cmd
        } else {
            let mut cmd = Command::new(program);
            cmd.args(args);
            cmd
        }
    }
}

impl CommandRunner for HostCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> PwResult<String> {
        trace!(program, ?args, escalate = self.escalate, "Running command");

        let output = self
            .command(program, args)
            .output()
            .map_err(|source| PwError::Spawn { program: program.to_string(), source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            warn!(program, code = ?output.status.code(), stderr = %stderr, "Command failed");
            return Err(PwError::Execution {
                program: program.to_string(),
                exit_code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(strip_trailing_newline(&stdout).to_string())
    }
}

/// Remove a single trailing newline.
#[must_use]
pub fn strip_trailing_newline(text: &str) -> &str {
    text.strip_suffix('\n').unwrap_or(text)
}

/// Build an owned argument list.
#[must_use]
pub fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_strip_trailing_newline() {
        assert_eq!(strip_trailing_newline("abc\n"), "abc");
        assert_eq!(strip_trailing_newline("abc\n\n"), "abc\n");
        assert_eq!(strip_trailing_newline("abc"), "abc");
        assert_eq!(strip_trailing_newline(""), "");
    }

    #[test]
    fn test_explicit_modes() {
        assert!(HostSpawn::Always.escalate());
        assert!(!HostSpawn::Never.escalate());
    }

    #[test]
    fn test_escalated_command_goes_through_flatpak_spawn() {
        let runner = HostCommandRunner { escalate: true };
        let cmd = runner.command("pw-link", &args(&["--links", "--id"]));

        assert_eq!(cmd.get_program(), "flatpak-spawn");
        let argv: Vec<_> = cmd.get_args().collect();
        assert_eq!(argv, ["--host", "pw-link", "--links", "--id"]);
    }

    #[test]
    fn test_direct_command() {
        let runner = HostCommandRunner::new(HostSpawn::Never);
        let cmd = runner.command("pw-link", &args(&["--output"]));

        assert_eq!(cmd.get_program(), "pw-link");
        assert_eq!(cmd.get_args().collect::<Vec<_>>(), ["--output"]);
    }

    #[test]
    fn test_run_captures_stdout() {
        let runner = HostCommandRunner::new(HostSpawn::Never);
        let out = runner.run("sh", &args(&["-c", "printf 'one\\ntwo\\n'"])).unwrap();

        assert_eq!(out, "one\ntwo");
    }

    #[test]
    fn test_run_reports_exit_code_and_stderr() {
        let runner = HostCommandRunner::new(HostSpawn::Never);
        let err = runner.run("sh", &args(&["-c", "echo boom >&2; exit 3"])).unwrap_err();

        assert_matches!(
            err,
            PwError::Execution { ref program, exit_code: Some(3), ref stderr }
                if program == "sh" && stderr == "boom"
        );
    }

    #[test]
    fn test_run_reports_missing_program() {
        let runner = HostCommandRunner::new(HostSpawn::Never);
        let err = runner.run("whisper-definitely-not-installed", &[]).unwrap_err();

        assert_matches!(err, PwError::Spawn { .. });
    }
}
