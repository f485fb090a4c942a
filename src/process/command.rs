//! Command lines and exit statuses of external steps.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};

use serde::{Deserialize, Serialize};

/// An argument vector for one external program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Full argv, program first.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// Async command with all three standard streams inherited.
    pub fn to_tokio(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(false);
        cmd
    }

    /// Blocking command, used for exec.
    pub fn to_std(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// How an external step terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepExit {
    /// Exited normally with this status code.
    Code(i32),
    /// Killed by this signal number.
    Signaled(i32),
}

impl StepExit {
    /// Only an explicit status 0 counts as success.
    pub fn success(&self) -> bool {
        matches!(self, StepExit::Code(0))
    }

    /// Status to propagate, using the shell's `128 + n` for signals.
    pub fn exit_code(&self) -> i32 {
        match *self {
            StepExit::Code(code) => code,
            StepExit::Signaled(sig) => 128 + sig,
        }
    }
}

impl From<ExitStatus> for StepExit {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => StepExit::Code(code),
            (None, Some(sig)) => StepExit::Signaled(sig),
            // Stopped/continued statuses never come out of wait(); treat as failure.
            (None, None) => StepExit::Code(1),
        }
    }
}

impl fmt::Display for StepExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepExit::Code(code) => write!(f, "exit code {code}"),
            StepExit::Signaled(sig) => write!(f, "signal {sig}"),
        }
    }
}
