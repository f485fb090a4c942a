//! Error taxonomy and exit-code mapping.

use nix::sys::signal::Signal;
use thiserror::Error;

use crate::config::ConfigError;
use crate::lifecycle::identity::IdentityError;
use crate::process::StepExit;

/// Exit code when a program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code when a program was found but could not be executed.
pub const EXIT_CANNOT_EXECUTE: i32 = 126;
/// Internal failure of the orchestrator itself (sysexits EX_SOFTWARE).
pub const EXIT_SOFTWARE: i32 = 70;
/// Identity policy refused to continue (sysexits EX_NOPERM).
pub const EXIT_NOPERM: i32 = 77;
/// Configuration could not be loaded or validated (sysexits EX_CONFIG).
pub const EXIT_CONFIG: i32 = 78;

/// A step's command could not be started at all.
#[derive(Debug, Error)]
#[error("failed to launch '{program}': {source}")]
pub struct LaunchError {
    pub program: String,
    #[source]
    pub source: std::io::Error,
}

impl LaunchError {
    pub fn new(program: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            program: program.into(),
            source,
        }
    }

    /// Shell-style "could not execute" code: 127 when missing, 126 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.source.kind() {
            std::io::ErrorKind::NotFound => EXIT_NOT_FOUND,
            _ => EXIT_CANNOT_EXECUTE,
        }
    }
}

/// Everything that ends an orchestrator run with a non-zero status.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("step '{step}' failed with {exit}")]
    MigrationFailed { step: String, exit: StepExit },

    #[error("step '{step}' could not be started: {source}")]
    MigrationUnlaunchable {
        step: String,
        #[source]
        source: LaunchError,
    },

    #[error("termination requested by {signal} before the server started")]
    Terminated { signal: Signal },

    #[error("server step '{step}' could not be started: {source}")]
    ServerUnlaunchable {
        step: String,
        #[source]
        source: LaunchError,
    },

    #[error("server step '{step}' exited with {exit}")]
    ServerCrashed { step: String, exit: StepExit },

    #[error("execution identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

impl OrchestratorError {
    /// Process exit status the orchestrator should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            OrchestratorError::MigrationFailed { exit, .. } => exit.exit_code(),
            OrchestratorError::MigrationUnlaunchable { source, .. } => source.exit_code(),
            OrchestratorError::Terminated { signal } => 128 + *signal as i32,
            OrchestratorError::ServerUnlaunchable { source, .. } => source.exit_code(),
            OrchestratorError::ServerCrashed { exit, .. } => exit.exit_code(),
            OrchestratorError::Identity(_) => EXIT_NOPERM,
            OrchestratorError::Config(_) => EXIT_CONFIG,
            OrchestratorError::Signals(_) => EXIT_SOFTWARE,
        }
    }
}
