//! Configuration schema definitions.
//!
//! Every section carries `#[serde(default)]`, and the `Default` impls hold the
//! built-in command lines. Running without a config file therefore yields
//! exactly the fixed `alembic upgrade head` / `uvicorn ...` sequence.

use serde::{Deserialize, Serialize};

/// Root configuration for the startup orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Schema migration step.
    pub migration: MigrationConfig,

    /// Long-running server step.
    pub server: ServerConfig,

    /// Execution identity policy.
    pub identity: IdentityConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Migration step configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MigrationConfig {
    /// Migration tool executable (resolved through `PATH`).
    pub program: String,

    /// Arguments passed to the migration tool.
    pub args: Vec<String>,

    /// Abort startup when the migration does not exit 0.
    pub fatal_on_failure: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            program: "alembic".to_string(),
            args: vec!["upgrade".to_string(), "head".to_string()],
            fatal_on_failure: true,
        }
    }
}

/// How the server step takes over once migration succeeded.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LaunchStrategy {
    /// Replace the orchestrator's process image with the server.
    #[default]
    Exec,
    /// Spawn the server as a child and relay signals to it.
    Supervise,
}

/// Server step configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Server executable (resolved through `PATH`).
    pub program: String,

    /// Arguments placed before the bind flags (e.g. the ASGI app path).
    pub leading_args: Vec<String>,

    /// Bind address, all interfaces by default.
    pub host: String,

    /// Listening port.
    pub port: u16,

    /// Trust `X-Forwarded-*` headers from the immediate upstream.
    pub proxy_headers: bool,

    /// Upstream addresses allowed to set forwarded headers.
    /// `None` keeps the server's own default.
    pub forwarded_allow_ips: Option<String>,

    /// Exec into the server or supervise it as a child.
    pub launch: LaunchStrategy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            program: "uvicorn".to_string(),
            leading_args: vec!["app.main:app".to_string()],
            host: "0.0.0.0".to_string(),
            port: 8000,
            proxy_headers: true,
            forwarded_allow_ips: None,
            launch: LaunchStrategy::Exec,
        }
    }
}

/// Execution identity policy.
///
/// With no `user`, the identity is whatever the container started us as
/// (the image's `USER`), and it must not be root unless `allow_root` is set.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Account to drop to when started as root.
    pub user: Option<String>,

    /// Group to drop to; defaults to the user's primary group.
    pub group: Option<String>,

    /// Permit running the steps as the superuser.
    pub allow_root: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
