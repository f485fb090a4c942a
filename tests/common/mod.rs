//! Shared utilities for end-to-end orchestrator tests.

use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};

use startup_orchestrator::config::{LaunchStrategy, OrchestratorConfig};

/// Path of the compiled orchestrator binary.
pub const BIN: &str = env!("CARGO_BIN_EXE_startup-orchestrator");

/// Defaults plus what every scenario needs: root tolerated (CI containers) and chatty logs.
pub fn base_config(launch: LaunchStrategy) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config.identity.allow_root = true;
    config.server.launch = launch;
    config.observability.log_level = "debug".into();
    config
}

/// Replace the migration tool with an inline shell script.
pub fn shell_migration(config: &mut OrchestratorConfig, script: &str) {
    config.migration.program = "sh".into();
    config.migration.args = vec!["-c".into(), script.into()];
}

/// Replace the server with an inline shell script.
///
/// Inside the script `$1..$n` are `positional`, followed by the bind flags
/// the orchestrator appends.
pub fn shell_server(config: &mut OrchestratorConfig, script: &str, positional: &[&Path]) {
    config.server.program = "sh".into();
    let mut leading: Vec<String> = vec!["-c".into(), script.into(), "server".into()];
    leading.extend(positional.iter().map(|p| p.display().to_string()));
    config.server.leading_args = leading;
}

/// Write the config as TOML into `dir`.
pub fn write_config(dir: &Path, config: &OrchestratorConfig) -> PathBuf {
    let path = dir.join("orchestrator.toml");
    std::fs::write(&path, toml::to_string(config).unwrap()).unwrap();
    path
}

/// Poll until `path` exists.
#[allow(dead_code)]
pub fn wait_for_file(path: &Path, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

/// Poll the child until it exits, killing it if the deadline passes.
#[allow(dead_code)]
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("orchestrator did not exit within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
