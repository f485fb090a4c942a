//! The ordered startup sequence.
//!
//! A `StartupPlan` is the immutable value the orchestrator walks: zero or
//! more blocking steps followed by exactly one step the orchestrator becomes.

use serde::Serialize;
use thiserror::Error;

use crate::config::{LaunchStrategy, OrchestratorConfig, ServerConfig};
use crate::process::CommandLine;

/// Whether a step runs to completion or takes over the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StepMode {
    Block,
    Become { strategy: LaunchStrategy },
}

/// One external command in the startup sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub name: String,
    pub command: CommandLine,
    pub fatal_on_failure: bool,
    #[serde(flatten)]
    pub mode: StepMode,
}

impl Step {
    pub fn block(name: impl Into<String>, command: CommandLine, fatal_on_failure: bool) -> Self {
        Self {
            name: name.into(),
            command,
            fatal_on_failure,
            mode: StepMode::Block,
        }
    }

    pub fn become_(name: impl Into<String>, command: CommandLine, strategy: LaunchStrategy) -> Self {
        Self {
            name: name.into(),
            command,
            fatal_on_failure: true,
            mode: StepMode::Become { strategy },
        }
    }
}

/// Structural problems with a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("startup plan has no steps")]
    Empty,
    #[error("startup plan must end with exactly one server step, found {0}")]
    BecomeCount(usize),
    #[error("server step '{0}' must be the last step")]
    BecomeNotLast(String),
}

/// Validated, ordered list of startup steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupPlan {
    steps: Vec<Step>,
}

impl StartupPlan {
    pub fn new(steps: Vec<Step>) -> Result<Self, PlanError> {
        let last = steps.last().ok_or(PlanError::Empty)?;

        let become_count = steps
            .iter()
            .filter(|s| matches!(s.mode, StepMode::Become { .. }))
            .count();
        if become_count != 1 {
            return Err(PlanError::BecomeCount(become_count));
        }
        if !matches!(last.mode, StepMode::Become { .. }) {
            let misplaced = steps
                .iter()
                .find(|s| matches!(s.mode, StepMode::Become { .. }))
                .map(|s| s.name.clone())
                .unwrap_or_default();
            return Err(PlanError::BecomeNotLast(misplaced));
        }

        Ok(Self { steps })
    }

    /// The migrate-then-serve plan described by the configuration.
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        let migrate = Step::block(
            "migrate",
            CommandLine::new(&config.migration.program, &config.migration.args),
            config.migration.fatal_on_failure,
        );
        let serve = Step::become_("serve", server_command(&config.server), config.server.launch);

        Self {
            steps: vec![migrate, serve],
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Blocking steps that must finish before the server starts.
    pub fn preparation(&self) -> &[Step] {
        &self.steps[..self.steps.len() - 1]
    }

    /// The step the orchestrator becomes.
    pub fn server(&self) -> &Step {
        &self.steps[self.steps.len() - 1]
    }
}

/// Server argv: leading args, then bind address, port, and proxy flags.
pub fn server_command(server: &ServerConfig) -> CommandLine {
    let mut args = server.leading_args.clone();
    args.extend([
        "--host".to_string(),
        server.host.clone(),
        "--port".to_string(),
        server.port.to_string(),
    ]);
    if server.proxy_headers {
        args.push("--proxy-headers".to_string());
        if let Some(ips) = &server.forwarded_allow_ips {
            args.push("--forwarded-allow-ips".to_string());
            args.push(ips.clone());
        }
    }
    CommandLine::new(&server.program, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_is_migrate_then_serve() {
        let plan = StartupPlan::from_config(&OrchestratorConfig::default());
        let names: Vec<_> = plan.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["migrate", "serve"]);

        let migrate = &plan.preparation()[0];
        assert_eq!(migrate.command.argv(), vec!["alembic", "upgrade", "head"]);
        assert!(migrate.fatal_on_failure);
        assert_eq!(migrate.mode, StepMode::Block);

        assert_eq!(
            plan.server().command.argv(),
            vec![
                "uvicorn",
                "app.main:app",
                "--host",
                "0.0.0.0",
                "--port",
                "8000",
                "--proxy-headers"
            ]
        );
        assert_eq!(
            plan.server().mode,
            StepMode::Become { strategy: LaunchStrategy::Exec }
        );
    }

    #[test]
    fn test_forwarded_allow_ips_follow_proxy_flag() {
        let mut config = OrchestratorConfig::default();
        config.server.forwarded_allow_ips = Some("*".into());
        let cmd = server_command(&config.server);
        assert!(cmd.args.ends_with(&["--proxy-headers".into(), "--forwarded-allow-ips".into(), "*".into()]));

        config.server.proxy_headers = false;
        let cmd = server_command(&config.server);
        assert!(!cmd.args.iter().any(|a| a.starts_with("--proxy") || a.starts_with("--forwarded")));
    }

    #[test]
    fn test_plan_structure_rules() {
        let serve = || Step::become_("serve", CommandLine::new("srv", Vec::<String>::new()), LaunchStrategy::Exec);
        let migrate = || Step::block("migrate", CommandLine::new("mig", Vec::<String>::new()), true);

        assert_eq!(StartupPlan::new(vec![]), Err(PlanError::Empty));
        assert_eq!(StartupPlan::new(vec![migrate()]), Err(PlanError::BecomeCount(0)));
        assert_eq!(StartupPlan::new(vec![serve(), serve()]), Err(PlanError::BecomeCount(2)));
        assert_eq!(
            StartupPlan::new(vec![serve(), migrate()]),
            Err(PlanError::BecomeNotLast("serve".into()))
        );

        let plan = StartupPlan::new(vec![migrate(), migrate(), serve()]).unwrap();
        assert_eq!(plan.preparation().len(), 2);
        assert_eq!(plan.server().name, "serve");
    }

    #[test]
    fn test_plan_serializes_for_printing() {
        let plan = StartupPlan::from_config(&OrchestratorConfig::default());
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["steps"][0]["mode"], "block");
        assert_eq!(json["steps"][1]["mode"], "become");
        assert_eq!(json["steps"][1]["strategy"], "exec");
    }
}
