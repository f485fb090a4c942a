//! Startup orchestration.
//!
//! # Responsibilities
//! - Establish the execution identity
//! - Run the migration step to completion and gate on its status
//! - Launch the server and stay resident only to supervise it
//!
//! # Design Decisions
//! - Fail fast: a failed or unlaunchable migration is fatal
//! - Steps run in order, never concurrently
//! - No retries; restart policy belongs to the platform

use std::fmt;

use tracing::{error, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::lifecycle::identity;
use crate::lifecycle::signals::SignalRelay;
use crate::process::{ProcessRunner, StartupPlan, StepRunner};

/// Orchestrator state: `Init → Migrating → {Serving | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Migrating,
    Serving,
    Failed,
}

impl Phase {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_enter(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Init, Phase::Migrating)
                | (Phase::Migrating, Phase::Serving)
                | (Phase::Migrating, Phase::Failed)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Migrating => "migrating",
            Phase::Serving => "serving",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn enter(phase: &mut Phase, next: Phase) {
    debug_assert!(phase.can_enter(next), "invalid transition {phase} -> {next}");
    info!(from = %phase, to = %next, "Phase transition");
    *phase = next;
}

/// Walks a [`StartupPlan`] with a fail-fast gate before the server step.
pub struct Orchestrator<R> {
    plan: StartupPlan,
    runner: R,
}

impl<R: StepRunner> Orchestrator<R> {
    pub fn new(plan: StartupPlan, runner: R) -> Self {
        Self { plan, runner }
    }

    /// Run the plan once. `Ok(())` means the server ran and exited 0.
    pub async fn run(self) -> Result<(), OrchestratorError> {
        let Self { plan, mut runner } = self;
        let mut phase = Phase::Init;

        enter(&mut phase, Phase::Migrating);
        for step in plan.preparation() {
            info!(step = %step.name, command = %step.command, "Running step");
            match runner.run_to_completion(step).await {
                Ok(exit) if exit.success() => {
                    info!(step = %step.name, "Step succeeded");
                }
                Ok(exit) if !step.fatal_on_failure => {
                    warn!(step = %step.name, %exit, "Non-fatal step failed, continuing");
                }
                Ok(exit) => {
                    enter(&mut phase, Phase::Failed);
                    error!(step = %step.name, %exit, "Step failed, server will not start");
                    return Err(OrchestratorError::MigrationFailed {
                        step: step.name.clone(),
                        exit,
                    });
                }
                Err(source) if !step.fatal_on_failure => {
                    warn!(step = %step.name, error = %source, "Non-fatal step could not start, continuing");
                }
                Err(source) => {
                    enter(&mut phase, Phase::Failed);
                    error!(step = %step.name, error = %source, "Step could not start, server will not start");
                    return Err(OrchestratorError::MigrationUnlaunchable {
                        step: step.name.clone(),
                        source,
                    });
                }
            }
        }

        if let Some(signal) = runner.termination_requested().await {
            enter(&mut phase, Phase::Failed);
            warn!(%signal, "Termination requested during migration, server will not start");
            return Err(OrchestratorError::Terminated { signal });
        }

        let server = plan.server();
        enter(&mut phase, Phase::Serving);
        info!(step = %server.name, command = %server.command, "Launching server");

        match runner.become_process(server).await {
            Ok(exit) if exit.success() => {
                info!(step = %server.name, "Server exited cleanly");
                Ok(())
            }
            Ok(exit) => {
                error!(step = %server.name, %exit, "Server exited with failure");
                Err(OrchestratorError::ServerCrashed {
                    step: server.name.clone(),
                    exit,
                })
            }
            Err(source) => {
                error!(step = %server.name, error = %source, "Server could not start");
                Err(OrchestratorError::ServerUnlaunchable {
                    step: server.name.clone(),
                    source,
                })
            }
        }
    }
}

/// Full startup: identity, signal relay, then the configured plan.
pub async fn launch(config: &OrchestratorConfig) -> Result<(), OrchestratorError> {
    let credentials = identity::establish(&config.identity)?;

    let plan = StartupPlan::from_config(config);
    info!(
        uid = credentials.uid,
        gid = credentials.gid,
        steps = plan.steps().len(),
        "Startup plan ready"
    );

    let signals = SignalRelay::install().map_err(OrchestratorError::Signals)?;
    Orchestrator::new(plan, ProcessRunner::new(signals)).run().await
}
