//! Running steps as real processes.

use std::os::unix::process::CommandExt;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::config::LaunchStrategy;
use crate::error::LaunchError;
use crate::lifecycle::signals::{is_termination, SignalSource};
use crate::process::{Step, StepExit, StepMode};

/// Executes the steps of a startup plan.
///
/// The orchestrator only sees this seam, so sequencing can be exercised
/// without the real migration and server binaries.
#[async_trait]
pub trait StepRunner: Send {
    /// Run a step and wait for it to terminate.
    async fn run_to_completion(&mut self, step: &Step) -> Result<StepExit, LaunchError>;

    /// Hand the process over to the step. Returns once the step has exited,
    /// or never if the process image was replaced.
    async fn become_process(&mut self, step: &Step) -> Result<StepExit, LaunchError>;

    /// First termination signal (TERM/INT/QUIT) received before the server
    /// step, including any still queued. The server must not start if set.
    async fn termination_requested(&mut self) -> Option<Signal>;
}

/// Production runner: spawns children with inherited stdio and relays signals.
pub struct ProcessRunner<S> {
    signals: S,
    termination: Option<Signal>,
}

impl<S: SignalSource> ProcessRunner<S> {
    pub fn new(signals: S) -> Self {
        Self {
            signals,
            termination: None,
        }
    }

    fn note_termination(&mut self, sig: Signal) {
        if is_termination(sig) && self.termination.is_none() {
            info!(signal = %sig, "Termination requested before server start");
            self.termination = Some(sig);
        }
    }

    /// Spawn the step, forward signals to it, and wait for it to exit.
    async fn supervise(&mut self, step: &Step) -> Result<StepExit, LaunchError> {
        let program = &step.command.program;
        // Own process group: terminal Ctrl-C reaches only us and is forwarded once.
        let mut child = step
            .command
            .to_tokio()
            .process_group(0)
            .spawn()
            .map_err(|e| LaunchError::new(program, e))?;

        let pid = child.id().and_then(|id| i32::try_from(id).ok()).map(Pid::from_raw);
        info!(step = %step.name, pid = ?child.id(), command = %step.command, "Step started");

        loop {
            tokio::select! {
                biased;
                status = child.wait() => {
                    let exit = StepExit::from(status.map_err(|e| LaunchError::new(program, e))?);
                    info!(step = %step.name, %exit, "Step exited");
                    return Ok(exit);
                }
                Some(sig) = self.signals.recv() => {
                    if step.mode == StepMode::Block {
                        self.note_termination(sig);
                    }
                    forward_signal(&step.name, pid, sig);
                }
            }
        }
    }
}

/// Relay `sig` to the child; a child that already exited is not an error.
fn forward_signal(step: &str, pid: Option<Pid>, sig: Signal) {
    let Some(pid) = pid else {
        debug!(step, signal = %sig, "Child already reaped, signal dropped");
        return;
    };
    match kill(pid, sig) {
        Ok(()) => info!(step, pid = pid.as_raw(), signal = %sig, "Signal forwarded"),
        Err(Errno::ESRCH) => debug!(step, pid = pid.as_raw(), signal = %sig, "Child gone, signal dropped"),
        Err(e) => warn!(step, pid = pid.as_raw(), signal = %sig, error = %e, "Failed to forward signal"),
    }
}

/// Replace the current process image. Only returns on failure.
fn exec_into(step: &Step) -> LaunchError {
    info!(step = %step.name, command = %step.command, "Replacing orchestrator with step");
    let err = step.command.to_std().exec();
    LaunchError::new(&step.command.program, err)
}

#[async_trait]
impl<S: SignalSource> StepRunner for ProcessRunner<S> {
    async fn run_to_completion(&mut self, step: &Step) -> Result<StepExit, LaunchError> {
        self.supervise(step).await
    }

    async fn become_process(&mut self, step: &Step) -> Result<StepExit, LaunchError> {
        match step.mode {
            StepMode::Become {
                strategy: LaunchStrategy::Exec,
            } => Err(exec_into(step)),
            StepMode::Become {
                strategy: LaunchStrategy::Supervise,
            }
            | StepMode::Block => self.supervise(step).await,
        }
    }

    async fn termination_requested(&mut self) -> Option<Signal> {
        // Let the relay's listener tasks push anything already delivered.
        tokio::task::yield_now().await;
        while let Some(sig) = self.signals.try_recv() {
            if is_termination(sig) {
                self.note_termination(sig);
            } else {
                debug!(signal = %sig, "No child to forward to, signal dropped");
            }
        }
        self.termination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandLine;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn sh(script: &str) -> Step {
        Step::block("test", CommandLine::new("sh", ["-c", script]), true)
    }

    fn runner() -> (ProcessRunner<mpsc::UnboundedReceiver<Signal>>, mpsc::UnboundedSender<Signal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ProcessRunner::new(rx), tx)
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let (mut runner, _tx) = runner();
        assert_eq!(runner.run_to_completion(&sh("exit 0")).await.unwrap(), StepExit::Code(0));
        assert_eq!(runner.run_to_completion(&sh("exit 5")).await.unwrap(), StepExit::Code(5));
    }

    #[tokio::test]
    async fn test_killed_child_reports_signal() {
        let (mut runner, _tx) = runner();
        let exit = runner.run_to_completion(&sh("kill -TERM $$")).await.unwrap();
        assert_eq!(exit, StepExit::Signaled(15));
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let (mut runner, _tx) = runner();
        let step = Step::block(
            "test",
            CommandLine::new("__nonexistent_migration_tool__", Vec::<String>::new()),
            true,
        );
        let err = runner.run_to_completion(&step).await.unwrap_err();
        assert_eq!(err.exit_code(), 127);
        assert_eq!(err.program, "__nonexistent_migration_tool__");
    }

    #[tokio::test]
    async fn test_signal_is_forwarded_to_child() {
        let dir = tempfile::tempdir().unwrap();
        let ready = dir.path().join("ready");
        let script = format!(
            "trap 'exit 0' TERM; touch '{}'; while :; do sleep 0.05; done",
            ready.display()
        );
        let (mut runner, tx) = runner();

        let waiter = tokio::spawn(async move {
            for _ in 0..200 {
                if ready.exists() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            tx.send(Signal::SIGTERM).unwrap();
            tx
        });

        let exit = tokio::time::timeout(Duration::from_secs(10), runner.run_to_completion(&sh(&script)))
            .await
            .expect("child did not exit after SIGTERM")
            .unwrap();
        assert_eq!(exit, StepExit::Code(0));
        drop(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_termination_during_block_step_is_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let ready = dir.path().join("ready");
        let script = format!(
            "trap 'exit 0' TERM; touch '{}'; while :; do sleep 0.05; done",
            ready.display()
        );
        let (mut runner, tx) = runner();
        assert_eq!(runner.termination_requested().await, None);

        let waiter = tokio::spawn(async move {
            for _ in 0..200 {
                if ready.exists() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            tx.send(Signal::SIGTERM).unwrap();
            tx
        });

        let exit = tokio::time::timeout(Duration::from_secs(10), runner.run_to_completion(&sh(&script)))
            .await
            .expect("child did not exit after SIGTERM")
            .unwrap();
        assert_eq!(exit, StepExit::Code(0));
        assert_eq!(runner.termination_requested().await, Some(Signal::SIGTERM));
        drop(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_queued_signals_between_steps() {
        let (mut runner, tx) = runner();
        tx.send(Signal::SIGHUP).unwrap();
        assert_eq!(runner.termination_requested().await, None);

        tx.send(Signal::SIGINT).unwrap();
        tx.send(Signal::SIGTERM).unwrap();
        assert_eq!(runner.termination_requested().await, Some(Signal::SIGINT));
    }

    #[tokio::test]
    async fn test_child_runs_in_own_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("pgrp");
        let script = format!(
            "echo $$ $(cut -d' ' -f5 /proc/$$/stat) > '{}'",
            out.display()
        );
        let (mut runner, _tx) = runner();
        assert_eq!(runner.run_to_completion(&sh(&script)).await.unwrap(), StepExit::Code(0));

        let line = std::fs::read_to_string(&out).unwrap();
        let ids: Vec<i32> = line.split_whitespace().map(|v| v.parse().unwrap()).collect();
        assert_eq!(ids[0], ids[1], "child is not its own process group leader");
        assert_ne!(ids[1], nix::unistd::getpgrp().as_raw());
    }

    #[tokio::test]
    async fn test_supervised_become_waits_for_child() {
        let (mut runner, _tx) = runner();
        let step = Step::become_(
            "serve",
            CommandLine::new("sh", ["-c", "exit 4"]),
            LaunchStrategy::Supervise,
        );
        assert_eq!(runner.become_process(&step).await.unwrap(), StepExit::Code(4));
    }
}
