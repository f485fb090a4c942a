//! External step execution subsystem.
//!
//! # Data Flow
//! ```text
//! OrchestratorConfig
//!     → plan.rs (StartupPlan: migrate [block], serve [become])
//!     → runner.rs (StepRunner: spawn + wait, or exec)
//!     → command.rs (CommandLine → process, ExitStatus → StepExit)
//! ```
//!
//! # Design Decisions
//! - Standard streams are inherited, never captured or reformatted
//! - Only an explicit status 0 counts as success
//! - No step is ever retried

pub mod command;
pub mod plan;
pub mod runner;

pub use command::{CommandLine, StepExit};
pub use plan::{PlanError, StartupPlan, Step, StepMode};
pub use runner::{ProcessRunner, StepRunner};
