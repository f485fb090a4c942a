//! Migrate-then-serve startup orchestrator library

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod process;

pub use config::schema::OrchestratorConfig;
pub use error::{LaunchError, OrchestratorError};
pub use lifecycle::{launch, Orchestrator, Phase};
pub use process::{StartupPlan, StepExit};
