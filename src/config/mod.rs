//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! no file                     → OrchestratorConfig::default() (fixed command lines)
//! --config file.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//! → OrchestratorConfig (validated, immutable)
//!     → StartupPlan::from_config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError};
pub use schema::IdentityConfig;
pub use schema::LaunchStrategy;
pub use schema::MigrationConfig;
pub use schema::ObservabilityConfig;
pub use schema::OrchestratorConfig;
pub use schema::ServerConfig;
