//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port > 0, non-empty programs)
//! - Detect flag combinations the server would reject
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: OrchestratorConfig → Result<(), Vec<ValidationError>>
//! - Runs before any step is launched

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::OrchestratorConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{section}.program must not be empty")]
    EmptyProgram { section: &'static str },

    #[error("server.port must be non-zero")]
    ZeroPort,

    #[error("server.host must not be empty")]
    EmptyHost,

    #[error("server.forwarded_allow_ips requires server.proxy_headers = true")]
    ForwardedIpsWithoutProxyHeaders,

    #[error("identity.group is set without identity.user")]
    GroupWithoutUser,

    #[error("observability.log_level '{0}' is not a valid filter")]
    InvalidLogLevel(String),
}

/// Check the configuration, collecting every error found.
pub fn validate_config(config: &OrchestratorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.migration.program.trim().is_empty() {
        errors.push(ValidationError::EmptyProgram { section: "migration" });
    }

    let server = &config.server;
    if server.program.trim().is_empty() {
        errors.push(ValidationError::EmptyProgram { section: "server" });
    }
    if server.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if server.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if server.forwarded_allow_ips.is_some() && !server.proxy_headers {
        errors.push(ValidationError::ForwardedIpsWithoutProxyHeaders);
    }

    if config.identity.group.is_some() && config.identity.user.is_none() {
        errors.push(ValidationError::GroupWithoutUser);
    }

    let level = &config.observability.log_level;
    if EnvFilter::try_new(level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&OrchestratorConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_programs_rejected() {
        let mut config = OrchestratorConfig::default();
        config.migration.program = " ".into();
        config.server.program = String::new();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyProgram { section: "migration" }));
        assert!(errors.contains(&ValidationError::EmptyProgram { section: "server" }));
    }

    #[test]
    fn test_forwarded_ips_need_proxy_headers() {
        let mut config = OrchestratorConfig::default();
        config.server.proxy_headers = false;
        config.server.forwarded_allow_ips = Some("10.0.0.1".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::ForwardedIpsWithoutProxyHeaders]);
    }

    #[test]
    fn test_group_without_user_rejected() {
        let mut config = OrchestratorConfig::default();
        config.identity.group = Some("app".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::GroupWithoutUser]);
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let mut config = OrchestratorConfig::default();
        config.observability.log_level = "app=verbose".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidLogLevel(_)));
    }
}
