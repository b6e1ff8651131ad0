//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Validate addresses and connection strings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address().parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.host",
            format!("`{}` is not a valid IP address", config.listener.host),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::new("timeouts.request_ms", "must be greater than 0"));
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }
    if config.engine.jq_path.trim().is_empty() {
        errors.push(ValidationError::new("engine.jq_path", "must not be empty"));
    }
    if config.engine.max_output_bytes == 0 {
        errors.push(ValidationError::new("engine.max_output_bytes", "must be greater than 0"));
    }
    if config.engine.max_concurrency == 0 {
        errors.push(ValidationError::new("engine.max_concurrency", "must be greater than 0"));
    }
    if config.fetch.enabled && config.fetch.max_response_bytes == 0 {
        errors.push(ValidationError::new("fetch.max_response_bytes", "must be greater than 0"));
    }
    if config.database_url.trim().is_empty() {
        errors.push(ValidationError::new("database_url", "must not be empty"));
    } else if let Err(e) = url::Url::parse(&config.database_url) {
        errors.push(ValidationError::new("database_url", e.to_string()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
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
    fn default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = AppConfig::default();
        config.listener.host = "not-an-ip".into();
        config.timeouts.request_ms = 0;
        config.limits.max_body_bytes = 0;
        config.database_url = String::new();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["listener.host", "timeouts.request_ms", "limits.max_body_bytes", "database_url"]
        );
    }

    #[test]
    fn fetch_limit_only_checked_when_enabled() {
        let mut config = AppConfig::default();
        config.fetch.max_response_bytes = 0;
        assert!(validate_config(&config).is_ok());

        config.fetch.enabled = true;
        config.engine.max_concurrency = 0;
        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["engine.max_concurrency", "fetch.max_response_bytes"]);
    }

    #[test]
    fn metrics_address_only_checked_when_enabled() {
        let mut config = AppConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "observability.metrics_address");
    }
}
