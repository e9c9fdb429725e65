//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that endpoint path patterns compile
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::routing::Pattern;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid auth header name '{0}'")]
    InvalidHeaderName(String),

    #[error("auth.timeout_ms must be greater than zero")]
    ZeroTimeout,

    #[error("at least one endpoint is required")]
    NoEndpoints,

    #[error("duplicate endpoint name '{0}'")]
    DuplicateEndpoint(String),

    #[error("endpoint '{name}' has an invalid path pattern: {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("error template must contain {{code}} and {{message}}")]
    IncompleteErrorTemplate,
}

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if HeaderName::from_bytes(config.auth.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName(config.auth.header_name.clone()));
    }

    if config.auth.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if config.endpoints.is_empty() {
        errors.push(ValidationError::NoEndpoints);
    }

    let mut names = HashSet::new();
    for endpoint in &config.endpoints {
        if !names.insert(endpoint.name.as_str()) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.name.clone()));
        }
        if let Err(e) = Pattern::new(&endpoint.path) {
            errors.push(ValidationError::InvalidPattern {
                name: endpoint.name.clone(),
                reason: e.to_string(),
            });
        }
    }

    if let Some(template) = &config.templates.error {
        if !template.contains("{code}") || !template.contains("{message}") {
            errors.push(ValidationError::IncompleteErrorTemplate);
        }
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
    use crate::config::schema::{AuthMode, EndpointConfig};

    fn endpoint(name: &str, path: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.to_string(),
            path: path.to_string(),
            auth: AuthMode::None,
        }
    }

    fn valid() -> RouterConfig {
        RouterConfig {
            endpoints: vec![endpoint("public", "^/public$")],
            ..RouterConfig::default()
        }
    }

    #[test]
    fn accepts_minimal_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn requires_an_endpoint() {
        let errors = validate_config(&RouterConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoEndpoints]);
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid();
        config.listener.bind_address = "nowhere".to_string();
        config.auth.header_name = "bad header".to_string();
        config.auth.timeout_ms = 0;
        config.endpoints.push(endpoint("public", "("));
        config.templates.error = Some(r#"{"code":{code}}"#.to_string());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ValidationError::ZeroTimeout));
        assert!(errors.contains(&ValidationError::DuplicateEndpoint("public".to_string())));
        assert!(errors.contains(&ValidationError::IncompleteErrorTemplate));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidPattern { name, .. } if name == "public")));
    }
}
