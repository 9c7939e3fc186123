//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (drain timeout > 0, bind address parses)
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use axum::http::Uri;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::routing::RoutePath;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    BindAddress(String),

    #[error("drain timeout must be greater than zero")]
    ZeroDrainTimeout,

    #[error("route `{path}`: upstream `{upstream}` is not an absolute http URI")]
    Upstream { path: String, upstream: String },

    #[error("route `{0}` is defined more than once")]
    DuplicateRoute(String),

    #[error("invalid metrics address `{0}`")]
    MetricsAddress(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.listener.drain_timeout_ms == 0 {
        errors.push(ValidationError::ZeroDrainTimeout);
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        let valid_upstream = route
            .upstream
            .parse::<Uri>()
            .map(|uri| uri.scheme_str() == Some("http") && uri.authority().is_some())
            .unwrap_or(false);
        if !valid_upstream {
            errors.push(ValidationError::Upstream {
                path: route.path.clone(),
                upstream: route.upstream.clone(),
            });
        }

        if !seen.insert(RoutePath::new(&route.path)) {
            errors.push(ValidationError::DuplicateRoute(route.path.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
