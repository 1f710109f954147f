//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges of brute-force listeners
//! - Check listener bindings (username listeners need a backend)
//! - Check XFF settings are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SecurityConfig → Result<(), Vec<ValidationError>>
//! - Alias resolution and chain ordering are checked by the snapshot builder,
//!   which owns the alias registry

use thiserror::Error;

use crate::config::schema::{DynamicConfig, SecurityConfig};

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("auth failure listener '{listener}': {field} must be greater than zero")]
    ZeroLimit {
        listener: String,
        field: &'static str,
    },

    #[error("auth failure listener '{listener}': {field} must not exceed {} seconds", MAX_DURATION_SECONDS)]
    DurationTooLong {
        listener: String,
        field: &'static str,
    },

    #[error("auth failure listener '{0}': username listeners require an authentication_backend")]
    UnboundUsernameListener(String),

    #[error("authc domain '{0}': http_authenticator type must not be empty")]
    EmptyHttpAuthenticator(String),

    #[error("authc domain '{0}': authentication_backend type must not be empty")]
    EmptyAuthenticationBackend(String),

    #[error("authz domain '{0}': authorization_backend type must not be empty")]
    EmptyAuthorizationBackend(String),

    #[error("xff: remote_ip_header must not be empty when xff is enabled")]
    EmptyRemoteIpHeader,

    #[error("kibana: index must not be empty")]
    EmptyDashboardsIndex,
}

/// Upper bound for listener windows and block durations (about a century).
pub const MAX_DURATION_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

/// Validate a whole configuration document.
pub fn validate_config(config: &SecurityConfig) -> Result<(), Vec<ValidationError>> {
    validate_dynamic(&config.dynamic)
}

/// Validate the dynamic section on its own.
pub fn validate_dynamic(dynamic: &DynamicConfig) -> Result<(), Vec<ValidationError>> {
    let errors = collect_errors(dynamic);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn collect_errors(dynamic: &DynamicConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (name, domain) in &dynamic.authc {
        if domain.http_authenticator.kind.trim().is_empty() {
            errors.push(ValidationError::EmptyHttpAuthenticator(name.clone()));
        }
        if domain.authentication_backend.kind.trim().is_empty() {
            errors.push(ValidationError::EmptyAuthenticationBackend(name.clone()));
        }
    }

    for (name, domain) in &dynamic.authz {
        if domain.authorization_backend.kind.trim().is_empty() {
            errors.push(ValidationError::EmptyAuthorizationBackend(name.clone()));
        }
    }

    for (name, listener) in &dynamic.auth_failure_listeners {
        let limits = [
            ("allowed_tries", listener.allowed_tries as u64),
            ("time_window_seconds", listener.time_window_seconds),
            ("block_expiry_seconds", listener.block_expiry_seconds),
            ("max_blocked_clients", listener.max_blocked_clients as u64),
            ("max_tracked_clients", listener.max_tracked_clients as u64),
        ];
        for (field, value) in limits {
            if value == 0 {
                errors.push(ValidationError::ZeroLimit {
                    listener: name.clone(),
                    field,
                });
            }
        }

        let durations = [
            ("time_window_seconds", listener.time_window_seconds),
            ("block_expiry_seconds", listener.block_expiry_seconds),
        ];
        for (field, value) in durations {
            if value > MAX_DURATION_SECONDS {
                errors.push(ValidationError::DurationTooLong {
                    listener: name.clone(),
                    field,
                });
            }
        }

        let bound = listener
            .authentication_backend
            .as_deref()
            .is_some_and(|backend| !backend.trim().is_empty());
        if listener.kind.starts_with("username") && !bound {
            errors.push(ValidationError::UnboundUsernameListener(name.clone()));
        }
    }

    if dynamic.http.xff.enabled && dynamic.http.xff.remote_ip_header.trim().is_empty() {
        errors.push(ValidationError::EmptyRemoteIpHeader);
    }

    if dynamic.kibana.index.trim().is_empty() {
        errors.push(ValidationError::EmptyDashboardsIndex);
    }

    errors
}
