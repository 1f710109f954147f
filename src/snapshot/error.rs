//! Snapshot construction errors.

use thiserror::Error;

use crate::auth::alias::UnknownAliasError;
use crate::auth::backend::BackendError;
use crate::auth::domain::Protocol;
use crate::config::validation::ValidationError;

/// Why a configuration could not become a snapshot.
///
/// Any of these aborts the whole build; the live snapshot stays in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{section} '{name}': {source}")]
    UnknownAlias {
        section: &'static str,
        name: String,
        #[source]
        source: UnknownAliasError,
    },

    #[error("authc domains '{first}' and '{second}' share order {order} on the {} layer", .protocol.as_str())]
    DuplicateOrder {
        protocol: Protocol,
        order: u32,
        first: String,
        second: String,
    },

    #[error("{section} '{name}': malformed settings: {source}")]
    MalformedSettings {
        section: &'static str,
        name: String,
        #[source]
        source: BackendError,
    },

    #[error("{section} '{name}': {source}")]
    MissingImplementation {
        section: &'static str,
        name: String,
        #[source]
        source: BackendError,
    },

    #[error("xff: invalid internal_proxies pattern: {0}")]
    InvalidTrustedProxies(String),

    #[error("invalid configuration: {}", join(.0))]
    Invalid(Vec<ValidationError>),
}

impl ConfigurationError {
    /// Wrap a factory error for one named section.
    pub(crate) fn from_backend(section: &'static str, name: &str, source: BackendError) -> Self {
        match source {
            BackendError::Unavailable(_) => ConfigurationError::MissingImplementation {
                section,
                name: name.to_string(),
                source,
            },
            _ => ConfigurationError::MalformedSettings {
                section,
                name: name.to_string(),
                source,
            },
        }
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
