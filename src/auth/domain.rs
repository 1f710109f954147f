//! Resolved authentication domains and authorizers.

use std::fmt;
use std::sync::Arc;

use crate::auth::alias::{AuthorizationBackendKind, CredentialBackendKind, HttpAuthenticatorKind};
use crate::auth::backend::{AuthenticationBackend, AuthorizationBackend, HttpAuthenticator};

/// Protocol layer a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Rest,
    Transport,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Rest => "rest",
            Protocol::Transport => "transport",
        }
    }
}

/// One (HTTP authenticator, authentication backend) pairing in the chain.
#[derive(Clone)]
pub struct AuthDomain {
    pub(crate) name: String,
    pub(crate) order: u32,
    pub(crate) description: String,
    pub(crate) challenge: bool,
    pub(crate) http_enabled: bool,
    pub(crate) transport_enabled: bool,
    pub(crate) http_kind: HttpAuthenticatorKind,
    pub(crate) backend_kind: CredentialBackendKind,
    pub(crate) http_authenticator: Arc<dyn HttpAuthenticator>,
    pub(crate) backend: Arc<dyn AuthenticationBackend>,
}

impl AuthDomain {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn challenge(&self) -> bool {
        self.challenge
    }

    pub fn is_enabled(&self, protocol: Protocol) -> bool {
        match protocol {
            Protocol::Rest => self.http_enabled,
            Protocol::Transport => self.transport_enabled,
        }
    }

    pub fn http_kind(&self) -> HttpAuthenticatorKind {
        self.http_kind
    }

    pub fn backend_kind(&self) -> CredentialBackendKind {
        self.backend_kind
    }

    /// Name per-backend limiters are keyed by.
    pub fn backend_name(&self) -> &'static str {
        self.backend_kind.name()
    }

    pub fn http_authenticator(&self) -> &dyn HttpAuthenticator {
        self.http_authenticator.as_ref()
    }

    pub fn backend(&self) -> &dyn AuthenticationBackend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for AuthDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthDomain")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("http_kind", &self.http_kind)
            .field("backend_kind", &self.backend_kind)
            .field("http_enabled", &self.http_enabled)
            .field("transport_enabled", &self.transport_enabled)
            .finish()
    }
}

/// One authorization backend of the aggregated set.
#[derive(Clone)]
pub struct AuthorizerDomain {
    pub(crate) name: String,
    pub(crate) kind: AuthorizationBackendKind,
    pub(crate) http_enabled: bool,
    pub(crate) transport_enabled: bool,
    pub(crate) backend: Arc<dyn AuthorizationBackend>,
}

impl AuthorizerDomain {
    pub fn new(name: impl Into<String>, kind: AuthorizationBackendKind, backend: Arc<dyn AuthorizationBackend>) -> Self {
        Self {
            name: name.into(),
            kind,
            http_enabled: true,
            transport_enabled: true,
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AuthorizationBackendKind {
        self.kind
    }

    pub fn is_enabled(&self, protocol: Protocol) -> bool {
        match protocol {
            Protocol::Rest => self.http_enabled,
            Protocol::Transport => self.transport_enabled,
        }
    }

    pub fn backend(&self) -> &dyn AuthorizationBackend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for AuthorizerDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizerDomain")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}
