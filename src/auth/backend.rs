//! Backend capability contracts.
//!
//! # Responsibilities
//! - Define what the chain needs from HTTP authenticators, authentication
//!   backends and authorization backends
//! - Define the request, credential and user values they exchange
//! - Define the factory through which the snapshot builder obtains instances
//!
//! # Design Decisions
//! - Backends are synchronous boundaries; anything slow (LDAP, IdP calls)
//!   runs under the collaborator's own timeout policy
//! - The implementation set is closed (see `alias`), so the factory is
//!   keyed by enum rather than by type name

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::auth::alias::{AuthorizationBackendKind, CredentialBackendKind, HttpAuthenticatorKind};
use crate::config::Settings;

/// Name of the principal granted when every domain abstains.
pub const ANONYMOUS_USER: &str = "opendistro_security_anonymous";

/// Backend role carried by the anonymous principal.
pub const ANONYMOUS_BACKEND_ROLE: &str = "opendistro_security_anonymous_backendrole";

/// Errors raised by backends, at build time or at request time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The per-domain settings block cannot be used.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// No implementation for this kind is linked into the process.
    #[error("no implementation linked for {0}")]
    Unavailable(String),

    /// A request-time failure talking to the backend.
    #[error("backend failure: {0}")]
    Failed(String),
}

/// The inbound request, as far as authentication is concerned.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Address of the direct peer.
    pub remote_address: IpAddr,
    /// Header values keyed by lowercase name.
    pub headers: BTreeMap<String, String>,
    /// Subject DN of a verified TLS client certificate.
    pub client_certificate_principal: Option<String>,
}

impl AuthRequest {
    pub fn new(remote_address: IpAddr) -> Self {
        Self {
            remote_address,
            headers: BTreeMap::new(),
            client_certificate_principal: None,
        }
    }

    /// Add a header; the name is stored lowercase.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_client_certificate(mut self, principal: impl Into<String>) -> Self {
        self.client_certificate_principal = Some(principal.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// A request after client address resolution.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub request: &'a AuthRequest,
    /// Effective client address (behind trusted proxies when XFF applies).
    pub client_address: IpAddr,
    /// The direct peer is a trusted proxy.
    pub via_trusted_proxy: bool,
}

impl<'a> RequestContext<'a> {
    /// Context for a request that did not pass through a trusted proxy.
    pub fn direct(request: &'a AuthRequest) -> Self {
        Self {
            request,
            client_address: request.remote_address,
            via_trusted_proxy: false,
        }
    }

    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.request.header(name)
    }
}

/// Credentials extracted by an HTTP authenticator.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
    pub backend_roles: BTreeSet<String>,
    pub attributes: BTreeMap<String, String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("backend_roles", &self.backend_roles)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub backend_roles: BTreeSet<String>,
    pub attributes: BTreeMap<String, String>,
    /// Set only by [`User::anonymous`]; the name alone proves nothing.
    anonymous: bool,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend_roles: BTreeSet::new(),
            attributes: BTreeMap::new(),
            anonymous: false,
        }
    }

    pub fn anonymous() -> Self {
        let mut user = Self::new(ANONYMOUS_USER);
        user.backend_roles.insert(ANONYMOUS_BACKEND_ROLE.to_string());
        user.anonymous = true;
        user
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}

impl From<&Credentials> for User {
    fn from(credentials: &Credentials) -> Self {
        Self {
            name: credentials.username.clone(),
            backend_roles: credentials.backend_roles.clone(),
            attributes: credentials.attributes.clone(),
            anonymous: false,
        }
    }
}

/// Outcome of asking an authentication backend about a set of credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The credentials are valid.
    Authenticated(User),
    /// The backend has nothing to say about these credentials.
    Abstain,
    /// The credentials are wrong.
    Denied,
}

/// Extracts credentials from a request. `None` means the domain abstains.
pub trait HttpAuthenticator: Send + Sync {
    fn extract_credentials(&self, ctx: &RequestContext<'_>) -> Option<Credentials>;
}

/// Verifies extracted credentials.
pub trait AuthenticationBackend: Send + Sync {
    fn authenticate(&self, credentials: &Credentials) -> Result<Verdict, BackendError>;
}

/// Resolves additional roles for an authenticated user.
pub trait AuthorizationBackend: Send + Sync {
    fn authorize(&self, user: &User) -> Result<BTreeSet<String>, BackendError>;
}

/// Constructor registry: implementation identifier → backend instance.
pub trait BackendFactory: Send + Sync {
    fn http_authenticator(
        &self,
        kind: HttpAuthenticatorKind,
        settings: &Settings,
    ) -> Result<Arc<dyn HttpAuthenticator>, BackendError>;

    fn authentication_backend(
        &self,
        kind: CredentialBackendKind,
        settings: &Settings,
    ) -> Result<Arc<dyn AuthenticationBackend>, BackendError>;

    fn authorization_backend(
        &self,
        kind: AuthorizationBackendKind,
        settings: &Settings,
    ) -> Result<Arc<dyn AuthorizationBackend>, BackendError>;
}
