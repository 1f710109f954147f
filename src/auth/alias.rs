//! Alias registry.
//!
//! Maps the short `type` strings used in configuration documents to the
//! closed set of backend implementations. The table is built once at startup
//! and handed to the snapshot builder by reference; lookups are pure.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Which kind of component an alias names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    HttpAuthenticator,
    CredentialAuthenticator,
    Authorization,
    FailureListener,
}

impl Direction {
    /// Suffix appended to a configuration `type` to form the full alias.
    pub fn suffix(self) -> &'static str {
        match self {
            Direction::HttpAuthenticator => "_h",
            Direction::CredentialAuthenticator => "_c",
            Direction::Authorization => "_z",
            Direction::FailureListener => "_authFailureListener",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::HttpAuthenticator => "authenticator-http",
            Direction::CredentialAuthenticator => "authenticator-credential",
            Direction::Authorization => "authorization",
            Direction::FailureListener => "failure-listener",
        };
        f.write_str(name)
    }
}

/// HTTP-layer credential extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpAuthenticatorKind {
    Basic,
    Proxy,
    ExtendedProxy,
    ClientCert,
    Kerberos,
    Jwt,
    OpenIdJwt,
    Saml,
}

/// Credential verifying backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialBackendKind {
    Internal,
    Noop,
    Ldap,
    Ldap2,
}

impl CredentialBackendKind {
    /// Canonical backend name; per-backend limiters are keyed by it.
    pub fn name(self) -> &'static str {
        match self {
            CredentialBackendKind::Internal => "internal",
            CredentialBackendKind::Noop => "noop",
            CredentialBackendKind::Ldap => "ldap",
            CredentialBackendKind::Ldap2 => "ldap2",
        }
    }
}

/// Role resolving backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationBackendKind {
    Noop,
    Ldap,
    Ldap2,
}

/// What a brute-force listener keys its counters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Address,
    Username,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Address => f.write_str("address"),
            KeyKind::Username => f.write_str("username"),
        }
    }
}

/// A resolved implementation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Implementation {
    Http(HttpAuthenticatorKind),
    Credential(CredentialBackendKind),
    Authorization(AuthorizationBackendKind),
    FailureListener(KeyKind),
}

impl Implementation {
    pub fn direction(self) -> Direction {
        match self {
            Implementation::Http(_) => Direction::HttpAuthenticator,
            Implementation::Credential(_) => Direction::CredentialAuthenticator,
            Implementation::Authorization(_) => Direction::Authorization,
            Implementation::FailureListener(_) => Direction::FailureListener,
        }
    }

    /// Stable identifier, independent of which alias selected it.
    pub fn id(self) -> &'static str {
        use AuthorizationBackendKind as Z;
        use CredentialBackendKind as C;
        use HttpAuthenticatorKind as H;

        match self {
            Implementation::Http(H::Basic) => "http.basic",
            Implementation::Http(H::Proxy) => "http.proxy",
            Implementation::Http(H::ExtendedProxy) => "http.extended_proxy",
            Implementation::Http(H::ClientCert) => "http.client_cert",
            Implementation::Http(H::Kerberos) => "http.kerberos",
            Implementation::Http(H::Jwt) => "http.jwt",
            Implementation::Http(H::OpenIdJwt) => "http.openid_jwt",
            Implementation::Http(H::Saml) => "http.saml",
            Implementation::Credential(C::Internal) => "credential.internal",
            Implementation::Credential(C::Noop) => "credential.noop",
            Implementation::Credential(C::Ldap) => "credential.ldap",
            Implementation::Credential(C::Ldap2) => "credential.ldap2",
            Implementation::Authorization(Z::Noop) => "authorization.noop",
            Implementation::Authorization(Z::Ldap) => "authorization.ldap",
            Implementation::Authorization(Z::Ldap2) => "authorization.ldap2",
            Implementation::FailureListener(KeyKind::Address) => "limiter.address",
            Implementation::FailureListener(KeyKind::Username) => "limiter.username",
        }
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One row of the alias table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasBinding {
    pub alias: String,
    pub direction: Direction,
    pub implementation: Implementation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {direction} alias '{alias}'")]
pub struct UnknownAliasError {
    pub alias: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("alias '{0}' is already registered")]
pub struct DuplicateAliasError(pub String);

const BUILTIN_ALIASES: &[(&str, Implementation)] = &[
    ("intern_c", Implementation::Credential(CredentialBackendKind::Internal)),
    ("internal_c", Implementation::Credential(CredentialBackendKind::Internal)),
    ("noop_c", Implementation::Credential(CredentialBackendKind::Noop)),
    ("ldap_c", Implementation::Credential(CredentialBackendKind::Ldap)),
    ("ldap2_c", Implementation::Credential(CredentialBackendKind::Ldap2)),
    ("intern_z", Implementation::Authorization(AuthorizationBackendKind::Noop)),
    ("internal_z", Implementation::Authorization(AuthorizationBackendKind::Noop)),
    ("noop_z", Implementation::Authorization(AuthorizationBackendKind::Noop)),
    ("ldap_z", Implementation::Authorization(AuthorizationBackendKind::Ldap)),
    ("ldap2_z", Implementation::Authorization(AuthorizationBackendKind::Ldap2)),
    ("basic_h", Implementation::Http(HttpAuthenticatorKind::Basic)),
    ("proxy_h", Implementation::Http(HttpAuthenticatorKind::Proxy)),
    ("extended-proxy_h", Implementation::Http(HttpAuthenticatorKind::ExtendedProxy)),
    ("clientcert_h", Implementation::Http(HttpAuthenticatorKind::ClientCert)),
    ("kerberos_h", Implementation::Http(HttpAuthenticatorKind::Kerberos)),
    ("jwt_h", Implementation::Http(HttpAuthenticatorKind::Jwt)),
    ("openid_h", Implementation::Http(HttpAuthenticatorKind::OpenIdJwt)),
    ("saml_h", Implementation::Http(HttpAuthenticatorKind::Saml)),
    ("ip_authFailureListener", Implementation::FailureListener(KeyKind::Address)),
    ("username_authFailureListener", Implementation::FailureListener(KeyKind::Username)),
];

/// Bootstrap table of alias → implementation.
#[derive(Debug, Clone)]
pub struct AliasRegistry {
    bindings: HashMap<String, AliasBinding>,
}

impl AliasRegistry {
    /// Registry containing every built-in alias.
    pub fn builtin() -> Self {
        let bindings = BUILTIN_ALIASES
            .iter()
            .map(|(alias, implementation)| {
                let binding = AliasBinding {
                    alias: alias.to_string(),
                    direction: implementation.direction(),
                    implementation: *implementation,
                };
                (alias.to_string(), binding)
            })
            .collect();
        Self { bindings }
    }

    /// Add another alias for an existing implementation.
    ///
    /// Meant for startup wiring only; the registry is shared immutably once
    /// the first snapshot is built.
    pub fn with_alias(
        mut self,
        alias: &str,
        implementation: Implementation,
    ) -> Result<Self, DuplicateAliasError> {
        if self.bindings.contains_key(alias) {
            return Err(DuplicateAliasError(alias.to_string()));
        }
        self.bindings.insert(
            alias.to_string(),
            AliasBinding {
                alias: alias.to_string(),
                direction: implementation.direction(),
                implementation,
            },
        );
        Ok(self)
    }

    /// Resolve a full alias such as `ldap_c`.
    pub fn resolve(&self, alias: &str) -> Result<Implementation, UnknownAliasError> {
        self.bindings
            .get(alias)
            .map(|binding| binding.implementation)
            .ok_or_else(|| UnknownAliasError {
                alias: alias.to_string(),
                direction: guess_direction(alias),
            })
    }

    /// Resolve a configuration `type` value within one direction.
    ///
    /// `ldap` and `ldap_c` both resolve to the LDAP credential backend.
    pub fn resolve_in(
        &self,
        direction: Direction,
        kind: &str,
    ) -> Result<Implementation, UnknownAliasError> {
        let kind = kind.trim();
        let suffixed = format!("{kind}{}", direction.suffix());
        let found = [suffixed.as_str(), kind]
            .into_iter()
            .filter_map(|candidate| self.bindings.get(candidate))
            .find(|binding| binding.direction == direction)
            .map(|binding| binding.implementation);
        found.ok_or_else(|| UnknownAliasError {
            alias: kind.to_string(),
            direction,
        })
    }

    /// All bindings, sorted by alias.
    pub fn bindings(&self) -> Vec<&AliasBinding> {
        let mut bindings: Vec<_> = self.bindings.values().collect();
        bindings.sort_by(|a, b| a.alias.cmp(&b.alias));
        bindings
    }
}

impl Default for AliasRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn guess_direction(alias: &str) -> Direction {
    [
        Direction::FailureListener,
        Direction::HttpAuthenticator,
        Direction::CredentialAuthenticator,
        Direction::Authorization,
    ]
    .into_iter()
    .find(|direction| alias.ends_with(direction.suffix()))
    .unwrap_or(Direction::CredentialAuthenticator)
}
