//! Built-in backends that need no network access.
//!
//! Directory, token and identity-provider backends (internal user database,
//! LDAP, Kerberos, JWT, OpenID Connect, SAML) are supplied by the embedding
//! application through its own [`BackendFactory`], which `BuiltinFactory`
//! delegates to.

use std::collections::BTreeSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::auth::alias::{AuthorizationBackendKind, CredentialBackendKind, HttpAuthenticatorKind};
use crate::auth::backend::{
    AuthenticationBackend, AuthorizationBackend, BackendError, BackendFactory, Credentials,
    HttpAuthenticator, RequestContext, User, Verdict,
};
use crate::config::Settings;

/// Factory for the built-in kinds, with an optional fallback for the rest.
#[derive(Clone, Default)]
pub struct BuiltinFactory {
    external: Option<Arc<dyn BackendFactory>>,
}

impl BuiltinFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegate every kind not implemented here to `external`.
    pub fn with_external(external: Arc<dyn BackendFactory>) -> Self {
        Self {
            external: Some(external),
        }
    }

    fn external(&self, what: String) -> Result<&dyn BackendFactory, BackendError> {
        self.external
            .as_deref()
            .ok_or(BackendError::Unavailable(what))
    }
}

impl BackendFactory for BuiltinFactory {
    fn http_authenticator(
        &self,
        kind: HttpAuthenticatorKind,
        settings: &Settings,
    ) -> Result<Arc<dyn HttpAuthenticator>, BackendError> {
        match kind {
            HttpAuthenticatorKind::Basic => Ok(Arc::new(BasicAuthenticator)),
            HttpAuthenticatorKind::Proxy => Ok(Arc::new(ProxyAuthenticator::from_settings(
                settings, false,
            )?)),
            HttpAuthenticatorKind::ExtendedProxy => Ok(Arc::new(
                ProxyAuthenticator::from_settings(settings, true)?,
            )),
            HttpAuthenticatorKind::ClientCert => {
                Ok(Arc::new(ClientCertAuthenticator::from_settings(settings)?))
            }
            other => self
                .external(format!("{other:?} http authenticator"))?
                .http_authenticator(other, settings),
        }
    }

    fn authentication_backend(
        &self,
        kind: CredentialBackendKind,
        settings: &Settings,
    ) -> Result<Arc<dyn AuthenticationBackend>, BackendError> {
        match kind {
            CredentialBackendKind::Noop => Ok(Arc::new(NoopAuthenticationBackend)),
            other => self
                .external(format!("{} authentication backend", other.name()))?
                .authentication_backend(other, settings),
        }
    }

    fn authorization_backend(
        &self,
        kind: AuthorizationBackendKind,
        settings: &Settings,
    ) -> Result<Arc<dyn AuthorizationBackend>, BackendError> {
        match kind {
            AuthorizationBackendKind::Noop => Ok(Arc::new(NoopAuthorizationBackend)),
            other => self
                .external(format!("{other:?} authorization backend"))?
                .authorization_backend(other, settings),
        }
    }
}

/// Read an optional string setting.
fn setting_str<'a>(settings: &'a Settings, key: &str) -> Result<Option<&'a str>, BackendError> {
    match settings.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(value)) => Ok(Some(value.as_str())),
        Some(other) => Err(BackendError::InvalidSettings(format!(
            "'{key}' must be a string, got {other}"
        ))),
    }
}

/// `Authorization: Basic <base64(user:password)>`.
#[derive(Debug, Default)]
pub struct BasicAuthenticator;

impl HttpAuthenticator for BasicAuthenticator {
    fn extract_credentials(&self, ctx: &RequestContext<'_>) -> Option<Credentials> {
        let header = ctx.header("authorization")?;
        let (scheme, encoded) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed basic authorization header");
                return None;
            }
        };
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        if username.is_empty() {
            return None;
        }

        Some(Credentials::new(username).with_password(password))
    }
}

/// Identity asserted by a trusted reverse proxy through headers.
#[derive(Debug)]
pub struct ProxyAuthenticator {
    user_header: String,
    roles_header: String,
    attr_header_prefix: Option<String>,
}

impl ProxyAuthenticator {
    fn from_settings(settings: &Settings, extended: bool) -> Result<Self, BackendError> {
        let user_header = setting_str(settings, "user_header")?.unwrap_or("x-proxy-user");
        let roles_header = setting_str(settings, "roles_header")?.unwrap_or("x-proxy-roles");
        let attr_header_prefix = if extended {
            let prefix = setting_str(settings, "attr_header_prefix")?.unwrap_or("x-proxy-ext-");
            Some(prefix.to_ascii_lowercase())
        } else {
            None
        };

        Ok(Self {
            user_header: user_header.to_string(),
            roles_header: roles_header.to_string(),
            attr_header_prefix,
        })
    }
}

impl HttpAuthenticator for ProxyAuthenticator {
    fn extract_credentials(&self, ctx: &RequestContext<'_>) -> Option<Credentials> {
        if !ctx.via_trusted_proxy {
            tracing::trace!(client = %ctx.client_address, "Proxy headers ignored, peer is not a trusted proxy");
            return None;
        }

        let username = ctx.header(&self.user_header)?.trim();
        if username.is_empty() {
            return None;
        }

        let mut credentials = Credentials::new(username);
        if let Some(roles) = ctx.header(&self.roles_header) {
            credentials.backend_roles = split_list(roles);
        }
        if let Some(prefix) = &self.attr_header_prefix {
            for (name, value) in &ctx.request.headers {
                if let Some(attribute) = name.strip_prefix(prefix.as_str()) {
                    credentials
                        .attributes
                        .insert(format!("attr.proxy.{attribute}"), value.clone());
                }
            }
        }
        Some(credentials)
    }
}

/// Identity taken from the verified TLS client certificate.
#[derive(Debug)]
pub struct ClientCertAuthenticator {
    username_attribute: Option<String>,
    roles_attribute: Option<String>,
}

impl ClientCertAuthenticator {
    fn from_settings(settings: &Settings) -> Result<Self, BackendError> {
        Ok(Self {
            username_attribute: setting_str(settings, "username_attribute")?.map(str::to_string),
            roles_attribute: setting_str(settings, "roles_attribute")?.map(str::to_string),
        })
    }
}

impl HttpAuthenticator for ClientCertAuthenticator {
    fn extract_credentials(&self, ctx: &RequestContext<'_>) -> Option<Credentials> {
        let principal = ctx.request.client_certificate_principal.as_deref()?.trim();
        if principal.is_empty() {
            return None;
        }

        let username = match &self.username_attribute {
            Some(attribute) => rdn_values(principal, attribute).into_iter().next()?,
            None => principal.to_string(),
        };

        let mut credentials = Credentials::new(username);
        if let Some(attribute) = &self.roles_attribute {
            credentials.backend_roles = rdn_values(principal, attribute).into_iter().collect();
        }
        Some(credentials)
    }
}

/// Trusts whatever the HTTP authenticator extracted.
#[derive(Debug, Default)]
pub struct NoopAuthenticationBackend;

impl AuthenticationBackend for NoopAuthenticationBackend {
    fn authenticate(&self, credentials: &Credentials) -> Result<Verdict, BackendError> {
        Ok(Verdict::Authenticated(User::from(credentials)))
    }
}

/// Contributes no roles.
#[derive(Debug, Default)]
pub struct NoopAuthorizationBackend;

impl AuthorizationBackend for NoopAuthorizationBackend {
    fn authorize(&self, _user: &User) -> Result<BTreeSet<String>, BackendError> {
        Ok(BTreeSet::new())
    }
}

fn split_list(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Values of every RDN named `attribute` in a DN such as `CN=a,OU=b,OU=c`.
fn rdn_values(dn: &str, attribute: &str) -> Vec<String> {
    dn.split(',')
        .filter_map(|rdn| rdn.split_once('='))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case(attribute))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}
