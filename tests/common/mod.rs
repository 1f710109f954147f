//! Shared utilities for integration testing.
//!
//! `ScriptedFactory` stands in for the directory backends. Every backend it
//! creates is driven by its settings:
//!
//! ```toml
//! [authc.first.authentication_backend]
//! type = "ldap"
//! config = { id = "first", verdict = "abstain" }
//! ```
//!
//! and stays reachable by `id` so tests can count how often it was asked.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

use dynamic_security::auth::{
    AliasRegistry, AuthRequest, AuthenticationBackend, AuthorizationBackend,
    AuthorizationBackendKind, BackendError, BackendFactory, BuiltinFactory, Credentials,
    CredentialBackendKind, HttpAuthenticator, HttpAuthenticatorKind, User, Verdict,
};
use dynamic_security::config::{
    AuthcDomainConfig, AuthzDomainConfig, BackendConfig, FailureListenerConfig, Settings,
};
use dynamic_security::ConfigManager;

/// What a scripted backend answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Authenticate,
    Abstain,
    Deny,
    Fail,
}

impl Script {
    fn parse(value: Option<&str>) -> Result<Self, BackendError> {
        match value.unwrap_or("authenticate") {
            "authenticate" => Ok(Script::Authenticate),
            "abstain" => Ok(Script::Abstain),
            "deny" => Ok(Script::Deny),
            "fail" => Ok(Script::Fail),
            other => Err(BackendError::InvalidSettings(format!("unknown verdict '{other}'"))),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Script::Authenticate => "authenticate",
            Script::Abstain => "abstain",
            Script::Deny => "deny",
            Script::Fail => "fail",
        }
    }
}

/// Authentication backend answering from its script.
///
/// A password of `"correct"` always authenticates unless the script
/// abstains or fails, so one backend can serve both good and bad logins.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AuthenticationBackend for ScriptedBackend {
    fn authenticate(&self, credentials: &Credentials) -> Result<Verdict, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Abstain => Ok(Verdict::Abstain),
            Script::Fail => Err(BackendError::Failed("directory unreachable".into())),
            Script::Authenticate => Ok(Verdict::Authenticated(User::from(credentials))),
            Script::Deny if credentials.password.as_deref() == Some("correct") => {
                Ok(Verdict::Authenticated(User::from(credentials)))
            }
            Script::Deny => Ok(Verdict::Denied),
        }
    }
}

/// Authorization backend returning fixed roles, or failing.
#[derive(Debug)]
pub struct ScriptedAuthorizer {
    roles: Option<BTreeSet<String>>,
    calls: AtomicUsize,
}

impl ScriptedAuthorizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AuthorizationBackend for ScriptedAuthorizer {
    fn authorize(&self, _user: &User) -> Result<BTreeSet<String>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.roles
            .clone()
            .ok_or_else(|| BackendError::Failed("role lookup failed".into()))
    }
}

/// Factory handing out scripted backends and built-in HTTP authenticators.
#[derive(Default)]
pub struct ScriptedFactory {
    builtin: BuiltinFactory,
    backends: Mutex<HashMap<String, Arc<ScriptedBackend>>>,
    authorizers: Mutex<HashMap<String, Arc<ScriptedAuthorizer>>>,
}

impl ScriptedFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The most recent backend created with `id`.
    pub fn backend(&self, id: &str) -> Arc<ScriptedBackend> {
        self.backends.lock().unwrap()[id].clone()
    }

    pub fn authorizer(&self, id: &str) -> Arc<ScriptedAuthorizer> {
        self.authorizers.lock().unwrap()[id].clone()
    }
}

fn id(settings: &Settings) -> Result<String, BackendError> {
    settings
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| BackendError::InvalidSettings("'id' is required".into()))
}

impl BackendFactory for ScriptedFactory {
    fn http_authenticator(
        &self,
        kind: HttpAuthenticatorKind,
        settings: &Settings,
    ) -> Result<Arc<dyn HttpAuthenticator>, BackendError> {
        self.builtin.http_authenticator(kind, settings)
    }

    fn authentication_backend(
        &self,
        _kind: CredentialBackendKind,
        settings: &Settings,
    ) -> Result<Arc<dyn AuthenticationBackend>, BackendError> {
        let script = Script::parse(settings.get("verdict").and_then(|v| v.as_str()))?;
        let backend = Arc::new(ScriptedBackend {
            script,
            calls: AtomicUsize::new(0),
        });
        self.backends.lock().unwrap().insert(id(settings)?, backend.clone());
        Ok(backend)
    }

    fn authorization_backend(
        &self,
        _kind: AuthorizationBackendKind,
        settings: &Settings,
    ) -> Result<Arc<dyn AuthorizationBackend>, BackendError> {
        let roles = match settings.get("roles") {
            Some(serde_json::Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        };
        let authorizer = Arc::new(ScriptedAuthorizer {
            roles,
            calls: AtomicUsize::new(0),
        });
        self.authorizers.lock().unwrap().insert(id(settings)?, authorizer.clone());
        Ok(authorizer)
    }
}

pub fn manager(factory: &Arc<ScriptedFactory>) -> ConfigManager {
    ConfigManager::new(Arc::new(AliasRegistry::builtin()), factory.clone())
}

/// A basic-auth domain backed by a scripted backend of `backend` type.
pub fn domain(order: u32, backend: &str, id: &str, script: Script) -> AuthcDomainConfig {
    let mut authentication_backend = BackendConfig::named(backend);
    authentication_backend.config.insert("id".into(), json!(id));
    authentication_backend
        .config
        .insert("verdict".into(), json!(script.as_str()));

    AuthcDomainConfig {
        order,
        authentication_backend,
        ..Default::default()
    }
}

/// An authorizer returning `roles`, or failing when `None`.
pub fn authorizer(id: &str, roles: Option<&[&str]>) -> AuthzDomainConfig {
    let mut authorization_backend = BackendConfig::named("ldap");
    authorization_backend.config.insert("id".into(), json!(id));
    if let Some(roles) = roles {
        authorization_backend.config.insert("roles".into(), json!(roles));
    }
    AuthzDomainConfig {
        authorization_backend,
        ..Default::default()
    }
}

pub fn ip_listener(allowed_tries: u32) -> FailureListenerConfig {
    FailureListenerConfig {
        allowed_tries,
        ..Default::default()
    }
}

pub fn username_listener(backend: &str, allowed_tries: u32) -> FailureListenerConfig {
    FailureListenerConfig {
        kind: "username".into(),
        authentication_backend: Some(backend.into()),
        allowed_tries,
        ..Default::default()
    }
}

pub fn basic_request(address: &str, username: &str, password: &str) -> AuthRequest {
    let address: IpAddr = address.parse().unwrap();
    let token = STANDARD.encode(format!("{username}:{password}"));
    AuthRequest::new(address).with_header("Authorization", format!("Basic {token}"))
}
