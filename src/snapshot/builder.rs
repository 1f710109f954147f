//! Snapshot construction.
//!
//! Building happens in three steps, and only the last one touches state
//! that outlives the build:
//!
//! 1. `plan` resolves every alias, checks chain ordering, compiles the
//!    trusted proxy pattern (pure, no instances created)
//! 2. backend instances are obtained from the [`BackendFactory`]
//! 3. limiters are reconciled and the snapshot is assembled (infallible)

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::alias::{
    AliasRegistry, AuthorizationBackendKind, CredentialBackendKind, Direction,
    HttpAuthenticatorKind, Implementation, KeyKind,
};
use crate::auth::backend::BackendFactory;
use crate::auth::domain::{AuthDomain, AuthorizerDomain, Protocol};
use crate::auth::xff::XffSettings;
use crate::config::validation::{validate_dynamic, ValidationError};
use crate::config::{AuthcDomainConfig, AuthzDomainConfig, DynamicConfig};
use crate::limiting::{LimiterSettings, ListenerPlan, ListenerStore};
use crate::snapshot::error::ConfigurationError;
use crate::snapshot::model::{ConfigSnapshot, DashboardsSettings, OnBehalfOfSettings};

/// An authentication domain with its aliases resolved.
#[derive(Debug, Clone)]
pub struct DomainPlan<'c> {
    pub name: &'c str,
    pub config: &'c AuthcDomainConfig,
    pub http_kind: HttpAuthenticatorKind,
    pub backend_kind: CredentialBackendKind,
}

impl DomainPlan<'_> {
    pub fn is_enabled(&self, protocol: Protocol) -> bool {
        match protocol {
            Protocol::Rest => self.config.http_enabled,
            Protocol::Transport => self.config.transport_enabled,
        }
    }
}

/// An authorizer with its alias resolved.
#[derive(Debug, Clone)]
pub struct AuthorizerPlan<'c> {
    pub name: &'c str,
    pub config: &'c AuthzDomainConfig,
    pub kind: AuthorizationBackendKind,
}

/// Everything that can be checked without creating a backend.
#[derive(Debug, Clone)]
pub struct SnapshotPlan<'c> {
    pub config: &'c DynamicConfig,
    /// All domains, ascending by (order, name); disabled ones included.
    pub domains: Vec<DomainPlan<'c>>,
    pub authorizers: Vec<AuthorizerPlan<'c>>,
    pub listeners: Vec<ListenerPlan>,
    pub xff: XffSettings,
}

struct Instances {
    rest_auth_domains: Vec<Arc<AuthDomain>>,
    transport_auth_domains: Vec<Arc<AuthDomain>>,
    rest_authorizers: Vec<Arc<AuthorizerDomain>>,
    transport_authorizers: Vec<Arc<AuthorizerDomain>>,
}

/// Turns raw dynamic configuration into a [`ConfigSnapshot`].
pub struct SnapshotBuilder<'a> {
    registry: &'a AliasRegistry,
    factory: &'a dyn BackendFactory,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(registry: &'a AliasRegistry, factory: &'a dyn BackendFactory) -> Self {
        Self { registry, factory }
    }

    /// Resolve and validate without creating any backend.
    pub fn plan<'c>(&self, config: &'c DynamicConfig) -> Result<SnapshotPlan<'c>, ConfigurationError> {
        validate_dynamic(config).map_err(ConfigurationError::Invalid)?;

        let mut domains = Vec::with_capacity(config.authc.len());
        for (name, domain) in &config.authc {
            let http_kind = match self.resolve(
                "authc domain",
                name,
                Direction::HttpAuthenticator,
                &domain.http_authenticator.kind,
            )? {
                Implementation::Http(kind) => kind,
                other => unreachable!("http alias resolved to {other}"),
            };
            let backend_kind = self.resolve_backend("authc domain", name, &domain.authentication_backend.kind)?;

            domains.push(DomainPlan {
                name,
                config: domain,
                http_kind,
                backend_kind,
            });
        }
        domains.sort_by(|a, b| (a.config.order, a.name).cmp(&(b.config.order, b.name)));

        for protocol in [Protocol::Rest, Protocol::Transport] {
            check_unique_order(&domains, protocol)?;
        }

        let mut authorizers = Vec::with_capacity(config.authz.len());
        for (name, authz) in &config.authz {
            let kind = match self.resolve(
                "authz domain",
                name,
                Direction::Authorization,
                &authz.authorization_backend.kind,
            )? {
                Implementation::Authorization(kind) => kind,
                other => unreachable!("authorization alias resolved to {other}"),
            };
            authorizers.push(AuthorizerPlan {
                name,
                config: authz,
                kind,
            });
        }

        let mut listeners = Vec::with_capacity(config.auth_failure_listeners.len());
        for (name, listener) in &config.auth_failure_listeners {
            let kind = match self.resolve(
                "auth failure listener",
                name,
                Direction::FailureListener,
                &listener.kind,
            )? {
                Implementation::FailureListener(kind) => kind,
                other => unreachable!("listener alias resolved to {other}"),
            };
            let backend = match listener.authentication_backend.as_deref() {
                Some(backend) if !backend.trim().is_empty() => Some(
                    self.resolve_backend("auth failure listener", name, backend)?
                        .name()
                        .to_string(),
                ),
                _ => None,
            };
            if kind == KeyKind::Username && backend.is_none() {
                return Err(ConfigurationError::Invalid(vec![
                    ValidationError::UnboundUsernameListener(name.clone()),
                ]));
            }

            listeners.push(ListenerPlan {
                name: name.clone(),
                kind,
                backend,
                settings: LimiterSettings::from(listener),
            });
        }

        let xff = XffSettings::new(&config.http.xff)
            .map_err(|e| ConfigurationError::InvalidTrustedProxies(e.to_string()))?;

        Ok(SnapshotPlan {
            config,
            domains,
            authorizers,
            listeners,
            xff,
        })
    }

    /// Build a complete snapshot for `generation`.
    ///
    /// `store` is only modified once everything that can fail has succeeded.
    pub fn build(
        &self,
        config: &DynamicConfig,
        store: &mut ListenerStore,
        generation: u64,
    ) -> Result<ConfigSnapshot, ConfigurationError> {
        let plan = self.plan(config)?;
        let instances = self.instantiate(&plan)?;
        let limiters = store.reconcile(&plan.listeners);

        let config = plan.config;
        Ok(ConfigSnapshot {
            generation,
            rest_auth_domains: instances.rest_auth_domains,
            transport_auth_domains: instances.transport_auth_domains,
            rest_authorizers: instances.rest_authorizers,
            transport_authorizers: instances.transport_authorizers,
            anonymous_auth_enabled: config.http.anonymous_auth_enabled,
            xff: plan.xff,
            rest_auth_disabled: config.disable_rest_auth,
            inter_transport_auth_disabled: config.disable_intertransport_auth,
            respect_request_indices_enabled: config.respect_request_indices_options,
            dnfof_enabled: config.do_not_fail_on_forbidden,
            dnfof_for_empty_results_enabled: config.do_not_fail_on_forbidden_empty,
            multi_rolespan_enabled: config.multi_rolespan_enabled,
            filtered_alias_mode: config.filtered_alias_mode,
            hosts_resolver_mode: config.hosts_resolver_mode,
            dashboards: DashboardsSettings::from(&config.kibana),
            sign_in_options: config.kibana.sign_in_options.clone(),
            on_behalf_of: OnBehalfOfSettings::from(&config.on_behalf_of),
            ip_limiters: limiters.ip,
            backend_limiters: limiters.by_backend,
        })
    }

    fn instantiate(&self, plan: &SnapshotPlan<'_>) -> Result<Instances, ConfigurationError> {
        let mut instances = Instances {
            rest_auth_domains: Vec::new(),
            transport_auth_domains: Vec::new(),
            rest_authorizers: Vec::new(),
            transport_authorizers: Vec::new(),
        };

        for domain in &plan.domains {
            let (http, transport) = (domain.config.http_enabled, domain.config.transport_enabled);
            if !http && !transport {
                tracing::debug!(domain = %domain.name, "Skipping disabled authc domain");
                continue;
            }

            let http_authenticator = self
                .factory
                .http_authenticator(domain.http_kind, &domain.config.http_authenticator.config)
                .map_err(|e| ConfigurationError::from_backend("authc domain", domain.name, e))?;
            let backend = self
                .factory
                .authentication_backend(domain.backend_kind, &domain.config.authentication_backend.config)
                .map_err(|e| ConfigurationError::from_backend("authc domain", domain.name, e))?;

            let resolved = Arc::new(AuthDomain {
                name: domain.name.to_string(),
                order: domain.config.order,
                description: domain.config.description.clone(),
                challenge: domain.config.http_authenticator.challenge,
                http_enabled: http,
                transport_enabled: transport,
                http_kind: domain.http_kind,
                backend_kind: domain.backend_kind,
                http_authenticator,
                backend,
            });
            if http {
                instances.rest_auth_domains.push(resolved.clone());
            }
            if transport {
                instances.transport_auth_domains.push(resolved);
            }
        }

        for authorizer in &plan.authorizers {
            let (http, transport) = (authorizer.config.http_enabled, authorizer.config.transport_enabled);
            if !http && !transport {
                continue;
            }

            let backend = self
                .factory
                .authorization_backend(authorizer.kind, &authorizer.config.authorization_backend.config)
                .map_err(|e| ConfigurationError::from_backend("authz domain", authorizer.name, e))?;

            let resolved = Arc::new(AuthorizerDomain {
                name: authorizer.name.to_string(),
                kind: authorizer.kind,
                http_enabled: http,
                transport_enabled: transport,
                backend,
            });
            if http {
                instances.rest_authorizers.push(resolved.clone());
            }
            if transport {
                instances.transport_authorizers.push(resolved);
            }
        }

        Ok(instances)
    }

    fn resolve(
        &self,
        section: &'static str,
        name: &str,
        direction: Direction,
        kind: &str,
    ) -> Result<Implementation, ConfigurationError> {
        self.registry
            .resolve_in(direction, kind)
            .map_err(|source| ConfigurationError::UnknownAlias {
                section,
                name: name.to_string(),
                source,
            })
    }

    fn resolve_backend(
        &self,
        section: &'static str,
        name: &str,
        kind: &str,
    ) -> Result<CredentialBackendKind, ConfigurationError> {
        match self.resolve(section, name, Direction::CredentialAuthenticator, kind)? {
            Implementation::Credential(kind) => Ok(kind),
            other => unreachable!("credential alias resolved to {other}"),
        }
    }
}

/// Domains enabled for `protocol` must have distinct orders.
fn check_unique_order(domains: &[DomainPlan<'_>], protocol: Protocol) -> Result<(), ConfigurationError> {
    let mut seen: HashMap<u32, &str> = HashMap::new();
    for domain in domains.iter().filter(|d| d.is_enabled(protocol)) {
        if let Some(first) = seen.insert(domain.config.order, domain.name) {
            return Err(ConfigurationError::DuplicateOrder {
                protocol,
                order: domain.config.order,
                first: first.to_string(),
                second: domain.name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::builtin::BuiltinFactory;
    use crate::config::{BackendConfig, FailureListenerConfig, HttpAuthenticatorConfig};

    fn domain(order: u32, http: &str, backend: &str) -> AuthcDomainConfig {
        AuthcDomainConfig {
            order,
            http_authenticator: HttpAuthenticatorConfig {
                kind: http.into(),
                ..Default::default()
            },
            authentication_backend: BackendConfig::named(backend),
            ..Default::default()
        }
    }

    fn build(config: &DynamicConfig) -> Result<ConfigSnapshot, ConfigurationError> {
        let registry = AliasRegistry::builtin();
        let factory = BuiltinFactory::new();
        SnapshotBuilder::new(&registry, &factory).build(config, &mut ListenerStore::new(), 1)
    }

    #[test]
    fn test_domains_are_ordered() {
        let mut config = DynamicConfig::default();
        config.authc.insert("second".into(), domain(2, "basic", "noop"));
        config.authc.insert("first".into(), domain(1, "proxy", "noop"));
        config.authc.insert("rest_only".into(), AuthcDomainConfig {
            transport_enabled: false,
            ..domain(3, "clientcert", "noop")
        });

        let snapshot = build(&config).unwrap();
        let names: Vec<_> = snapshot.rest_auth_domains().iter().map(|d| d.name()).collect();
        assert_eq!(names, ["first", "second", "rest_only"]);
        assert_eq!(snapshot.transport_auth_domains().len(), 2);
        assert_eq!(snapshot.rest_auth_domains()[0].http_kind(), HttpAuthenticatorKind::Proxy);
    }

    #[test]
    fn test_unknown_alias_aborts() {
        let mut config = DynamicConfig::default();
        config.authc.insert("radius".into(), domain(1, "radius", "noop"));

        let err = build(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnknownAlias { ref name, ref source, .. }
                if name == "radius" && source.direction == Direction::HttpAuthenticator
        ));
    }

    #[test]
    fn test_duplicate_order_aborts() {
        let mut config = DynamicConfig::default();
        config.authc.insert("a".into(), domain(1, "basic", "noop"));
        config.authc.insert("b".into(), domain(1, "proxy", "noop"));

        let err = build(&config).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateOrder {
                protocol: Protocol::Rest,
                order: 1,
                first: "a".into(),
                second: "b".into(),
            }
        );
    }

    #[test]
    fn test_shared_order_across_protocols_is_allowed() {
        let mut config = DynamicConfig::default();
        config.authc.insert("rest".into(), AuthcDomainConfig {
            transport_enabled: false,
            ..domain(1, "basic", "noop")
        });
        config.authc.insert("transport".into(), AuthcDomainConfig {
            http_enabled: false,
            ..domain(1, "clientcert", "noop")
        });
        assert!(build(&config).is_ok());
    }

    #[test]
    fn test_disabled_domain_is_resolved_but_not_built() {
        let mut config = DynamicConfig::default();
        config.authc.insert("off".into(), AuthcDomainConfig {
            http_enabled: false,
            transport_enabled: false,
            // ldap is not linked; a disabled domain must not need it
            ..domain(1, "basic", "ldap")
        });
        let snapshot = build(&config).unwrap();
        assert!(snapshot.rest_auth_domains().is_empty());

        config.authc.get_mut("off").unwrap().authentication_backend = BackendConfig::named("nonexistent");
        assert!(matches!(build(&config), Err(ConfigurationError::UnknownAlias { .. })));
    }

    #[test]
    fn test_unlinked_backend_is_reported() {
        let mut config = DynamicConfig::default();
        config.authc.insert("ldap".into(), domain(1, "basic", "ldap"));

        let err = build(&config).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingImplementation { .. }));
    }

    #[test]
    fn test_malformed_settings() {
        let mut config = DynamicConfig::default();
        let mut proxy = domain(1, "proxy", "noop");
        proxy
            .http_authenticator
            .config
            .insert("user_header".into(), serde_json::json!(["not", "a", "string"]));
        config.authc.insert("proxy".into(), proxy);

        let err = build(&config).unwrap_err();
        assert!(matches!(err, ConfigurationError::MalformedSettings { .. }));
    }

    #[test]
    fn test_invalid_trusted_proxies() {
        let mut config = DynamicConfig::default();
        config.http.xff.internal_proxies = "(".into();
        assert!(matches!(build(&config), Err(ConfigurationError::InvalidTrustedProxies(_))));
    }

    #[test]
    fn test_listener_placement() {
        let mut config = DynamicConfig::default();
        config.auth_failure_listeners.insert("ip".into(), FailureListenerConfig::default());
        config.auth_failure_listeners.insert("users".into(), FailureListenerConfig {
            kind: "username".into(),
            authentication_backend: Some("internal_c".into()),
            ..Default::default()
        });
        config.auth_failure_listeners.insert("intern_ip".into(), FailureListenerConfig {
            authentication_backend: Some("intern".into()),
            ..Default::default()
        });

        let snapshot = build(&config).unwrap();
        assert_eq!(snapshot.ip_client_block_registries().len(), 1);
        // intern and internal_c are the same backend
        assert_eq!(snapshot.backend_limiters("internal").len(), 2);
    }

    #[test]
    fn test_listener_with_unknown_backend() {
        let mut config = DynamicConfig::default();
        config.auth_failure_listeners.insert("users".into(), FailureListenerConfig {
            kind: "username".into(),
            authentication_backend: Some("radius".into()),
            ..Default::default()
        });
        assert!(matches!(build(&config), Err(ConfigurationError::UnknownAlias { .. })));
    }

    #[test]
    fn test_passthrough_settings() {
        let mut config = DynamicConfig::default();
        config.kibana.server_username = "dashboards".into();
        config.kibana.default_tenant = "global".into();
        config.kibana.opensearch_role = Some("dashboards_server".into());
        config.on_behalf_of.signing_key = Some("a2V5".into());
        config.disable_intertransport_auth = true;

        let snapshot = build(&config).unwrap();
        assert_eq!(snapshot.dashboards_server_username(), "dashboards");
        assert_eq!(snapshot.dashboards_default_tenant(), "global");
        assert_eq!(snapshot.dashboards_opensearch_role(), Some("dashboards_server"));
        assert_eq!(snapshot.on_behalf_of_settings().signing_key.as_deref(), Some("a2V5"));
        assert!(snapshot.is_inter_transport_auth_disabled());
        assert!(!snapshot.is_rest_auth_disabled());
    }
}
