//! Configuration schema definitions.
//!
//! This module defines the raw dynamic security document as it is persisted
//! and hot-reloaded. All types derive Serde traits for deserialization from
//! config files; nothing here is resolved yet (aliases are plain strings).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Free-form per-backend settings block (`config = { ... }`).
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// Root of a security configuration document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// The dynamic (hot-reloadable) section.
    pub dynamic: DynamicConfig,
}

/// Dynamic configuration section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DynamicConfig {
    /// Union roles of all authorizers instead of using only the first.
    pub multi_rolespan_enabled: bool,

    /// Do not fail on forbidden; filter what the user may see instead.
    pub do_not_fail_on_forbidden: bool,

    /// Apply `do_not_fail_on_forbidden` to empty results as well.
    pub do_not_fail_on_forbidden_empty: bool,

    /// Respect indices options of the incoming request.
    pub respect_request_indices_options: bool,

    /// How filtered aliases are treated.
    pub filtered_alias_mode: FilteredAliasMode,

    /// How transport peers are resolved for host-based rules.
    pub hosts_resolver_mode: HostsResolverMode,

    /// Skip authentication on the REST layer entirely.
    pub disable_rest_auth: bool,

    /// Skip authentication between cluster nodes.
    pub disable_intertransport_auth: bool,

    /// HTTP-layer settings (anonymous access, XFF).
    pub http: HttpConfig,

    /// Authentication domains by name.
    pub authc: BTreeMap<String, AuthcDomainConfig>,

    /// Authorization backends by name.
    pub authz: BTreeMap<String, AuthzDomainConfig>,

    /// Brute-force defense listeners by name.
    pub auth_failure_listeners: BTreeMap<String, FailureListenerConfig>,

    /// Settings passed through to the dashboards application.
    pub kibana: DashboardsConfig,

    /// Delegated credential issuance.
    pub on_behalf_of: OnBehalfOfConfig,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            multi_rolespan_enabled: true,
            do_not_fail_on_forbidden: false,
            do_not_fail_on_forbidden_empty: false,
            respect_request_indices_options: false,
            filtered_alias_mode: FilteredAliasMode::default(),
            hosts_resolver_mode: HostsResolverMode::default(),
            disable_rest_auth: false,
            disable_intertransport_auth: false,
            http: HttpConfig::default(),
            authc: BTreeMap::new(),
            authz: BTreeMap::new(),
            auth_failure_listeners: BTreeMap::new(),
            kibana: DashboardsConfig::default(),
            on_behalf_of: OnBehalfOfConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilteredAliasMode {
    #[default]
    Warn,
    Nowarn,
    Disallow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostsResolverMode {
    #[default]
    IpOnly,
    IpHostname,
    IpHostnameLookup,
}

/// HTTP-layer settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HttpConfig {
    /// Grant an anonymous principal when every domain abstains.
    pub anonymous_auth_enabled: bool,

    /// X-Forwarded-For handling.
    pub xff: XffConfig,
}

/// Default trusted proxy pattern: loopback, link-local and private ranges.
pub const DEFAULT_INTERNAL_PROXIES: &str = "10\\.\\d{1,3}\\.\\d{1,3}\\.\\d{1,3}|\
192\\.168\\.\\d{1,3}\\.\\d{1,3}|\
169\\.254\\.\\d{1,3}\\.\\d{1,3}|\
127\\.\\d{1,3}\\.\\d{1,3}\\.\\d{1,3}|\
172\\.1[6-9]{1}\\.\\d{1,3}\\.\\d{1,3}|\
172\\.2[0-9]{1}\\.\\d{1,3}\\.\\d{1,3}|\
172\\.3[0-1]{1}\\.\\d{1,3}\\.\\d{1,3}";

/// X-Forwarded-For configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct XffConfig {
    /// Resolve the client address through trusted proxies.
    pub enabled: bool,

    /// Regular expression matching trusted proxy addresses.
    pub internal_proxies: String,

    /// Header carrying the forwarded address chain.
    pub remote_ip_header: String,
}

impl Default for XffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            internal_proxies: DEFAULT_INTERNAL_PROXIES.to_string(),
            remote_ip_header: "X-Forwarded-For".to_string(),
        }
    }
}

/// One authentication domain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthcDomainConfig {
    /// Evaluate this domain for REST requests.
    pub http_enabled: bool,

    /// Evaluate this domain for transport requests.
    pub transport_enabled: bool,

    /// Position in the chain (ascending).
    pub order: u32,

    /// Free-text description for operators.
    pub description: String,

    /// Credential extraction from the request.
    pub http_authenticator: HttpAuthenticatorConfig,

    /// Credential verification.
    pub authentication_backend: BackendConfig,
}

impl Default for AuthcDomainConfig {
    fn default() -> Self {
        Self {
            http_enabled: true,
            transport_enabled: true,
            order: 0,
            description: String::new(),
            http_authenticator: HttpAuthenticatorConfig::default(),
            authentication_backend: BackendConfig::named("intern"),
        }
    }
}

/// HTTP authenticator block of a domain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpAuthenticatorConfig {
    /// Alias type, e.g. `basic` or `basic_h`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Send an authentication challenge when this domain fails.
    pub challenge: bool,

    /// Authenticator specific settings.
    pub config: Settings,
}

impl Default for HttpAuthenticatorConfig {
    fn default() -> Self {
        Self {
            kind: "basic".to_string(),
            challenge: true,
            config: Settings::new(),
        }
    }
}

/// Authentication or authorization backend block.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Alias type, e.g. `ldap` or `ldap_c`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Backend specific settings.
    #[serde(default)]
    pub config: Settings,
}

impl BackendConfig {
    pub fn named(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            config: Settings::new(),
        }
    }
}

/// One authorization backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthzDomainConfig {
    pub http_enabled: bool,
    pub transport_enabled: bool,
    pub description: String,
    pub authorization_backend: BackendConfig,
}

impl Default for AuthzDomainConfig {
    fn default() -> Self {
        Self {
            http_enabled: true,
            transport_enabled: true,
            description: String::new(),
            authorization_backend: BackendConfig::named("noop"),
        }
    }
}

/// One brute-force defense listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FailureListenerConfig {
    /// Listener alias type: `ip` or `username`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Bind the listener to one authentication backend type.
    pub authentication_backend: Option<String>,

    /// Failures within the window before the client is blocked.
    pub allowed_tries: u32,

    /// Sliding window length in seconds.
    pub time_window_seconds: u64,

    /// How long a block lasts in seconds.
    pub block_expiry_seconds: u64,

    /// Upper bound on simultaneously blocked clients.
    pub max_blocked_clients: usize,

    /// Upper bound on clients with a failure history.
    pub max_tracked_clients: usize,
}

impl Default for FailureListenerConfig {
    fn default() -> Self {
        Self {
            kind: "ip".to_string(),
            authentication_backend: None,
            allowed_tries: 10,
            time_window_seconds: 60 * 60,
            block_expiry_seconds: 60 * 10,
            max_blocked_clients: 100_000,
            max_tracked_clients: 100_000,
        }
    }
}

/// Dashboards passthrough block.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardsConfig {
    pub multitenancy_enabled: bool,
    pub private_tenant_enabled: bool,
    pub default_tenant: String,
    pub server_username: String,
    pub opensearch_role: Option<String>,
    pub index: String,
    pub sign_in_options: Vec<SignInOption>,
}

impl Default for DashboardsConfig {
    fn default() -> Self {
        Self {
            multitenancy_enabled: true,
            private_tenant_enabled: true,
            default_tenant: String::new(),
            server_username: "kibanaserver".to_string(),
            opensearch_role: None,
            index: ".kibana".to_string(),
            sign_in_options: vec![SignInOption::Basic],
        }
    }
}

/// Login methods offered by the dashboards application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignInOption {
    Basic,
    Saml,
    Openid,
    Anonymous,
}

/// On-behalf-of credential settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OnBehalfOfConfig {
    pub enabled: bool,
    pub signing_key: Option<String>,
    pub encryption_key: Option<String>,
}

impl Default for OnBehalfOfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            signing_key: None,
            encryption_key: None,
        }
    }
}
