//! Snapshot publication and reload tests.

use std::io::Write;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use dynamic_security::auth::{authenticate, AuthDecision, Direction, Protocol};
use dynamic_security::config::loader::load_config;
use dynamic_security::config::DynamicConfig;
use dynamic_security::limiting::FailureListener;
use dynamic_security::ConfigurationError;

mod common;

use common::{basic_request, domain, ip_listener, Script, ScriptedFactory};

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Every value derived from `n` must come from the same generation.
fn generation_config(n: u32) -> DynamicConfig {
    let mut config = DynamicConfig::default();
    config.kibana.server_username = format!("server-{n}");
    config.kibana.default_tenant = format!("tenant-{n}");
    config.http.anonymous_auth_enabled = n % 2 == 0;
    config.authc.insert(format!("domain-{n}"), domain(n, "noop", "d", Script::Authenticate));
    config
}

#[test]
fn test_readers_never_see_a_mixed_generation() {
    let factory = ScriptedFactory::new();
    let manager = Arc::new(common::manager(&factory));
    manager.reload(&generation_config(0)).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut reads = 0u64;
                while !done.load(Ordering::Acquire) {
                    let snapshot = manager.current();
                    let n: u32 = snapshot
                        .dashboards_server_username()
                        .trim_start_matches("server-")
                        .parse()
                        .unwrap();
                    assert_eq!(snapshot.dashboards_default_tenant(), format!("tenant-{n}"));
                    assert_eq!(snapshot.is_anonymous_authentication_enabled(), n % 2 == 0);
                    assert_eq!(snapshot.rest_auth_domains()[0].order(), n);
                    assert_eq!(snapshot.generation(), u64::from(n) + 1);
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    for n in 1..200 {
        manager.reload(&generation_config(n)).unwrap();
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(manager.current().generation(), 200);
}

#[test]
fn test_in_flight_request_keeps_its_snapshot() {
    let factory = ScriptedFactory::new();
    let manager = common::manager(&factory);
    manager.reload(&generation_config(1)).unwrap();

    let held = manager.current();
    manager.reload(&generation_config(2)).unwrap();

    assert_eq!(held.dashboards_server_username(), "server-1");
    assert!(!held.is_anonymous_authentication_enabled());
    assert_eq!(manager.current().dashboards_server_username(), "server-2");
}

#[test]
fn test_failed_build_keeps_snapshot_and_counters() {
    let factory = ScriptedFactory::new();
    let manager = common::manager(&factory);

    let mut config = DynamicConfig::default();
    config.authc.insert("basic".into(), domain(1, "intern", "internal", Script::Deny));
    config.auth_failure_listeners.insert("ip".into(), ip_listener(10));
    let live = manager.reload(&config).unwrap();

    let client = addr("192.0.2.50");
    authenticate(&live, Protocol::Rest, &basic_request("192.0.2.50", "eve", "guess"));
    assert_eq!(live.ip_auth_failure_listeners()[0].current_count(&client), 1);

    // the listener change would reset the limiter, but the build fails first
    let mut broken = config.clone();
    broken.auth_failure_listeners.get_mut("ip").unwrap().kind = "username".into();
    broken.auth_failure_listeners.get_mut("ip").unwrap().authentication_backend = Some("internal".into());
    broken.authc.insert("saml".into(), {
        let mut saml = domain(2, "noop", "saml", Script::Authenticate);
        saml.http_authenticator.kind = "radius".into();
        saml
    });
    assert!(manager.reload(&broken).is_err());

    let current = manager.current();
    assert!(Arc::ptr_eq(&live, &current));

    let next = manager.reload(&config).unwrap();
    assert_eq!(next.ip_auth_failure_listeners()[0].current_count(&client), 1);
}

#[test]
fn test_listener_identity_across_reloads() {
    let factory = ScriptedFactory::new();
    let manager = common::manager(&factory);
    let client = addr("192.0.2.60");

    let mut config = DynamicConfig::default();
    config.authc.insert("basic".into(), domain(1, "intern", "internal", Script::Deny));
    config.auth_failure_listeners.insert("ip".into(), ip_listener(10));
    let first = manager.reload(&config).unwrap();
    for _ in 0..3 {
        authenticate(&first, Protocol::Rest, &basic_request("192.0.2.60", "eve", "guess"));
    }

    // same name and kind, new threshold: counters survive
    config.auth_failure_listeners.get_mut("ip").unwrap().allowed_tries = 5;
    let second = manager.reload(&config).unwrap();
    let limiter = &second.ip_auth_failure_listeners()[0];
    assert_eq!(limiter.current_count(&client), 3);
    assert_eq!(limiter.settings().allowed_tries, 5);

    // renamed: starts from zero
    let listener = config.auth_failure_listeners.remove("ip").unwrap();
    config.auth_failure_listeners.insert("ip_renamed".into(), listener);
    let third = manager.reload(&config).unwrap();
    assert_eq!(third.ip_auth_failure_listeners()[0].current_count(&client), 0);

    // the old generation still answers from the limiter it was built with
    assert_eq!(first.ip_auth_failure_listeners()[0].current_count(&client), 3);
}

#[test]
fn test_unknown_alias_rejects_reload() {
    let factory = ScriptedFactory::new();
    let manager = common::manager(&factory);

    let mut config = DynamicConfig::default();
    config.authc.insert("mystery".into(), domain(1, "nonexistent", "m", Script::Authenticate));

    match manager.reload(&config) {
        Err(ConfigurationError::UnknownAlias { name, source, .. }) => {
            assert_eq!(name, "mystery");
            assert_eq!(source.alias, "nonexistent");
            assert_eq!(source.direction, Direction::CredentialAuthenticator);
        }
        other => panic!("expected unknown alias, got {other:?}"),
    }
    assert_eq!(manager.current().generation(), 0);
}

#[test]
fn test_duplicate_order_rejects_reload() {
    let factory = ScriptedFactory::new();
    let manager = common::manager(&factory);

    let mut config = DynamicConfig::default();
    config.authc.insert("a".into(), domain(7, "noop", "a", Script::Authenticate));
    config.authc.insert("b".into(), domain(7, "noop", "b", Script::Authenticate));

    let err = manager.reload(&config).unwrap_err();
    assert!(matches!(err, ConfigurationError::DuplicateOrder { order: 7, .. }));
    assert!(err.to_string().contains("share order 7"));
}

#[test]
fn test_reload_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[dynamic]
disable_intertransport_auth = true

[dynamic.http]
anonymous_auth_enabled = true

[dynamic.authc.internal]
order = 0

[dynamic.authc.internal.authentication_backend]
type = "intern"
config = {{ id = "internal", verdict = "deny" }}

[dynamic.auth_failure_listeners.ip_rate_limiting]
type = "ip"
allowed_tries = 3
"#
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    let factory = ScriptedFactory::new();
    let manager = common::manager(&factory);
    let snapshot = manager.reload(&config.dynamic).unwrap();

    assert!(snapshot.is_anonymous_authentication_enabled());
    assert!(snapshot.is_inter_transport_auth_disabled());
    assert_eq!(snapshot.ip_client_block_registries().len(), 1);
    assert_eq!(
        authenticate(&snapshot, Protocol::Transport, &basic_request("192.0.2.70", "x", "y")),
        AuthDecision::Bypassed
    );
}
