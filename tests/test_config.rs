use std::time::Duration;

use proxychain::config::{Config, RequestModifierConfig};

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
    assert_eq!(cfg.log_level(), tracing::Level::INFO);
    assert_eq!(cfg.outline_prefix, "/outline/");
    assert!(cfg.request_modifiers.is_empty());
}

#[test]
fn test_config_from_yaml() {
    let cfg = Config::from_yaml(
        r#"
listen_addr: 0.0.0.0:3000
request_timeout_secs: 10
log_level: debug
request_modifiers:
  - kind: spoof-referrer-google
  - kind: set-header
    name: DNT
    value: "1"
  - kind: delete-header
    name: Cookie
"#,
    )
    .unwrap();

    assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
    assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
    // Unset fields keep their defaults
    assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.log_level(), tracing::Level::DEBUG);
    assert_eq!(
        cfg.request_modifiers,
        vec![
            RequestModifierConfig::SpoofReferrerGoogle,
            RequestModifierConfig::SetHeader {
                name: "DNT".to_string(),
                value: "1".to_string(),
            },
            RequestModifierConfig::DeleteHeader {
                name: "Cookie".to_string(),
            },
        ]
    );
}

#[test]
fn test_config_rejects_unknown_fields_and_modifiers() {
    assert!(Config::from_yaml("listen: 0.0.0.0:1").is_err());
    assert!(Config::from_yaml("request_modifiers:\n  - kind: teleport\n").is_err());
}

#[test]
fn test_config_rejects_bad_outline_prefix() {
    assert!(Config::from_yaml("outline_prefix: outline").is_err());
    assert!(Config::from_yaml("outline_prefix: /read/").is_ok());
}

#[test]
fn test_config_unknown_log_level_falls_back_to_info() {
    let cfg = Config::from_yaml("log_level: loud").unwrap();
    assert_eq!(cfg.log_level(), tracing::Level::INFO);
}

#[test]
fn test_config_env_overrides() {
    // Env vars are process-wide, so every env case lives in this one test.
    unsafe {
        std::env::remove_var("PROXYCHAIN_CONFIG");
        std::env::remove_var("LISTEN");
    }
    assert_eq!(Config::load().unwrap().listen_addr, "127.0.0.1:8080");

    unsafe {
        std::env::set_var("LISTEN", "0.0.0.0:5000");
    }
    assert_eq!(Config::load().unwrap().listen_addr, "0.0.0.0:5000");

    let path = std::env::temp_dir().join(format!("proxychain-test-{}.yaml", std::process::id()));
    std::fs::write(&path, "listen_addr: 10.0.0.1:80\nconnect_timeout_secs: 2\n").unwrap();
    unsafe {
        std::env::set_var("PROXYCHAIN_CONFIG", &path);
    }
    let cfg = Config::load().unwrap();
    // LISTEN still wins over the file
    assert_eq!(cfg.listen_addr, "0.0.0.0:5000");
    assert_eq!(cfg.connect_timeout(), Duration::from_secs(2));

    unsafe {
        std::env::set_var("PROXYCHAIN_CONFIG", path.with_extension("missing"));
    }
    assert!(Config::load().is_err());

    unsafe {
        std::env::remove_var("PROXYCHAIN_CONFIG");
        std::env::remove_var("LISTEN");
    }
    let _ = std::fs::remove_file(&path);
}
