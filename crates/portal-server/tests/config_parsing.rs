use std::time::Duration;
use std::{env, fs};

use portal_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("portal.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
body_limit_bytes = 1024

[logging]
level = "debug"

[auth]
issuer = "https://portal.example.com"
jti_cleanup_interval = "10m"
token_cleanup_interval = "1h"

[auth.tokens]
authorization_code = "30s"
access_token = "15m"

[auth.session]
cookie_name = "PORTAL_SID"
secure_cookie = true

[[bootstrap.clients]]
client_id = "dashboard"
secret = "change-me"
name = "Dashboard"
redirect_uris = ["https://dashboard.example.com/callback"]

[[bootstrap.scopes]]
id = "dp1.read"
name = "Read provider data"
data_provider_id = "dp-1"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.server.body_limit_bytes, 1024);
    assert_eq!(cfg.logging.level.to_ascii_lowercase(), "debug");
    assert_eq!(cfg.auth.issuer, "https://portal.example.com");
    assert_eq!(cfg.auth.jti_cleanup_interval, Duration::from_secs(600));
    assert_eq!(cfg.auth.token_cleanup_interval, Duration::from_secs(3600));
    assert_eq!(cfg.auth.tokens.authorization_code, Duration::from_secs(30));
    assert_eq!(cfg.auth.tokens.access_token, Duration::from_secs(900));
    assert_eq!(cfg.auth.session.cookie_name, "PORTAL_SID");
    assert!(cfg.auth.session.secure_cookie);
    assert_eq!(cfg.bootstrap.clients.len(), 1);
    assert!(cfg.bootstrap.clients[0].active);
    assert_eq!(
        cfg.bootstrap.scopes[0].data_provider_id.as_deref(),
        Some("dp-1")
    );

    // 2) Env override should win over file
    unsafe {
        env::set_var("PORTAL__SERVER__PORT", "9090");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9090);
    unsafe {
        env::remove_var("PORTAL__SERVER__PORT");
    }

    // 3) Invalid issuer should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[auth]
issuer = "not-a-url"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("auth config error"));
}

#[test]
fn missing_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config(path.to_str()).expect("defaults should be valid");
    assert_eq!(cfg.auth.session.cookie_name, "SID");
    assert!(cfg.bootstrap.clients.is_empty());
}
