use std::{env, fs};

use vetcare_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    // Create a temporary TOML configuration file
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("vetcare.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
request_timeout_ms = 5000
body_limit_bytes = 1024

[storage]
backend = "memory"

[logging]
level = "debug"

[reports]
public_base_url = "https://clinic.example.org/portal"
trust_forwarded_headers = true

[cascade]
reconcile_on_startup = false
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.server.request_timeout_ms, 5000);
    assert_eq!(cfg.server.body_limit_bytes, 1024);
    assert_eq!(cfg.logging.level.to_ascii_lowercase(), "debug");
    assert_eq!(
        cfg.reports.public_base_url.as_deref(),
        Some("https://clinic.example.org/portal")
    );
    assert!(cfg.reports.trust_forwarded_headers);
    assert!(!cfg.cascade.reconcile_on_startup);

    // 2) Env override should win over file
    unsafe {
        env::set_var("VETCARE__SERVER__PORT", "9191");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9191);
    // cleanup env var
    unsafe {
        env::remove_var("VETCARE__SERVER__PORT");
    }

    // 3) Invalid config should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[reports]
public_base_url = "ftp://files.example.org/"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("public_base_url must use http or https"));

    // 4) A missing file falls back to defaults
    let missing = dir.path().join("absent.toml");
    let cfg = load_config(missing.to_str()).expect("defaults");
    assert_eq!(cfg.server.port, 8080);
    assert!(cfg.cascade.reconcile_on_startup);
}
