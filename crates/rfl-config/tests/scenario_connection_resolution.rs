//! Connection settings resolution.
//!
//! # Test design
//! Env fallbacks are pointed at globally-unique sentinel var names
//! (`RFL_SENTINEL_*`) that are never set in any CI or dev environment, so no
//! test needs `std::env::set_var` and parallel tests cannot race.
//!
//! # Coverage
//! 1. Config values are used as-is
//! 2. Missing host fails closed, naming the env var
//! 3. Missing username fails closed, naming the env var
//! 4. Password is never taken from config and defaults to empty
//! 5. `insecure` must be a boolean when set in config
//! 6. Debug output is redacted
//! 7. Layered files on disk resolve end to end

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use rfl_config::{load_layered_yaml, load_layered_yaml_from_strings, resolve_connection};

fn load(yaml: &str) -> serde_json::Value {
    load_layered_yaml_from_strings(&[yaml])
        .expect("test yaml must parse cleanly")
        .config_json
}

const SENTINEL_ENV: &str = r#"
appliance:
  env:
    host_url: "RFL_SENTINEL_HOST_UNSET_C1"
    username: "RFL_SENTINEL_USER_UNSET_C1"
    password: "RFL_SENTINEL_PASS_UNSET_C1"
    ca_certificate: "RFL_SENTINEL_CA_UNSET_C1"
    insecure: "RFL_SENTINEL_INSECURE_UNSET_C1"
"#;

#[test]
fn config_values_are_used() {
    let site = r#"
appliance:
  host_url: "router.lan:8443"
  username: "terraform"
  ca_certificate: "/etc/ssl/router-ca.pem"
  insecure: true
  timeout_secs: 20
"#;
    let cfg = load_layered_yaml_from_strings(&[SENTINEL_ENV, site])
        .unwrap()
        .config_json;
    let settings = resolve_connection(&cfg).unwrap();

    assert_eq!(settings.host_url, "router.lan:8443");
    assert_eq!(settings.username, "terraform");
    assert_eq!(settings.password, "");
    assert_eq!(
        settings.ca_certificate,
        Some(PathBuf::from("/etc/ssl/router-ca.pem"))
    );
    assert!(settings.insecure);
    assert_eq!(settings.timeout, Some(Duration::from_secs(20)));

    let opts = settings.client_opts();
    assert_eq!(opts.host_url, "router.lan:8443");
    assert!(opts.insecure);
}

#[test]
fn missing_host_fails_closed() {
    let site = r#"
appliance:
  username: "terraform"
"#;
    let cfg = load_layered_yaml_from_strings(&[SENTINEL_ENV, site])
        .unwrap()
        .config_json;
    let err = resolve_connection(&cfg).unwrap_err().to_string();
    assert!(err.contains("CONFIG_MISSING"), "got: {err}");
    assert!(err.contains("RFL_SENTINEL_HOST_UNSET_C1"), "got: {err}");
}

#[test]
fn missing_username_fails_closed() {
    let site = r#"
appliance:
  host_url: "router.lan"
"#;
    let cfg = load_layered_yaml_from_strings(&[SENTINEL_ENV, site])
        .unwrap()
        .config_json;
    let err = resolve_connection(&cfg).unwrap_err().to_string();
    assert!(err.contains("CONFIG_MISSING"), "got: {err}");
    assert!(err.contains("RFL_SENTINEL_USER_UNSET_C1"), "got: {err}");
}

#[test]
fn defaults_when_optional_settings_absent() {
    let site = r#"
appliance:
  host_url: "router.lan"
  username: "admin"
"#;
    let cfg = load_layered_yaml_from_strings(&[SENTINEL_ENV, site])
        .unwrap()
        .config_json;
    let settings = resolve_connection(&cfg).unwrap();
    assert_eq!(settings.ca_certificate, None);
    assert!(!settings.insecure);
    assert_eq!(settings.timeout, None);
}

#[test]
fn insecure_must_be_boolean() {
    let cfg = load(
        r#"
appliance:
  host_url: "router.lan"
  username: "admin"
  insecure: "sometimes"
  env:
    insecure: "RFL_SENTINEL_INSECURE_UNSET_C2"
"#,
    );
    let err = resolve_connection(&cfg).unwrap_err().to_string();
    assert!(err.contains("CONFIG_INVALID"), "got: {err}");
}

#[test]
fn debug_output_is_redacted() {
    let cfg = load(
        r#"
appliance:
  host_url: "router.lan"
  username: "admin"
  env:
    password: "RFL_SENTINEL_PASS_UNSET_C3"
"#,
    );
    let mut settings = resolve_connection(&cfg).unwrap();
    settings.password = "s3cr3t-value".to_string();
    let dbg = format!("{settings:?}");
    assert!(dbg.contains("<REDACTED>"));
    assert!(!dbg.contains("s3cr3t-value"));
}

#[test]
fn layered_files_resolve() {
    let mut base = tempfile::NamedTempFile::new().unwrap();
    writeln!(base, "{SENTINEL_ENV}").unwrap();
    let mut site = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        site,
        "appliance:\n  host_url: \"https://10.0.0.1\"\n  username: \"ops\"\norderings:\n  - category: nat\n    rules: [\"*4\", \"*2\"]\n"
    )
    .unwrap();

    let base_path = base.path().to_string_lossy().to_string();
    let site_path = site.path().to_string_lossy().to_string();
    let loaded = load_layered_yaml(&[base_path.as_str(), site_path.as_str()]).unwrap();

    let settings = resolve_connection(&loaded.config_json).unwrap();
    assert_eq!(settings.host_url, "https://10.0.0.1");
    assert_eq!(settings.username, "ops");

    let specs = rfl_config::orderings_from_config(&loaded.config_json).unwrap();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].desired_order, vec!["*4", "*2"]);
}

#[test]
fn missing_file_names_the_path() {
    let err = load_layered_yaml(&["/nonexistent/rfl/site.yaml"]).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/rfl/site.yaml"));
}
