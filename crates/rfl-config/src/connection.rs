//! Appliance connection settings.
//!
//! # Contract
//! - Config stores the connection shape (`/appliance/*`) and the env var
//!   NAMES to fall back on (`/appliance/env/*`). The password is only ever
//!   read from the environment.
//! - A config value wins over its env var.
//! - Callers resolve once at startup and pass the resulting
//!   [`ConnectionSettings`] into the transport constructor.
//! - `Debug` output redacts the password; errors name env vars, never values.
//!
//! | Setting          | Config pointer               | Env var default      |
//! |------------------|------------------------------|----------------------|
//! | host             | `/appliance/host_url`        | `ROS_HOSTURL`        |
//! | username         | `/appliance/username`        | `ROS_USERNAME`       |
//! | password         | (never)                      | `ROS_PASSWORD`       |
//! | CA bundle path   | `/appliance/ca_certificate`  | `ROS_CA_CERTIFICATE` |
//! | skip TLS verify  | `/appliance/insecure`        | `ROS_INSECURE`       |
//! | timeout seconds  | `/appliance/timeout_secs`    | (none)               |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use serde_json::Value;
use tracing::warn;

use rfl_routeros::ClientOpts;

/// Resolved connection settings for one appliance.
#[derive(Clone)]
pub struct ConnectionSettings {
    pub host_url: String,
    pub username: String,
    pub password: String,
    pub ca_certificate: Option<PathBuf>,
    pub insecure: bool,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host_url", &self.host_url)
            .field("username", &self.username)
            .field(
                "password",
                &(!self.password.is_empty()).then_some("<REDACTED>"),
            )
            .field("ca_certificate", &self.ca_certificate)
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ConnectionSettings {
    pub fn client_opts(&self) -> ClientOpts {
        ClientOpts {
            host_url: self.host_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            ca_certificate: self.ca_certificate.clone(),
            insecure: self.insecure,
            timeout: self.timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Env var names extracted from the config JSON.
struct EnvNames {
    host_url: String,
    username: String,
    password: String,
    ca_certificate: String,
    insecure: String,
}

/// Non-empty string at `pointer`, trimmed.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Named env var, `None` when unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn parse_env_names(config_json: &Value) -> EnvNames {
    EnvNames {
        host_url: read_str_at(config_json, "/appliance/env/host_url")
            .unwrap_or_else(|| "ROS_HOSTURL".to_string()),
        username: read_str_at(config_json, "/appliance/env/username")
            .unwrap_or_else(|| "ROS_USERNAME".to_string()),
        password: read_str_at(config_json, "/appliance/env/password")
            .unwrap_or_else(|| "ROS_PASSWORD".to_string()),
        ca_certificate: read_str_at(config_json, "/appliance/env/ca_certificate")
            .unwrap_or_else(|| "ROS_CA_CERTIFICATE".to_string()),
        insecure: read_str_at(config_json, "/appliance/env/insecure")
            .unwrap_or_else(|| "ROS_INSECURE".to_string()),
    }
}

/// `true`/`false`/`1`/`0`/`yes`/`no`, case-insensitive.
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "t" => Some(true),
        "false" | "0" | "no" | "f" => Some(false),
        _ => None,
    }
}

fn resolve_insecure(config_json: &Value, env_var: &str) -> Result<bool> {
    match config_json.pointer("/appliance/insecure") {
        Some(Value::Bool(b)) => return Ok(*b),
        Some(Value::Null) | None => {}
        Some(other) => bail!(
            "CONFIG_INVALID key=/appliance/insecure: expected a boolean, got {}",
            other
        ),
    }

    let Some(raw) = resolve_env(env_var) else {
        return Ok(false);
    };
    match parse_bool(&raw) {
        Some(b) => Ok(b),
        None => {
            warn!(
                env_var,
                "could not parse value as a boolean; TLS verification stays enabled"
            );
            Ok(false)
        }
    }
}

fn resolve_timeout(config_json: &Value) -> Result<Option<Duration>> {
    match config_json.pointer("/appliance/timeout_secs") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(0) | None => bail!(
                "CONFIG_INVALID key=/appliance/timeout_secs: expected a positive integer, got {}",
                v
            ),
            Some(secs) => Ok(Some(Duration::from_secs(secs))),
        },
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Resolve connection settings from config, falling back to the environment.
///
/// # Errors
/// `CONFIG_MISSING` naming the config key and env var when the host or the
/// username cannot be found; `CONFIG_INVALID` for mistyped values.
pub fn resolve_connection(config_json: &Value) -> Result<ConnectionSettings> {
    let names = parse_env_names(config_json);

    let Some(host_url) =
        read_str_at(config_json, "/appliance/host_url").or_else(|| resolve_env(&names.host_url))
    else {
        bail!(
            "CONFIG_MISSING: no appliance host; set /appliance/host_url or env var '{}'",
            names.host_url
        );
    };

    let Some(username) =
        read_str_at(config_json, "/appliance/username").or_else(|| resolve_env(&names.username))
    else {
        bail!(
            "CONFIG_MISSING: no appliance username; set /appliance/username or env var '{}'",
            names.username
        );
    };

    let password = resolve_env(&names.password).unwrap_or_default();

    let ca_certificate = read_str_at(config_json, "/appliance/ca_certificate")
        .or_else(|| resolve_env(&names.ca_certificate))
        .map(PathBuf::from);

    let insecure = resolve_insecure(config_json, &names.insecure)?;
    let timeout = resolve_timeout(config_json)?;

    Ok(ConnectionSettings {
        host_url,
        username,
        password,
        ca_certificate,
        insecure,
        timeout,
    })
}
