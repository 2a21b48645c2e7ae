//! rfl-routeros
//!
//! RouterOS REST transport for the ordering engine.
//!
//! Endpoints used:
//! - List: `GET  {base}/rest/ip/firewall/{category}`
//! - Move: `POST {base}/rest/ip/firewall/{category}/move`
//!
//! Every request carries HTTP basic auth. Credentials are handed in by the
//! caller (config layer); do not log them.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

use rfl_ordering::{Appliance, Category, MoveCommand, RawRule, TransportError};

/// Connection options for [`RouterOsClient`].
#[derive(Clone)]
pub struct ClientOpts {
    /// Host, `host:port`, or full URL. Bare hosts get `https://`.
    pub host_url: String,
    pub username: String,
    pub password: String,
    /// PEM bundle added to the trusted roots.
    pub ca_certificate: Option<PathBuf>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Whole-request timeout; the transport default applies when `None`.
    pub timeout: Option<Duration>,
}

impl fmt::Debug for ClientOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOpts")
            .field("host_url", &self.host_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("ca_certificate", &self.ca_certificate)
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Turn user input into a base URL: keep an explicit scheme and port, default
/// to `https://`, drop trailing slashes.
pub fn normalize_host_url(raw: &str) -> Result<String, TransportError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(TransportError::Config("no host value provided".to_string()));
    }
    if trimmed.contains("://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("https://{trimmed}"))
    }
}

/// Blocking RouterOS REST client.
#[derive(Clone)]
pub struct RouterOsClient {
    base_url: String,
    username: String,
    password: String,
    http: Client,
}

impl fmt::Debug for RouterOsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterOsClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl RouterOsClient {
    pub fn new(opts: ClientOpts) -> Result<Self, TransportError> {
        let base_url = normalize_host_url(&opts.host_url)?;

        let mut builder = Client::builder().danger_accept_invalid_certs(opts.insecure);
        if let Some(path) = &opts.ca_certificate {
            let pem = fs::read(path).map_err(|e| {
                TransportError::Config(format!(
                    "could not read CA certificate at {}: {e}",
                    path.display()
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                TransportError::Config(format!(
                    "invalid CA certificate at {}: {e}",
                    path.display()
                ))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        if let Some(timeout) = opts.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::Config(format!("http client build failed: {e}")))?;

        Ok(Self {
            base_url,
            username: opts.username,
            password: opts.password,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rules_url(&self, category: Category) -> String {
        format!("{}/rest/ip/firewall/{}", self.base_url, category.as_str())
    }

    fn move_url(&self, category: Category) -> String {
        format!("{}/move", self.rules_url(category))
    }

    fn send(&self, req: RequestBuilder) -> Result<Response, TransportError> {
        let resp = req
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/json")
            .send()
            .map_err(|e| TransportError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        // Error bodies are best effort; a status alone is still reported.
        let body = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<RouterOsErrorBody>(&body)
            .map(|b| b.message())
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown")
                    .to_string()
            });
        Err(TransportError::Api {
            code: Some(status.as_u16()),
            message,
        })
    }
}

impl Appliance for RouterOsClient {
    fn name(&self) -> &'static str {
        "routeros"
    }

    fn list_rules(&self, category: Category) -> Result<Vec<RawRule>, TransportError> {
        let url = self.rules_url(category);
        debug!(%url, "GET rule list");

        let resp = self.send(self.http.get(&url))?;
        let body = resp
            .text()
            .map_err(|e| TransportError::Transport(e.to_string()))?;
        serde_json::from_str(&body)
            .map_err(|e| TransportError::Decode(format!("rule list from {url}: {e}")))
    }

    fn move_rules(&self, category: Category, cmd: &MoveCommand) -> Result<(), TransportError> {
        let url = self.move_url(category);
        debug!(%url, numbers = %cmd.numbers, destination = %cmd.destination, "POST move");

        self.send(self.http.post(&url).json(cmd))?;
        Ok(())
    }
}

/// Error body RouterOS sends with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
struct RouterOsErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl RouterOsErrorBody {
    fn message(&self) -> String {
        match (&self.message, &self.detail) {
            (Some(m), Some(d)) => format!("{m}: {d}"),
            (Some(m), None) => m.clone(),
            (None, Some(d)) => d.clone(),
            (None, None) => "unknown".to_string(),
        }
    }
}

// -----------------
// Tests (no network)
// -----------------
