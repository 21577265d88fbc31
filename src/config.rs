//! Static configuration, read once at startup.
//!
//! ```toml
//! port = 8080
//! base_uri = "/v1/"
//! vary_fields = false
//!
//! [proxy]
//! timeout = 30000   # milliseconds
//! auth = "proxypassword"
//!
//! [error_messages]
//! dev = "Unknown error"
//! usr = { en_us = "Unexpected error, report to support or responsible developer" }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Path prefix stripped before routing, e.g. `/v1/`. Matched
    /// case-insensitively; must start and end with `/`.
    pub base_uri: String,
    pub proxy: ProxyConfig,
    pub error_messages: ErrorMessages,
    /// Let clients choose returned fields with the `fields` parameter.
    pub vary_fields: bool,
}

/// Settings shared with the upstream reverse proxy.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Per-request timeout in milliseconds.
    pub timeout: u64,
    /// Expected value of the `X-Authentication` header.
    pub auth: String,
}

/// Fallback messages for error envelopes whose status has no built-in default.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorMessages {
    pub dev: Option<String>,
    /// Any JSON value; typically one message per language.
    pub usr: Option<Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            base_uri: "/v1/".to_owned(),
            proxy: ProxyConfig::default(),
            error_messages: ErrorMessages {
                dev: Some("Unknown error".to_owned()),
                usr: Some(serde_json::json!({
                    "en_us": "Unexpected error, report to support or responsible developer",
                    "pt_br": "Erro inesperado, reportar ao suporte ou desenvolvedor responsável",
                })),
            },
            vary_fields: false,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self { timeout: 30_000, auth: String::new() }
    }
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

impl Config {
    /// Reads, parses and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_uri.starts_with('/') || !self.base_uri.ends_with('/') {
            return Err(Error::InvalidConfig(format!(
                "base_uri `{}` must start and end with `/`",
                self.base_uri
            )));
        }
        if self.proxy.auth.is_empty() {
            return Err(Error::InvalidConfig("proxy.auth must not be empty".to_owned()));
        }
        if self.proxy.timeout == 0 {
            return Err(Error::InvalidConfig("proxy.timeout must be positive".to_owned()));
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
