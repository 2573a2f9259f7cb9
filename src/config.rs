//! Configuration management for mcplink
//!
//! Handles loading, parsing, and validating configuration from an optional
//! YAML file. When the file is absent, built-in defaults pointing at the
//! Jotform MCP deployments are used, so the tool runs without any setup.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{McplinkError, Result};

/// Main configuration structure for mcplink
///
/// Holds the service-level knobs for the authorization flow plus the map of
/// named deployments the CLI selector chooses between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service and authorization flow settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Named deployments: selector name to service base URL
    #[serde(default = "default_deployments")]
    pub deployments: BTreeMap<String, String>,

    /// Deployment used when the CLI does not select one
    #[serde(default = "default_deployment")]
    pub default_deployment: String,
}

/// Service and authorization flow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Human-readable client name sent during dynamic client registration
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Loopback TCP port for the OAuth redirect callback
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,

    /// Seconds to wait for the redirect callback before failing
    #[serde(default = "default_callback_timeout")]
    pub callback_timeout_seconds: u64,

    /// Seconds allowed for establishing HTTP connections
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_client_name() -> String {
    "Local MCP Client".to_string()
}

fn default_callback_port() -> u16 {
    8976
}

fn default_callback_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_deployment() -> String {
    "chatgpt".to_string()
}

fn default_deployments() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "chatgpt".to_string(),
            "https://mcp.jotform.com/chatgpt".to_string(),
        ),
        (
            "chatgpt-app".to_string(),
            "https://mcp.jotform.com/chatgpt-app".to_string(),
        ),
        ("default".to_string(), "https://mcp.jotform.com".to_string()),
    ])
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            callback_port: default_callback_port(),
            callback_timeout_seconds: default_callback_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            deployments: default_deployments(),
            default_deployment: default_deployment(),
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file, falling back to defaults when
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`McplinkError::Config`] when the file exists but cannot be
    /// read or parsed.
    pub fn load(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("config file not found at {}, using defaults", path);
            Ok(Self::default())
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| McplinkError::Config(format!("failed to read config file: {e}")))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| McplinkError::Config(format!("failed to parse config: {e}")).into())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`McplinkError::Config`] when the deployment map is empty,
    /// the default deployment is not in the map, a deployment URL is not a
    /// valid absolute HTTP(S) URL, or a timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.deployments.is_empty() {
            return Err(
                McplinkError::Config("at least one deployment must be configured".to_string())
                    .into(),
            );
        }

        if !self.deployments.contains_key(&self.default_deployment) {
            return Err(McplinkError::Config(format!(
                "default deployment '{}' is not in the deployment map",
                self.default_deployment
            ))
            .into());
        }

        for (name, url) in &self.deployments {
            let parsed = Url::parse(url).map_err(|e| {
                McplinkError::Config(format!("deployment '{name}' has an invalid URL: {e}"))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(McplinkError::Config(format!(
                    "deployment '{name}' must use http or https, got '{}'",
                    parsed.scheme()
                ))
                .into());
            }
        }

        if self.service.callback_timeout_seconds == 0 {
            return Err(McplinkError::Config(
                "callback_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.service.connect_timeout_seconds == 0 {
            return Err(McplinkError::Config(
                "connect_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Resolves the deployment selected on the CLI (or the configured
    /// default) to its name and base URL.
    ///
    /// # Errors
    ///
    /// Returns [`McplinkError::Config`] for an unknown deployment name or an
    /// unparseable URL.
    pub fn resolve_deployment(&self, selected: Option<&str>) -> Result<(String, Url)> {
        let name = selected.unwrap_or(&self.default_deployment);
        let url = self.deployments.get(name).ok_or_else(|| {
            McplinkError::Config(format!(
                "unknown deployment '{name}'; configured deployments: {}",
                self.deployments
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;
        let url = Url::parse(url)
            .map_err(|e| McplinkError::Config(format!("deployment '{name}' URL: {e}")))?;
        Ok((name.to_string(), url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_deployment_resolves() {
        let config = Config::default();
        let (name, url) = config.resolve_deployment(None).expect("resolve default");
        assert_eq!(name, "chatgpt");
        assert_eq!(url.as_str(), "https://mcp.jotform.com/chatgpt");
    }

    #[test]
    fn test_selected_deployment_overrides_default() {
        let config = Config::default();
        let (name, url) = config
            .resolve_deployment(Some("chatgpt-app"))
            .expect("resolve selection");
        assert_eq!(name, "chatgpt-app");
        assert_eq!(url.as_str(), "https://mcp.jotform.com/chatgpt-app");
    }

    #[test]
    fn test_unknown_deployment_is_rejected() {
        let config = Config::default();
        let result = config.resolve_deployment(Some("staging"));
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("staging"), "error should name the selector: {msg}");
    }

    #[test]
    fn test_empty_deployment_map_is_rejected() {
        let config = Config {
            deployments: BTreeMap::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_deployment_must_exist_in_map() {
        let config = Config {
            default_deployment: "missing".to_string(),
            ..Config::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("missing"));
    }

    #[test]
    fn test_non_http_deployment_url_is_rejected() {
        let config = Config {
            deployments: BTreeMap::from([("bad".to_string(), "ftp://example.com".to_string())]),
            default_deployment: "bad".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_callback_timeout_is_rejected() {
        let config = Config {
            service: ServiceConfig {
                callback_timeout_seconds: 0,
                ..ServiceConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_parses_with_partial_fields() {
        let yaml = r#"
service:
  callback_port: 9123
deployments:
  local: "http://127.0.0.1:3000/mcp"
default_deployment: local
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.service.callback_port, 9123);
        // Unspecified fields keep their defaults.
        assert_eq!(config.service.client_name, "Local MCP Client");
        assert_eq!(config.service.callback_timeout_seconds, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/path/config.yaml").expect("load defaults");
        assert_eq!(config.default_deployment, "chatgpt");
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "deployments: [not, a, map]").unwrap();
        let result = Config::load(path.to_str().unwrap());
        assert!(result.is_err());
    }
}
