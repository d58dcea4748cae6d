//! Configuration module for the relay server.
//!
//! Configuration comes from .env files, environment variables and an optional
//! YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Example
//! ```rust,no_run
//! use s2s_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from a YAML file with environment variables underneath
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Relay listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::core::WsInferenceConfig;

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid YAML
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Values do not describe a runnable server
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration.
///
/// Covers the listen address, the bidirectional inference endpoint and the
/// external query resolver endpoint.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// WebSocket endpoint of the inference backend (`ws://` or `wss://`)
    pub inference_endpoint: String,
    /// Model identifier passed to the backend
    pub inference_model_id: String,
    /// Optional bearer token for the inference handshake
    pub inference_auth_token: Option<String>,
    /// HTTP endpoint of the query resolver
    pub resolver_endpoint: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            inference_endpoint: String::new(),
            inference_model_id: "amazon.nova-sonic-v1:0".to_string(),
            inference_auth_token: None,
            resolver_endpoint: String::new(),
        }
    }
}

/// YAML file shape; every field optional so a file can override selectively.
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    host: Option<String>,
    port: Option<u16>,
    inference: Option<YamlInference>,
    resolver: Option<YamlResolver>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlInference {
    endpoint: Option<String>,
    model_id: Option<String>,
    auth_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlResolver {
    endpoint: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::env_overlay();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, with environment variables
    /// filling anything the file leaves out.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let yaml: YamlConfig = serde_yaml::from_str(&text)?;

        let mut config = Self::env_overlay();
        if let Some(host) = yaml.host {
            config.host = host;
        }
        if let Some(port) = yaml.port {
            config.port = port;
        }
        if let Some(inference) = yaml.inference {
            if let Some(endpoint) = inference.endpoint {
                config.inference_endpoint = endpoint;
            }
            if let Some(model_id) = inference.model_id {
                config.inference_model_id = model_id;
            }
            if inference.auth_token.is_some() {
                config.inference_auth_token = inference.auth_token;
            }
        }
        if let Some(resolver) = yaml.resolver
            && let Some(endpoint) = resolver.endpoint
        {
            config.resolver_endpoint = endpoint;
        }

        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with environment variables, not yet validated.
    fn env_overlay() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("S2S_HOST").unwrap_or(defaults.host),
            port: env::var("S2S_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            inference_endpoint: env::var("S2S_INFERENCE_ENDPOINT")
                .unwrap_or(defaults.inference_endpoint),
            inference_model_id: env::var("S2S_INFERENCE_MODEL_ID")
                .unwrap_or(defaults.inference_model_id),
            inference_auth_token: env::var("S2S_INFERENCE_AUTH_TOKEN").ok(),
            resolver_endpoint: env::var("S2S_RESOLVER_ENDPOINT")
                .unwrap_or(defaults.resolver_endpoint),
        }
    }

    /// Check the configuration describes a runnable server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must not be 0".to_string()));
        }

        let inference = Url::parse(&self.inference_endpoint).map_err(|e| {
            ConfigError::Invalid(format!("inference endpoint is not a valid URL: {e}"))
        })?;
        if !matches!(inference.scheme(), "ws" | "wss") {
            return Err(ConfigError::Invalid(
                "inference endpoint must use ws:// or wss://".to_string(),
            ));
        }

        let resolver = self.resolver_url()?;
        if !matches!(resolver.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(
                "resolver endpoint must use http:// or https://".to_string(),
            ));
        }

        Ok(())
    }

    /// Bind address as `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parsed resolver endpoint.
    pub fn resolver_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.resolver_endpoint).map_err(|e| {
            ConfigError::Invalid(format!("resolver endpoint is not a valid URL: {e}"))
        })
    }

    /// Inference channel settings derived from this configuration.
    pub fn inference(&self) -> WsInferenceConfig {
        WsInferenceConfig {
            endpoint: self.inference_endpoint.clone(),
            model_id: self.inference_model_id.clone(),
            auth_token: self.inference_auth_token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            inference_endpoint: "wss://inference.example.com/stream".to_string(),
            resolver_endpoint: "http://127.0.0.1:8090/query".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_endpoints_rejected() {
        let config = ServerConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inference_endpoint_scheme_checked() {
        let config = ServerConfig {
            inference_endpoint: "http://inference.example.com".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolver_endpoint_scheme_checked() {
        let config = ServerConfig {
            resolver_endpoint: "ws://127.0.0.1:8090".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_address_format() {
        let config = valid_config();
        assert_eq!(config.address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_yaml_overlay() {
        let yaml = r#"
host: 0.0.0.0
port: 9000
inference:
  endpoint: wss://inference.example.com/stream
  model_id: relay-test-v2
resolver:
  endpoint: http://resolver.internal/query
"#;
        let parsed: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(parsed.port, Some(9000));
        assert_eq!(
            parsed.inference.as_ref().unwrap().model_id.as_deref(),
            Some("relay-test-v2")
        );
        assert_eq!(
            parsed.resolver.as_ref().unwrap().endpoint.as_deref(),
            Some("http://resolver.internal/query")
        );
    }

    #[test]
    fn test_inference_settings_derived() {
        let config = valid_config();
        let inference = config.inference();
        assert_eq!(inference.endpoint, "wss://inference.example.com/stream");
        assert_eq!(inference.model_id, "amazon.nova-sonic-v1:0");
    }
}
