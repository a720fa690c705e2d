//! Provider configuration for the F5 Distributed Cloud API
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::api::client::{
    normalize_api_url, AuthType, CertificateFiles, ClientOptions, F5xcClient,
};

pub const ENV_API_URL: &str = "F5XC_API_URL";
pub const ENV_API_TOKEN: &str = "F5XC_API_TOKEN";
pub const ENV_API_CERT: &str = "F5XC_API_CERT";
pub const ENV_API_KEY: &str = "F5XC_API_KEY";
pub const ENV_API_CA_CERT: &str = "F5XC_API_CA_CERT";

/// Connection settings for the F5XC API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Tenant URL, e.g. https://tenant.console.ves.volterra.io (F5XC_API_URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// API token (F5XC_API_TOKEN)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// PEM client certificate (F5XC_API_CERT)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,

    /// PEM private key (F5XC_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,

    /// CA bundle for the API endpoint (F5XC_API_CA_CERT)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_wait_min_ms")]
    pub retry_wait_min_ms: u64,

    #[serde(default = "default_retry_wait_max_ms")]
    pub retry_wait_max_ms: u64,

    /// Wait after an HTTP 429 before retrying
    #[serde(default = "default_rate_limit_delay_secs")]
    pub rate_limit_delay_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_wait_min_ms() -> u64 {
    1_000
}

fn default_retry_wait_max_ms() -> u64 {
    30_000
}

fn default_rate_limit_delay_secs() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            cert_file: None,
            key_file: None,
            ca_file: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_wait_min_ms: default_retry_wait_min_ms(),
            retry_wait_max_ms: default_retry_wait_max_ms(),
            rate_limit_delay_secs: default_rate_limit_delay_secs(),
        }
    }
}

impl ProviderConfig {
    /// Load configuration from a YAML file, filling gaps from the environment
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: ProviderConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Use the file when it exists, otherwise the environment
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            Self::from_file(path)
        } else {
            Self::from_env().with_context(|| {
                format!(
                    "{} not found and environment is incomplete (run `f5xc init` to create one)",
                    path.display()
                )
            })
        }
    }

    /// Fill unset fields from F5XC_* environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if self.api_url.is_none() {
            self.api_url = get(ENV_API_URL);
        }
        if self.api_token.is_none() {
            self.api_token = get(ENV_API_TOKEN);
        }
        if self.cert_file.is_none() {
            self.cert_file = get(ENV_API_CERT).map(PathBuf::from);
        }
        if self.key_file.is_none() {
            self.key_file = get(ENV_API_KEY).map(PathBuf::from);
        }
        if self.ca_file.is_none() {
            self.ca_file = get(ENV_API_CA_CERT).map(PathBuf::from);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let api_url = self
            .api_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .with_context(|| format!("api_url is required (or set {})", ENV_API_URL))?;

        let parsed = url::Url::parse(api_url)
            .with_context(|| format!("Invalid api_url: {}", api_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("api_url must use http or https: {}", api_url);
        }

        if self.cert_file.is_some() != self.key_file.is_some() {
            anyhow::bail!("cert_file and key_file must be set together");
        }

        if self.auth_method().is_none() {
            anyhow::bail!(
                "No authentication configured. Set one of:\n  - PEM: {} and {}\n  - Token: {}",
                ENV_API_CERT,
                ENV_API_KEY,
                ENV_API_TOKEN
            );
        }

        if self.retry_wait_min_ms > self.retry_wait_max_ms {
            anyhow::bail!("retry_wait_min_ms cannot exceed retry_wait_max_ms");
        }

        Ok(())
    }

    /// Certificate authentication wins over a token
    pub fn auth_method(&self) -> Option<AuthType> {
        if self.cert_file.is_some() && self.key_file.is_some() {
            Some(AuthType::Certificate)
        } else if self.api_token.as_deref().is_some_and(|t| !t.is_empty()) {
            Some(AuthType::Token)
        } else {
            None
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::default()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_retries(self.max_retries)
            .with_retry_wait(
                Duration::from_millis(self.retry_wait_min_ms),
                Duration::from_millis(self.retry_wait_max_ms),
            )
            .with_rate_limit_delay(Duration::from_secs(self.rate_limit_delay_secs))
    }

    /// Build an API client from this configuration
    pub fn build_client(&self) -> Result<F5xcClient> {
        self.validate()?;

        let raw_url = self.api_url.as_deref().unwrap_or_default();
        let (api_url, changed) = normalize_api_url(raw_url);
        if changed {
            warn!("Normalized api_url {} to {}", raw_url, api_url);
        }

        let client = match (self.auth_method(), &self.cert_file, &self.key_file) {
            (Some(AuthType::Certificate), Some(cert), Some(key)) => F5xcClient::with_certificate(
                &api_url,
                CertificateFiles {
                    cert,
                    key,
                    ca: self.ca_file.as_deref(),
                },
                self.client_options(),
            )
            .context("Failed to create certificate client")?,
            _ => F5xcClient::new(
                &api_url,
                self.api_token.as_deref().unwrap_or_default(),
                self.client_options(),
            )
            .context("Failed to create token client")?,
        };

        Ok(client)
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            api_url: Some("https://tenant.console.ves.volterra.io".to_string()),
            api_token: None,
            cert_file: None,
            key_file: None,
            ca_file: None,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn token_config() -> ProviderConfig {
        ProviderConfig {
            api_url: Some("https://tenant.console.ves.volterra.io".to_string()),
            api_token: Some("secret".to_string()),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn test_config_validation() {
        let mut config = token_config();
        assert!(config.validate().is_ok());

        config.api_url = None;
        assert!(config.validate().is_err());

        config.api_url = Some("not a url".to_string());
        assert!(config.validate().is_err());

        config.api_url = Some("ftp://tenant.example.com".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auth_detection() {
        let mut config = token_config();
        assert_eq!(config.auth_method(), Some(AuthType::Token));

        config.cert_file = Some(PathBuf::from("/tmp/cert.pem"));
        assert!(config.validate().is_err(), "cert without key");

        config.key_file = Some(PathBuf::from("/tmp/key.pem"));
        assert_eq!(config.auth_method(), Some(AuthType::Certificate));

        config.cert_file = None;
        config.key_file = None;
        config.api_token = Some(String::new());
        assert_eq!(config.auth_method(), None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_fills_missing_fields_only() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "https://env.example.com"),
            (ENV_API_TOKEN, "env-token"),
            (ENV_API_CA_CERT, "/etc/ca.pem"),
            (ENV_API_KEY, ""),
        ]
        .into_iter()
        .collect();

        let mut config = ProviderConfig {
            api_token: Some("file-token".to_string()),
            ..ProviderConfig::default()
        };
        config.apply_env_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_url.as_deref(), Some("https://env.example.com"));
        assert_eq!(config.api_token.as_deref(), Some("file-token"));
        assert_eq!(config.ca_file, Some(PathBuf::from("/etc/ca.pem")));
        assert_eq!(config.key_file, None);
    }

    #[test]
    fn test_yaml_defaults() {
        let config: ProviderConfig =
            serde_yaml::from_str("api_url: https://t.example.com/api\napi_token: x\n").unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.rate_limit_delay_secs, 60);

        let options = config.client_options();
        assert_eq!(options.retry_wait_min, Duration::from_secs(1));
        assert_eq!(options.retry_wait_max, Duration::from_secs(30));
    }

    #[test]
    fn test_build_client_normalizes_url() {
        let mut config = token_config();
        config.api_url = Some("https://t.example.com/api/".to_string());
        let client = config.build_client().unwrap();
        assert_eq!(client.base_url(), "https://t.example.com");
        assert_eq!(client.auth_type(), AuthType::Token);
    }

    #[test]
    fn test_example_round_trips() {
        let yaml = serde_yaml::to_string(&ProviderConfig::example()).unwrap();
        let parsed: ProviderConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, ProviderConfig::example());
        assert!(!yaml.contains("api_token"));
    }
}
