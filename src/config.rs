use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{ClientCredentials, DEFAULT_AUTHORITY_HOST, TokenEndpoint};

pub const ENV_URL: &str = "DATAVERSE_URL";
pub const ENV_TENANT_ID: &str = "DATAVERSE_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "DATAVERSE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "DATAVERSE_CLIENT_SECRET";
pub const ENV_TOKEN_ENDPOINT: &str = "DATAVERSE_TOKEN_ENDPOINT";
pub const ENV_AUTHORITY_HOST: &str = "DATAVERSE_AUTHORITY_HOST";
pub const ENV_TIMEOUT_SECS: &str = "DATAVERSE_TIMEOUT_SECS";

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub environment_url: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub token_endpoint: TokenEndpoint,
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_cache_tokens")]
    pub cache_tokens: bool,
}

fn default_authority_host() -> String {
    DEFAULT_AUTHORITY_HOST.to_string()
}

fn default_cache_tokens() -> bool {
    true
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            // Use XDG config directory on Linux
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("dataverse-cli")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".dataverse-cli")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path`, else the default config file if it exists, else the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let default_path = Self::get_config_path()?;
        if default_path.exists() {
            return Self::from_file(&default_path);
        }

        debug!("No config file at {:?}, reading environment", default_path);
        Self::from_env()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;

        info!("Loaded config for {}", config.environment_url);
        Ok(config)
    }

    /// Read `DATAVERSE_*` variables, loading `.env` first if present
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {:?}", path);
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String> {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} environment variable not set", name))
        };

        let token_endpoint = match lookup(ENV_TOKEN_ENDPOINT) {
            Some(raw) if !raw.trim().is_empty() => raw
                .parse()
                .with_context(|| format!("Invalid {}", ENV_TOKEN_ENDPOINT))?,
            _ => TokenEndpoint::default(),
        };

        let timeout_secs = match lookup(ENV_TIMEOUT_SECS) {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("Invalid {}: '{}'", ENV_TIMEOUT_SECS, raw))?,
            ),
            _ => None,
        };

        let mut config = Self {
            environment_url: required(ENV_URL)?,
            tenant_id: required(ENV_TENANT_ID)?,
            client_id: required(ENV_CLIENT_ID)?,
            client_secret: required(ENV_CLIENT_SECRET)?,
            token_endpoint,
            authority_host: lookup(ENV_AUTHORITY_HOST)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(default_authority_host),
            timeout_secs,
            cache_tokens: true,
        };
        config.validate()?;
        Ok(config)
    }

    /// Fail on missing required values and normalise URLs
    pub fn validate(&mut self) -> Result<()> {
        let fields = [
            ("environment_url", &self.environment_url),
            ("tenant_id", &self.tenant_id),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                anyhow::bail!("Config value '{}' must not be empty", name);
            }
        }

        let url = self.environment_url.trim();
        if !url.starts_with("https://") && !url.starts_with("http://") {
            anyhow::bail!("environment_url must be an absolute http(s) URL, got '{}'", url);
        }

        self.environment_url = url.trim_end_matches('/').to_string();
        self.authority_host = self.authority_host.trim().trim_end_matches('/').to_string();
        Ok(())
    }

    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials::new(&self.tenant_id, &self.client_id, &self.client_secret)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("environment_url", &self.environment_url)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_endpoint", &self.token_endpoint)
            .field("authority_host", &self.authority_host)
            .field("timeout_secs", &self.timeout_secs)
            .field("cache_tokens", &self.cache_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn required_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_URL, "https://org.crm.dynamics.com/"),
            (ENV_TENANT_ID, "tenant"),
            (ENV_CLIENT_ID, "client"),
            (ENV_CLIENT_SECRET, "secret"),
        ]
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = Config::from_lookup(lookup(&required_vars())).unwrap();

        assert_eq!(config.environment_url, "https://org.crm.dynamics.com");
        assert_eq!(config.token_endpoint, TokenEndpoint::V2);
        assert_eq!(config.authority_host, "https://login.microsoftonline.com");
        assert_eq!(config.timeout(), None);
        assert!(config.cache_tokens);
    }

    #[test]
    fn test_from_lookup_optional_values() {
        let mut vars = required_vars();
        vars.push((ENV_TOKEN_ENDPOINT, "v1"));
        vars.push((ENV_TIMEOUT_SECS, "30"));
        vars.push((ENV_AUTHORITY_HOST, "https://login.microsoftonline.us/"));

        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.token_endpoint, TokenEndpoint::V1);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.authority_host, "https://login.microsoftonline.us");
    }

    #[test]
    fn test_missing_variable_is_named() {
        let vars: Vec<_> = required_vars()
            .into_iter()
            .filter(|(k, _)| *k != ENV_CLIENT_SECRET)
            .collect();
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains(ENV_CLIENT_SECRET));
    }

    #[test]
    fn test_invalid_timeout() {
        let mut vars = required_vars();
        vars.push((ENV_TIMEOUT_SECS, "soon"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_toml_round_trip_defaults() {
        let raw = r#"
environment_url = "https://org.crm.dynamics.com/"
tenant_id = "tenant"
client_id = "client"
client_secret = "secret"
"#;
        let mut config: Config = toml::from_str(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.environment_url, "https://org.crm.dynamics.com");
        assert!(config.cache_tokens);
        assert_eq!(config.token_endpoint, TokenEndpoint::V2);
    }

    #[test]
    fn test_validate_rejects_relative_url() {
        let mut config = Config::from_lookup(lookup(&required_vars())).unwrap();
        config.environment_url = "org.crm.dynamics.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::from_lookup(lookup(&required_vars())).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("<redacted>"));
    }
}
