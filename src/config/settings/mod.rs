
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use super::env_file::EnvSource;

pub const CONFIG_FILE_NAME: &str = "config.toml";
const APP_DIR_NAME: &str = "scaflog-zoho-mcp";

pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.zoho.com";
const PRODUCTION_API_BASE_URL: &str = "https://creator.zoho.com/api/v2";
const SANDBOX_API_BASE_URL: &str = "https://creatorsandbox.zoho.com/api/v2";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub zoho: ZohoConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Zoho deployment the server talks to
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
    Development,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ZohoConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub organization_id: String,
    pub environment: Environment,
    /// Overrides the per-environment Creator API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    pub accounts_url: String,
}

impl Default for ZohoConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            organization_id: String::new(),
            environment: Environment::default(),
            api_base_url: None,
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub cache_ttl_seconds: u64,
    pub request_timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            request_timeout_seconds: 30,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid environment: {0} (must be 'production', 'sandbox' or 'development')")]
    InvalidEnvironment(String),
    #[error("Missing Zoho credential: {0} (set it in config.toml or the {1} environment variable)")]
    MissingCredential(&'static str, &'static str),
    #[error("Invalid cache TTL: {0} (must be between 1 and 86400 seconds)")]
    InvalidCacheTtl(u64),
    #[error("Invalid request timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidRequestTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Environment {
    pub const ALL: [Self; 3] = [Self::Production, Self::Sandbox, Self::Development];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
            Self::Development => "development",
        }
    }

    #[inline]
    pub fn default_api_base_url(self) -> &'static str {
        match self {
            Self::Production | Self::Development => PRODUCTION_API_BASE_URL,
            Self::Sandbox => SANDBOX_API_BASE_URL,
        }
    }

    /// Value of the `environment` request header, if the deployment needs one
    #[inline]
    pub fn header_value(self) -> Option<&'static str> {
        match self {
            Self::Production | Self::Sandbox => None,
            Self::Development => Some("development"),
        }
    }
}

impl fmt::Display for Environment {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "sandbox" => Ok(Self::Sandbox),
            "development" | "dev" => Ok(Self::Development),
            _ => Err(ConfigError::InvalidEnvironment(s.to_string())),
        }
    }
}

impl Config {
    /// Default configuration directory, e.g. `~/.config/scaflog-zoho-mcp`
    #[inline]
    pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir` and apply environment overrides
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let env = EnvSource::detect().context("Failed to read environment file")?;
        Self::load_with_env(config_dir, &env)
    }

    #[inline]
    pub fn load_with_env<P: AsRef<Path>>(config_dir: P, env: &EnvSource) -> Result<Self> {
        let mut config = Self::load_file(config_dir.as_ref())?;

        config
            .apply_env(env)
            .context("Invalid value in environment")?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    fn load_file(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.to_path_buf();

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Override file values with `ZOHO_*` variables; empty values are ignored
    #[inline]
    pub fn apply_env(&mut self, env: &EnvSource) -> Result<(), ConfigError> {
        let zoho = &mut self.zoho;

        if let Some(value) = env.get("ZOHO_CLIENT_ID") {
            zoho.client_id = value.to_string();
        }
        if let Some(value) = env.get("ZOHO_CLIENT_SECRET") {
            zoho.client_secret = value.to_string();
        }
        if let Some(value) = env.get("ZOHO_REFRESH_TOKEN") {
            zoho.refresh_token = value.to_string();
        }
        if let Some(value) = env.get("ZOHO_ORGANIZATION_ID") {
            zoho.organization_id = value.to_string();
        }
        if let Some(value) = env.get("ZOHO_ENVIRONMENT") {
            zoho.environment = value.parse()?;
        }
        if let Some(value) = env.get("ZOHO_API_BASE_URL") {
            zoho.api_base_url = Some(value.to_string());
        }
        if let Some(value) = env.get("ZOHO_ACCOUNTS_URL") {
            zoho.accounts_url = value.to_string();
        }

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zoho.validate()?;
        self.server.validate()?;
        Ok(())
    }
}

impl ZohoConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_base_url()?;
        self.accounts_url()?;
        Ok(())
    }

    /// Fails when any credential needed for a token refresh is blank
    #[inline]
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        let required = [
            (&self.client_id, "client_id", "ZOHO_CLIENT_ID"),
            (&self.client_secret, "client_secret", "ZOHO_CLIENT_SECRET"),
            (&self.refresh_token, "refresh_token", "ZOHO_REFRESH_TOKEN"),
        ];

        for (value, name, var) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingCredential(name, var));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .api_base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.default_api_base_url());
        parse_http_url(raw)
    }

    #[inline]
    pub fn accounts_url(&self) -> Result<Url, ConfigError> {
        parse_http_url(&self.accounts_url)
    }

    /// OAuth token endpoint under the accounts server
    #[inline]
    pub fn token_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.accounts_url()?;
        url.path_segments_mut()
            .map_err(|()| ConfigError::InvalidUrl(self.accounts_url.clone()))?
            .pop_if_empty()
            .extend(["oauth", "v2", "token"]);
        Ok(url)
    }
}

impl ServerConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=86_400).contains(&self.cache_ttl_seconds) {
            return Err(ConfigError::InvalidCacheTtl(self.cache_ttl_seconds));
        }

        if !(1..=300).contains(&self.request_timeout_seconds) {
            return Err(ConfigError::InvalidRequestTimeout(
                self.request_timeout_seconds,
            ));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }
}

fn parse_http_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }

    Ok(url)
}
