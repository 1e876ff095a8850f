//! Medbook Configuration Module
//! Handles loading and validating medbook.config.json plus environment overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "medbook.config.json";

const MIN_SECRET_LEN: usize = 16;

pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("A JWT secret of at least 16 bytes is required in production mode")]
    MissingSecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Development,
    #[default]
    Production,
}

impl RunMode {
    pub fn is_development(self) -> bool {
        self == RunMode::Development
    }
}

impl std::str::FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(RunMode::Development),
            "production" | "prod" => Ok(RunMode::Production),
            other => Err(ConfigError::InvalidValue {
                key: "mode".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/medbook.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Prefer MEDBOOK_JWT_SECRET over the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

fn default_port() -> u16 {
    5000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_bcrypt_cost() -> u32 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            mode: RunMode::default(),
            database: DatabaseConfig::default(),
            api: ApiConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Load from `<dir>/medbook.config.json`, falling back to defaults when absent.
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = project_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, project_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(project_dir)?;
        let config_path = project_dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Overlay MEDBOOK_* environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MEDBOOK_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(host) = lookup("MEDBOOK_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("MEDBOOK_PORT") {
            self.api.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MEDBOOK_PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(secret) = lookup("MEDBOOK_JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(mode) = lookup("MEDBOOK_MODE") {
            self.mode = mode.parse()?;
        }
        Ok(())
    }

    /// Check invariants and settle the JWT secret.
    ///
    /// Development mode without a secret gets a random per-process one, so
    /// tokens do not survive a restart.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.auth.bcrypt_cost) {
            return Err(ConfigError::InvalidValue {
                key: "auth.bcrypt_cost".to_string(),
                value: self.auth.bcrypt_cost.to_string(),
            });
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "auth.token_ttl_hours".to_string(),
                value: self.auth.token_ttl_hours.to_string(),
            });
        }

        let secret_ok = self
            .auth
            .jwt_secret
            .as_ref()
            .map_or(false, |s| s.len() >= MIN_SECRET_LEN);

        if !secret_ok {
            match self.mode {
                RunMode::Production => return Err(ConfigError::MissingSecret),
                RunMode::Development => {
                    tracing::warn!("no usable JWT secret configured, generating an ephemeral one");
                    self.auth.jwt_secret = Some(format!(
                        "{}{}",
                        uuid::Uuid::new_v4().simple(),
                        uuid::Uuid::new_v4().simple()
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn jwt_secret(&self) -> &str {
        self.auth.jwt_secret.as_deref().unwrap_or_default()
    }

    /// Resolve the database path against the project directory.
    pub fn database_path(&self, project_dir: &Path) -> PathBuf {
        if self.database.path.is_absolute() {
            self.database.path.clone()
        } else {
            project_dir.join(&self.database.path)
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
