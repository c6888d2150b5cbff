use crate::error::{Result, StoreError};
use crate::store::StoreLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub limits: StoreLimits,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_expiration")]
    pub token_expiration_hours: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    8
}

fn default_busy_timeout() -> u64 {
    5
}

fn default_token_expiration() -> u64 {
    1
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| StoreError::Config(e.to_string()))?;

        toml::from_str(&content).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Layered load: built-in defaults, then the TOML file (if it exists),
    /// then `KV__SECTION__FIELD` environment variables. `DATABASE_URL` and
    /// `JWT_SECRET` win over everything else.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let defaults = ::config::Config::try_from(&Config::default())
            .map_err(|e| StoreError::Config(e.to_string()))?;

        let mut builder = ::config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path.as_ref())
                    .format(::config::FileFormat::Toml)
                    .required(false),
            );
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("KV")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("storage.database_url", std::env::var("DATABASE_URL").ok())
            .and_then(|b| b.set_override_option("auth.jwt_secret", std::env::var("JWT_SECRET").ok()))
            .and_then(|b| b.build())
            .map_err(|e| StoreError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "0.0.0.0:8080".to_string(),
                request_timeout_secs: default_request_timeout(),
            },
            storage: StorageConfig {
                database_url: "sqlite://kv.db".to_string(),
                max_connections: default_max_connections(),
                busy_timeout_secs: default_busy_timeout(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_expiration_hours: default_token_expiration(),
            },
            limits: StoreLimits::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
