use thiserror::Error;

use crate::tokens::{SessionConfig, MAX_TOKEN_EXPIRATION_MINUTES};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub sessions: SessionConfig,
    pub store: StoreConfig,
    /// Optional JSON file seeding the user directory
    pub users_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Mark the session cookie `Secure` (set when TLS terminates in front)
    pub cookie_secure: bool,
    /// Service name reported by the health endpoint
    pub service: String,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub cleanup_interval_seconds: u64,
    pub data_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum StoreBackend {
    Memory,
    #[default]
    Redb,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            cookie_secure: false,
            service: "session-auth".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redb,
            cleanup_interval_seconds: 60,
            data_dir: "./data".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let server_defaults = ServerConfig::default();
        let store_defaults = StoreConfig::default();
        let session_defaults = SessionConfig::default();

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or(server_defaults.bind_address);
        let service = std::env::var("SERVICE_NAME").unwrap_or(server_defaults.service);
        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let data_dir = std::env::var("DATA_DIR").unwrap_or(store_defaults.data_dir);
        let backend = std::env::var("SESSION_STORE")
            .ok()
            .map(|s| match s.to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Redb,
            })
            .unwrap_or_default();

        let config = Config {
            server: ServerConfig {
                bind_address,
                cookie_secure,
                service,
            },
            sessions: SessionConfig {
                token_bytes: parse_env("TOKEN_BYTES", session_defaults.token_bytes)?,
                token_expiration_minutes: parse_env(
                    "TOKEN_EXPIRATION_MINUTES",
                    session_defaults.token_expiration_minutes,
                )?,
            },
            store: StoreConfig {
                backend,
                cleanup_interval_seconds: parse_env(
                    "CLEANUP_INTERVAL_SECONDS",
                    store_defaults.cleanup_interval_seconds,
                )?,
                data_dir,
            },
            users_file: std::env::var("USERS_FILE").ok().filter(|s| !s.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sessions.token_expiration_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "TOKEN_EXPIRATION_MINUTES must be greater than 0".to_string(),
            ));
        }
        if self.sessions.token_expiration_minutes > MAX_TOKEN_EXPIRATION_MINUTES {
            return Err(ConfigError::ValidationError(format!(
                "TOKEN_EXPIRATION_MINUTES must be at most {MAX_TOKEN_EXPIRATION_MINUTES}"
            )));
        }
        if self.sessions.token_bytes < 16 {
            return Err(ConfigError::ValidationError(
                "TOKEN_BYTES must be at least 16".to_string(),
            ));
        }
        if self.store.cleanup_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "CLEANUP_INTERVAL_SECONDS must be greater than 0".to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Memory {
            tracing::warn!("Using the in-memory session store; sessions will not survive a restart");
        }

        Ok(())
    }
}

/// Read a numeric variable, falling back to `default` when unset.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::ValidationError(format!("{name} must be a number"))),
        Err(_) => Ok(default),
    }
}
