//! Application settings.
//!
//! Settings come from an optional TOML file (`autoplux.toml` by default, or the path in
//! `AUTOPLUX_CONFIG`) and are then overridden by `DATABASE_URL`, `JWT_SECRET` and
//! `BIND_ADDR` from the environment. Every field has a default, so a missing file still
//! yields a usable development setup.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

const DEFAULT_CONFIG_PATH: &str = "autoplux.toml";
const DEV_JWT_SECRET: &str = "autoplux-development-secret-change-me";

/// Configuration structure representing the entire config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: super::database::DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    /// Lifetime of tokens issued by `api::auth::issue_token`
    pub token_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_minutes: 24 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per client per window on write-heavy routes
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window_secs: 60,
        }
    }
}

/// Parses settings from a TOML string.
///
/// # Errors
/// Returns `Error::Config` if the TOML syntax is invalid or a field has the wrong type.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse configuration: {e}"),
    })
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Applies environment overrides on top of file settings.
fn apply_overrides(mut config: AppConfig, lookup: impl Fn(&str) -> Option<String>) -> AppConfig {
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(secret) = lookup("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Some(addr) = lookup("BIND_ADDR") {
        config.server.bind_addr = addr;
    }
    config
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.auth.jwt_secret.trim().is_empty() {
        return Err(Error::Config {
            message: "JWT secret cannot be empty".to_string(),
        });
    }
    if config.rate_limit.max_requests == 0 || config.rate_limit.window_secs == 0 {
        return Err(Error::Config {
            message: "Rate limit values must be greater than zero".to_string(),
        });
    }
    Ok(())
}

/// Loads the full application configuration: file (if present) plus environment.
///
/// # Errors
/// Returns an error if an existing config file is invalid or the result fails validation.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("AUTOPLUX_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let from_file = if Path::new(&path).exists() {
        info!("Loading configuration from {}", path);
        load_config(&path)?
    } else {
        info!("No configuration file at {}, using defaults", path);
        AppConfig::default()
    };

    let config = apply_overrides(from_file, |key| std::env::var(key).ok());
    validate(&config)?;

    if config.auth.jwt_secret == DEV_JWT_SECRET {
        warn!("Using the development JWT secret; set JWT_SECRET in production");
    }
    Ok(config)
}
