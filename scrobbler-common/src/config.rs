//! Configuration loading and credential resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: defaults are used and a warning is logged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Fallback timestamp applied to listen events that carry none (2026-01-01T07:45:34Z)
pub const DEFAULT_FALLBACK_TIMESTAMP: i64 = 1_767_253_534;

/// Default delay between submissions in seconds
pub const DEFAULT_BASE_DELAY_SECS: f64 = 0.4;

/// Default number of submission attempts per event
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Environment variable overriding the logs directory
pub const LOGS_DIR_ENV: &str = "SCROBBLER_LOGS_DIR";

const API_KEY_ENV: &[&str] = &["LASTFM_API_KEY", "API_KEY"];
const API_SECRET_ENV: &[&str] = &["LASTFM_API_SECRET", "API_SECRET"];
const USERNAME_ENV: &[&str] = &["LASTFM_USERNAME"];
const PASSWORD_ENV: &[&str] = &["LASTFM_PASSWORD"];
const SESSION_KEY_ENV: &[&str] = &["LASTFM_SESSION_KEY"];

/// Configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Last.fm API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Last.fm API shared secret
    #[serde(default)]
    pub api_secret: Option<String>,

    /// Account name, used with `password` when no session key is configured
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Pre-authorized session key (skips the mobile session handshake)
    #[serde(default)]
    pub session_key: Option<String>,

    /// API root; defaults to Last.fm (set e.g. `https://libre.fm/2.0/` for Libre.fm)
    #[serde(default)]
    pub api_url: Option<String>,

    /// Directory holding the processed-files and failed-events logs
    #[serde(default)]
    pub logs_dir: Option<PathBuf>,

    /// Timestamp used for events missing one
    #[serde(default)]
    pub fallback_timestamp: Option<i64>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub throttle: ThrottleConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Request pacing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Base delay between submissions in seconds (jitter is added on top)
    #[serde(default)]
    pub base_delay_secs: Option<f64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Fallback timestamp with compiled default applied
    pub fn fallback_timestamp(&self) -> i64 {
        self.fallback_timestamp.unwrap_or(DEFAULT_FALLBACK_TIMESTAMP)
    }
}

/// How the client obtains a Last.fm session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAuth {
    /// Session key already authorized out of band
    SessionKey(String),
    /// Username and password exchanged for a session key at startup
    Password { username: String, password: String },
}

/// Resolved Last.fm credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub auth: SessionAuth,
}

/// Default configuration file path for the platform
///
/// `<config_dir>/scrobbler/config.toml` (e.g. `~/.config/scrobbler/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scrobbler").join("config.toml"))
}

/// Load TOML configuration
///
/// Missing file yields defaults with a warning; an unreadable or malformed file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using defaults and environment",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve Last.fm credentials
///
/// **Priority:** ENV → TOML, per field. API key and secret are required, plus either
/// a session key or a username/password pair. A session key wins over a password pair.
pub fn resolve_credentials(toml_config: &TomlConfig) -> Result<Credentials> {
    let api_key = resolve_field("API key", API_KEY_ENV, toml_config.api_key.as_deref());
    let api_secret = resolve_field("API secret", API_SECRET_ENV, toml_config.api_secret.as_deref());
    let session_key = resolve_field(
        "session key",
        SESSION_KEY_ENV,
        toml_config.session_key.as_deref(),
    );
    let username = resolve_field("username", USERNAME_ENV, toml_config.username.as_deref());
    let password = resolve_field("password", PASSWORD_ENV, toml_config.password.as_deref());

    let (api_key, api_secret) = match (api_key, api_secret) {
        (Some(key), Some(secret)) => (key, secret),
        _ => {
            return Err(Error::Config(
                "Last.fm API credentials not configured. Set LASTFM_API_KEY and \
                 LASTFM_API_SECRET, or api_key/api_secret in the TOML config."
                    .to_string(),
            ))
        }
    };

    let auth = match (session_key, username, password) {
        (Some(key), _, _) => SessionAuth::SessionKey(key),
        (None, Some(username), Some(password)) => SessionAuth::Password { username, password },
        _ => {
            return Err(Error::Config(
                "No Last.fm session configured. Set LASTFM_SESSION_KEY, or both \
                 LASTFM_USERNAME and LASTFM_PASSWORD."
                    .to_string(),
            ))
        }
    };

    Ok(Credentials {
        api_key,
        api_secret,
        auth,
    })
}

/// Resolve the logs directory
///
/// **Priority:** CLI → ENV → TOML → `<data_local_dir>/scrobbler/logs`
pub fn resolve_logs_dir(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Some(path) = env_value(&[LOGS_DIR_ENV]) {
        return PathBuf::from(path);
    }

    if let Some(path) = &toml_config.logs_dir {
        return path.clone();
    }

    default_logs_dir()
}

/// OS-dependent default logs directory
fn default_logs_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("scrobbler").join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

/// Validate a credential value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

fn env_value(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| is_valid_key(value))
}

fn resolve_field(label: &str, env_names: &[&str], toml_value: Option<&str>) -> Option<String> {
    let env = env_value(env_names);
    let toml = toml_value.filter(|v| is_valid_key(v));

    if env.is_some() && toml.is_some() {
        warn!(
            "Last.fm {} found in both environment and TOML. Using environment.",
            label
        );
    }

    env.or_else(|| toml.map(str::to_string))
}
