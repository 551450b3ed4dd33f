//! Session store configuration via environment variables.

use std::env;
use std::time::Duration;

use crate::error::SessionError;
use crate::hash_key::SEPARATOR;

/// One year.
pub const MAX_SESSION_TIMEOUT_MINUTES: i64 = 365 * 24 * 60;

/// Store configuration, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Config {
    pub application_name: String,
    pub table_name: String,
    pub session_id_cookie_name: String,
    pub session_timeout_minutes: i64,
    pub session_id_attribute_name: String,
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
    pub session_secret: String,
    pub encrypt_sessions: bool,
    pub always_save: bool,
    pub https_only: bool,
    pub session_backend: String,
    pub dynamodb_endpoint: String,
    pub table_poll_interval: Duration,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required: `SESSION_APPLICATION_NAME`. Everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());
        let flag_or = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v == "true" || v == "1" || v == "True")
                .unwrap_or(default)
        };

        let config = Self {
            application_name: lookup("SESSION_APPLICATION_NAME")
                .ok_or_else(|| ConfigError::MissingEnv("SESSION_APPLICATION_NAME".into()))?,
            table_name: string_or("SESSION_TABLE_NAME", "NancySessions"),
            session_id_cookie_name: string_or("SESSION_COOKIE_NAME", "__sid__"),
            session_timeout_minutes: parsed(&lookup, "SESSION_TIMEOUT_MINUTES", 30)?,
            session_id_attribute_name: string_or("SESSION_ID_ATTRIBUTE_NAME", "SessionId"),
            read_capacity_units: parsed(&lookup, "SESSION_READ_CAPACITY_UNITS", 10)?,
            write_capacity_units: parsed(&lookup, "SESSION_WRITE_CAPACITY_UNITS", 5)?,
            session_secret: string_or("SESSION_SECRET", "change-me-in-production"),
            encrypt_sessions: flag_or("SESSION_ENCRYPTED", true),
            always_save: flag_or("SESSION_ALWAYS_SAVE", false),
            https_only: flag_or("SESSION_HTTPS_ONLY", false),
            session_backend: string_or("SESSION_BACKEND", "memory"),
            dynamodb_endpoint: lookup("DYNAMODB_ENDPOINT").unwrap_or_default(),
            table_poll_interval: Duration::from_secs(parsed(
                &lookup,
                "TABLE_POLL_INTERVAL_SECS",
                5,
            )?),
            port: parsed(&lookup, "PORT", 3001)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the store relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_name.is_empty() {
            return Err(ConfigError::Invalid("table name must not be empty".into()));
        }
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid(
                "application name must not be empty".into(),
            ));
        }
        if self.application_name.contains(SEPARATOR) {
            return Err(ConfigError::Invalid(format!(
                "application name must not contain '{SEPARATOR}'"
            )));
        }
        if self.session_id_attribute_name.is_empty() {
            return Err(ConfigError::Invalid(
                "session id attribute name must not be empty".into(),
            ));
        }
        if self.session_timeout_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "session timeout must be positive".into(),
            ));
        }
        if self.session_timeout_minutes > MAX_SESSION_TIMEOUT_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "session timeout must not exceed {MAX_SESSION_TIMEOUT_MINUTES} minutes"
            )));
        }
        Ok(())
    }

    /// Server-side session lifetime.
    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_timeout_minutes)
    }
}

/// Configuration for testing; all fields settable directly.
impl Config {
    pub fn test_default() -> Self {
        Self {
            application_name: "app".into(),
            table_name: "NancySessions".into(),
            session_id_cookie_name: "__sid__".into(),
            session_timeout_minutes: 30,
            session_id_attribute_name: "SessionId".into(),
            read_capacity_units: 10,
            write_capacity_units: 5,
            session_secret: "test-secret-key".into(),
            encrypt_sessions: true,
            always_save: false,
            https_only: false,
            session_backend: "memory".into(),
            dynamodb_endpoint: String::new(),
            table_poll_interval: Duration::from_millis(1),
            port: 3001,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        SessionError::InvalidArgument(err.to_string())
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.into(),
            value,
        }),
        None => Ok(default),
    }
}
