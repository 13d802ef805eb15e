use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default access token validity (1 hour).
pub const DEFAULT_ACCESS_TOKEN_VALIDITY_SECONDS: f64 = 3600.0;

/// Default signing key update interval (24 hours).
pub const DEFAULT_SIGNING_KEY_UPDATE_INTERVAL_SECONDS: f64 = 86_400.0;

/// Upper bound on the default background rotation check interval.
pub const MAX_DEFAULT_ROTATION_CHECK_INTERVAL_SECONDS: f64 = 60.0;

#[derive(Clone)]
pub struct Config {
    /// How long an issued access token stays valid.
    pub access_token_validity: Duration,
    /// How long a signing key signs new tokens before it is replaced.
    pub signing_key_update_interval: Duration,
    /// How long the immediately previous key keeps verifying tokens after
    /// its successor was created.
    pub previous_key_retention: Duration,
    pub enable_anti_csrf: bool,
    /// Tick of the background rotation task.
    pub key_rotation_check_interval: Duration,
    /// Only required by the `signing-key-rotator` binary.
    pub database_url: Option<String>,
    pub metrics_bind_address: Option<String>,
}

/// Custom Debug implementation that redacts the database URL, which may
/// carry a password.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("access_token_validity", &self.access_token_validity)
            .field("signing_key_update_interval", &self.signing_key_update_interval)
            .field("previous_key_retention", &self.previous_key_retention)
            .field("enable_anti_csrf", &self.enable_anti_csrf)
            .field("key_rotation_check_interval", &self.key_rotation_check_interval)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("metrics_bind_address", &self.metrics_bind_address)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Default for Config {
    fn default() -> Self {
        let access_token_validity = Duration::from_secs_f64(DEFAULT_ACCESS_TOKEN_VALIDITY_SECONDS);
        let signing_key_update_interval =
            Duration::from_secs_f64(DEFAULT_SIGNING_KEY_UPDATE_INTERVAL_SECONDS);

        Config {
            access_token_validity,
            signing_key_update_interval,
            previous_key_retention: access_token_validity,
            enable_anti_csrf: false,
            key_rotation_check_interval: default_check_interval(signing_key_update_interval),
            database_url: None,
            metrics_bind_address: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let access_token_validity = parse_seconds(
            vars,
            "ACCESS_TOKEN_VALIDITY_SECONDS",
            DEFAULT_ACCESS_TOKEN_VALIDITY_SECONDS,
            false,
        )?;

        let signing_key_update_interval = parse_seconds(
            vars,
            "ACCESS_TOKEN_SIGNING_KEY_UPDATE_INTERVAL_SECONDS",
            DEFAULT_SIGNING_KEY_UPDATE_INTERVAL_SECONDS,
            false,
        )?;

        // Retention defaults to the validity window so every token signed by
        // the previous key can still be verified until it expires.
        let previous_key_retention = parse_seconds(
            vars,
            "PREVIOUS_SIGNING_KEY_RETENTION_SECONDS",
            access_token_validity.as_secs_f64(),
            true,
        )?;

        let key_rotation_check_interval = parse_seconds(
            vars,
            "KEY_ROTATION_CHECK_INTERVAL_SECONDS",
            default_check_interval(signing_key_update_interval).as_secs_f64(),
            false,
        )?;

        let enable_anti_csrf = match vars.get("ENABLE_ANTI_CSRF").map(|v| v.trim()) {
            None => false,
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            Some(v) => {
                return Err(ConfigError::InvalidValue {
                    name: "ENABLE_ANTI_CSRF".to_string(),
                    reason: format!("expected true or false, got '{}'", v),
                })
            }
        };

        Ok(Config {
            access_token_validity,
            signing_key_update_interval,
            previous_key_retention,
            enable_anti_csrf,
            key_rotation_check_interval,
            database_url: vars.get("DATABASE_URL").cloned(),
            metrics_bind_address: vars.get("METRICS_BIND_ADDRESS").cloned(),
        })
    }

    /// The database URL, or an error naming the missing variable.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}

fn default_check_interval(update_interval: Duration) -> Duration {
    update_interval.min(Duration::from_secs_f64(
        MAX_DEFAULT_ROTATION_CHECK_INTERVAL_SECONDS,
    ))
}

/// Parse a float number of seconds. Sub-second values are accepted.
fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: f64,
    allow_zero: bool,
) -> Result<Duration, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        name: name.to_string(),
        reason,
    };

    let seconds = match vars.get(name) {
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|e| invalid(format!("'{}' is not a number: {}", raw, e)))?,
        None => default,
    };

    if !seconds.is_finite() {
        return Err(invalid("must be finite".to_string()));
    }
    if seconds < 0.0 || (!allow_zero && seconds == 0.0) {
        return Err(invalid(format!("must be positive, got {}", seconds)));
    }

    Duration::try_from_secs_f64(seconds).map_err(|e| invalid(e.to_string()))
}
