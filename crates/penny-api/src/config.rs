use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: String,
    pub jwt_secret: String,
    pub auth_clock_skew: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("jwt_secret", &"[REDACTED]")
            .field("auth_clock_skew", &self.auth_clock_skew)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "PENNY_API_BIND_ADDR", "127.0.0.1:8080");
        let database_path = value_or_default(&lookup, "PENNY_API_DATABASE_PATH", "penny-api.db");

        let jwt_secret = required_trimmed(&lookup, "PENNY_API_JWT_SECRET")?;
        if jwt_secret.len() < 16 {
            return Err(ConfigError::Invalid(
                "PENNY_API_JWT_SECRET must be at least 16 characters".to_string(),
            ));
        }

        let auth_clock_skew_secs = value_or_default(&lookup, "AUTH_CLOCK_SKEW_SECS", "60")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "AUTH_CLOCK_SKEW_SECS must be an integer in [0, 300]".to_string(),
                )
            })?;
        if auth_clock_skew_secs > 300 {
            return Err(ConfigError::Invalid(
                "AUTH_CLOCK_SKEW_SECS must be in [0, 300]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            database_path,
            jwt_secret,
            auth_clock_skew: Duration::from_secs(auth_clock_skew_secs),
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn config_requires_a_jwt_secret() {
        let map: HashMap<&str, &str> = HashMap::new();
        let err = AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("PENNY_API_JWT_SECRET"));
    }

    #[test]
    fn config_rejects_a_short_jwt_secret() {
        let mut map = HashMap::new();
        map.insert("PENNY_API_JWT_SECRET", "too-short");
        let err = AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("at least 16"));
    }

    #[test]
    fn config_applies_defaults_and_redacts_the_secret() {
        let mut map = HashMap::new();
        map.insert("PENNY_API_JWT_SECRET", "sensitive-signing-secret");

        let config =
            AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string())).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.database_path, "penny-api.db");
        assert_eq!(config.auth_clock_skew, Duration::from_secs(60));

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-signing-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn config_bounds_the_clock_skew() {
        let mut map = HashMap::new();
        map.insert("PENNY_API_JWT_SECRET", "sensitive-signing-secret");
        map.insert("AUTH_CLOCK_SKEW_SECS", "301");

        let err = AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("[0, 300]"));
    }
}
