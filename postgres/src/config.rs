//! Connection pool configuration.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

/// Errors while reading [`PostgresConfig`] from the environment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `DATABASE_URL` is not set
    #[error("DATABASE_URL is not set")]
    MissingUrl,

    /// A numeric setting could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// Environment variable name
        key: &'static str,
        /// Raw value found
        value: String,
    },
}

/// Pool settings for [`PostgresRegistrationBackend`](crate::PostgresRegistrationBackend).
///
/// # Environment
///
/// | Variable | Default |
/// |----------|---------|
/// | `DATABASE_URL` | required |
/// | `DATABASE_MAX_CONNECTIONS` | 10 |
/// | `DATABASE_MIN_CONNECTIONS` | 2 |
/// | `DATABASE_ACQUIRE_TIMEOUT` (seconds) | 5 |
/// | `DATABASE_IDLE_TIMEOUT` (seconds) | 45 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    /// Connection string
    pub database_url: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// How long to wait for a free connection
    pub acquire_timeout: Duration,
    /// How long an idle connection is kept
    pub idle_timeout: Duration,
}

impl PostgresConfig {
    /// Config with default pool settings for `database_url`.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(45),
        }
    }

    /// Read settings from the process environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingUrl`] without `DATABASE_URL`;
    /// [`ConfigError::InvalidValue`] for unparsable numbers.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, e.g. a map in tests.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingUrl)?;
        let mut config = Self::new(database_url);

        if let Some(max) = parse(&lookup, "DATABASE_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(min) = parse(&lookup, "DATABASE_MIN_CONNECTIONS")? {
            config.min_connections = min;
        }
        if let Some(secs) = parse(&lookup, "DATABASE_ACQUIRE_TIMEOUT")? {
            config.acquire_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "DATABASE_IDLE_TIMEOUT")? {
            config.idle_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Open a pool with these settings.
    ///
    /// # Errors
    ///
    /// The `sqlx` error if no connection can be established.
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .connect(&self.database_url)
            .await
    }
}

fn parse<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key, value })
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = PostgresConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/fest")])).unwrap();
        assert_eq!(config, PostgresConfig::new("postgres://localhost/fest"));
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(45));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = PostgresConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/fest"),
            ("DATABASE_MAX_CONNECTIONS", "25"),
            ("DATABASE_ACQUIRE_TIMEOUT", " 2 "),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 25);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.acquire_timeout, Duration::from_secs(2));
    }

    #[test]
    fn missing_url_and_bad_numbers_are_errors() {
        assert_eq!(
            PostgresConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::MissingUrl
        );
        let err = PostgresConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/fest"),
            ("DATABASE_MIN_CONNECTIONS", "two"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "DATABASE_MIN_CONNECTIONS",
                value: "two".to_string()
            }
        );
    }
}
