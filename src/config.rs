use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::domain::location::DEFAULT_RETENTION_HOURS;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub auth_token_secret: String,
    pub payment_webhook_secret: String,
    pub location_retention_hours: i64,
    pub location_purge_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let location_retention_hours =
            parse_or(&lookup, "LOCATION_RETENTION_HOURS", DEFAULT_RETENTION_HOURS)?;
        if location_retention_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "LOCATION_RETENTION_HOURS",
                value: location_retention_hours.to_string(),
            });
        }
        let purge_secs: u64 = parse_or(
            &lookup,
            "LOCATION_PURGE_INTERVAL_SECS",
            DEFAULT_PURGE_INTERVAL_SECS,
        )?;
        if purge_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "LOCATION_PURGE_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            auth_token_secret: required("AUTH_TOKEN_SECRET")?,
            payment_webhook_secret: required("PAYMENT_WEBHOOK_SECRET")?,
            location_retention_hours,
            location_purge_interval: Duration::from_secs(purge_secs),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/farmconnect"),
        ("AUTH_TOKEN_SECRET", "token-secret"),
        ("PAYMENT_WEBHOOK_SECRET", "webhook-secret"),
    ];

    #[test]
    fn defaults_apply() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.location_retention_hours, 168);
        assert_eq!(config.location_purge_interval, Duration::from_secs(3600));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("HOST", "127.0.0.1"),
            ("PORT", "9090"),
            ("LOCATION_RETENTION_HOURS", "24"),
            ("LOCATION_PURGE_INTERVAL_SECS", "60"),
        ]);
        let config = load(&vars).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.location_retention_hours, 24);
        assert_eq!(config.location_purge_interval, Duration::from_secs(60));
    }

    #[test]
    fn missing_secret_is_reported() {
        let vars: Vec<_> = REQUIRED
            .into_iter()
            .filter(|(k, _)| *k != "AUTH_TOKEN_SECRET")
            .collect();
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing("AUTH_TOKEN_SECRET")
        );
    }

    #[test]
    fn bad_port_is_reported() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid {
                name: "PORT",
                value: "eighty".to_string()
            }
        );
    }

    #[test]
    fn zero_retention_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("LOCATION_RETENTION_HOURS", "0"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid {
                name: "LOCATION_RETENTION_HOURS",
                ..
            })
        ));
    }
}
