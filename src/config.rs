use std::{env, fmt::Display, net::SocketAddr, ops::RangeInclusive, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Longest accepted token lifetime, ten years.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;

/// Runtime settings, read from the environment (`.env` is loaded first).
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub token_ttl_hours: i64,
    pub db_max_connections: u32,
    pub admin_email: String,
    pub admin_password: String,
    pub seed_demo_data: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: parsed("BIND_ADDR", "0.0.0.0:3000")?,
            token_ttl_hours: bounded("TOKEN_TTL_HOURS", "720", 1..=MAX_TOKEN_TTL_HOURS)?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", "5")?,
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@grocery.com".into()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".into()),
            seed_demo_data: parsed("SEED_DEMO_DATA", "false")?,
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parsed<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(name).unwrap_or_else(|_| default.to_owned());
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn bounded<T>(name: &'static str, default: &str, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Display,
{
    let value: T = parsed(name, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let ttl: i64 = parsed("STOREFRONT_TEST_UNSET_TTL", "720").unwrap();
        assert_eq!(ttl, 720);
        let addr: SocketAddr = parsed("STOREFRONT_TEST_UNSET_ADDR", "0.0.0.0:3000").unwrap();
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn rejects_garbage() {
        let result: Result<bool, _> = parsed("STOREFRONT_TEST_UNSET_FLAG", "sometimes");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { name: "STOREFRONT_TEST_UNSET_FLAG", .. })
        ));
    }

    #[test]
    fn missing_required_value() {
        assert!(matches!(
            required("STOREFRONT_TEST_UNSET_REQUIRED"),
            Err(ConfigError::Missing("STOREFRONT_TEST_UNSET_REQUIRED"))
        ));
    }

    #[test]
    fn token_ttl_must_stay_in_range() {
        let ttl: i64 = bounded("STOREFRONT_TEST_UNSET_TTL", "720", 1..=MAX_TOKEN_TTL_HOURS).unwrap();
        assert_eq!(ttl, 720);

        for out_of_range in ["0", "-5", "9223372036854775807"] {
            let result: Result<i64, _> =
                bounded("STOREFRONT_TEST_UNSET_TTL", out_of_range, 1..=MAX_TOKEN_TTL_HOURS);
            assert!(matches!(
                result,
                Err(ConfigError::Invalid { name: "STOREFRONT_TEST_UNSET_TTL", .. })
            ));
        }
    }
}
