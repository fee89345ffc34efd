//! Centralized configuration (environment variables + defaults).

use crate::domain::{Position, FALLBACK_POSITION};
use anyhow::{anyhow, Context};
use chrono::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// `postgres://...` or `sqlite:...`
    pub database_url: String,
    pub port: u16,
    /// development | staging | production
    pub environment: String,
    pub jwt_secret: String,
    pub admin_username: String,
    pub admin_password: String,
    pub admin_token_ttl: Duration,
    pub user_token_ttl: Duration,
    /// Allowed CORS origin; any origin when unset.
    pub frontend_url: Option<String>,
    pub db_max_connections: u32,
    /// Insert the demo stall into an empty directory at startup.
    pub seed_sample_data: bool,
    /// Position shown for stalls without coordinates.
    pub fallback_position: Position,
}

impl Config {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let environment = var("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        // Secrets must be set outside development; dev gets a placeholder.
        let secret = |name: &str| -> anyhow::Result<String> {
            match var(name) {
                Some(v) => Ok(v),
                None if environment == "development" => Ok(format!("dev-{}-not-for-production", name)),
                None => Err(anyhow!("{} must be set in {} environment", name, environment)),
            }
        };

        let admin_ttl_hours: i64 = parse_or(var("ADMIN_TOKEN_TTL_HOURS"), "ADMIN_TOKEN_TTL_HOURS", 2)?;
        let user_ttl_days: i64 = parse_or(var("USER_TOKEN_TTL_DAYS"), "USER_TOKEN_TTL_DAYS", 7)?;
        if admin_ttl_hours <= 0 || user_ttl_days <= 0 {
            return Err(anyhow!("token lifetimes must be positive"));
        }

        Ok(Self {
            database_url: var("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set"))?,
            port: parse_or(var("PORT"), "PORT", 5000)?,
            jwt_secret: secret("JWT_SECRET")?,
            admin_username: var("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            admin_password: secret("ADMIN_PASSWORD")?,
            admin_token_ttl: Duration::hours(admin_ttl_hours),
            user_token_ttl: Duration::days(user_ttl_days),
            frontend_url: var("FRONTEND_URL"),
            db_max_connections: parse_or::<u32>(var("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 5)?.max(1),
            seed_sample_data: parse_or(var("SEED_SAMPLE_DATA"), "SEED_SAMPLE_DATA", false)?,
            fallback_position: Position {
                latitude: parse_or(var("FALLBACK_LATITUDE"), "FALLBACK_LATITUDE", FALLBACK_POSITION.latitude)?,
                longitude: parse_or(
                    var("FALLBACK_LONGITUDE"),
                    "FALLBACK_LONGITUDE",
                    FALLBACK_POSITION.longitude,
                )?,
            },
            environment,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value '{}'", name, v)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn development_defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:")])).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.admin_username, "admin");
        assert_eq!(config.admin_token_ttl, Duration::hours(2));
        assert_eq!(config.user_token_ttl, Duration::days(7));
        assert_eq!(config.fallback_position, FALLBACK_POSITION);
        assert!(config.jwt_secret.starts_with("dev-"));
        assert!(!config.seed_sample_data);
        assert!(config.is_development());
    }

    #[test]
    fn production_requires_secrets() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/durian"),
            ("ENVIRONMENT", "production"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/durian"),
            ("ENVIRONMENT", "production"),
            ("JWT_SECRET", "s3cret"),
            ("ADMIN_PASSWORD", "hunter22"),
            ("ADMIN_TOKEN_TTL_HOURS", "1"),
            ("USER_TOKEN_TTL_DAYS", "30"),
            ("SEED_SAMPLE_DATA", "true"),
        ]))
        .unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.admin_token_ttl, Duration::hours(1));
        assert_eq!(config.user_token_ttl, Duration::days(30));
        assert!(config.seed_sample_data);
    }

    #[test]
    fn missing_database_url_and_bad_numbers_fail() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("PORT", "eighty"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("USER_TOKEN_TTL_DAYS", "0"),
        ]))
        .is_err());
    }
}
