//! Process settings read from the environment (and `.env` when present).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/flipside";
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub body_limit_bytes: usize,
    /// Apply the catalog DDL at startup.
    pub run_migrations: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            host: "127.0.0.1".into(),
            port: 8000,
            db_max_connections: 5,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            run_migrations: true,
        }
    }
}

impl Settings {
    /// Load `.env` (if any) then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or empty keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();
        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            host: get("APP_HOST").unwrap_or(defaults.host),
            port: parse_or("APP_PORT", get("APP_PORT"), defaults.port)?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), defaults.db_max_connections)?,
            body_limit_bytes: parse_or("BODY_LIMIT_BYTES", get("BODY_LIMIT_BYTES"), defaults.body_limit_bytes)?,
            run_migrations: match get("RUN_MIGRATIONS") {
                Some(v) => parse_flag("RUN_MIGRATIONS", &v)?,
                None => defaults.run_migrations,
            },
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Settings(format!("APP_HOST/APP_PORT: {}", e)))
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v
            .parse()
            .map_err(|e| ConfigError::Settings(format!("{}='{}': {}", key, v, e))),
        None => Ok(default),
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Settings(format!("{}='{}': expected a boolean", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(from_pairs(&[]).unwrap(), Settings::default());
    }

    #[test]
    fn reads_every_key() {
        let s = from_pairs(&[
            ("DATABASE_URL", "postgres://db/flip"),
            ("APP_HOST", "0.0.0.0"),
            ("APP_PORT", "9000"),
            ("DB_MAX_CONNECTIONS", "12"),
            ("BODY_LIMIT_BYTES", "2048"),
            ("RUN_MIGRATIONS", "off"),
        ])
        .unwrap();
        assert_eq!(s.database_url, "postgres://db/flip");
        assert_eq!(s.bind_addr().unwrap().to_string(), "0.0.0.0:9000");
        assert_eq!(s.db_max_connections, 12);
        assert_eq!(s.body_limit_bytes, 2048);
        assert!(!s.run_migrations);
    }

    #[test]
    fn bad_numbers_and_flags_are_errors() {
        assert!(matches!(from_pairs(&[("APP_PORT", "eighty")]), Err(ConfigError::Settings(_))));
        assert!(matches!(from_pairs(&[("RUN_MIGRATIONS", "maybe")]), Err(ConfigError::Settings(_))));
    }

    #[test]
    fn blank_values_fall_back() {
        let s = from_pairs(&[("APP_PORT", "  ")]).unwrap();
        assert_eq!(s.port, 8000);
    }
}
