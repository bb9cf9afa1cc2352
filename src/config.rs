// ==================== CONFIGURATION ====================
// Everything comes from the environment (a .env file is loaded first in main).

use std::env;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

/// Inclusive bounds for the profile age field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBounds {
    pub min: i32,
    pub max: i32,
}

impl AgeBounds {
    pub fn contains(&self, age: i32) -> bool {
        (self.min..=self.max).contains(&age)
    }
}

impl Default for AgeBounds {
    fn default() -> Self {
        Self { min: 10, max: 120 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub age_bounds: AgeBounds,
    pub feed_buffer: usize,
    pub cascade_max_attempts: u32,
    pub purge_sweep_interval_secs: u64,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_backend = match lookup("STORE_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("mongo") | Some("mongodb") => StoreBackend::Mongo,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid { name: "STORE_BACKEND", value: other.to_string() })
            }
        };

        let database_url = lookup("DATABASE_URL");
        if store_backend == StoreBackend::Mongo && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let age_bounds = AgeBounds {
            min: parse_or(&lookup, "PROFILE_AGE_MIN", 10)?,
            max: parse_or(&lookup, "PROFILE_AGE_MAX", 120)?,
        };
        if age_bounds.min > age_bounds.max {
            return Err(ConfigError::Invalid {
                name: "PROFILE_AGE_MAX",
                value: age_bounds.max.to_string(),
            });
        }

        let allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3002)?,
            store_backend,
            database_url,
            jwt_secret,
            age_bounds,
            feed_buffer: parse_or(&lookup, "FEED_BUFFER", 16usize)?.max(1),
            cascade_max_attempts: parse_or(&lookup, "CASCADE_MAX_ATTEMPTS", 3u32)?.max(1),
            // floor of 10s
            purge_sweep_interval_secs: parse_or(&lookup, "PURGE_SWEEP_INTERVAL_SECS", 300u64)?.max(10),
            allowed_origins,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
