//! Configuration loading and representation.
//!
//! Everything comes from the process environment:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `BIND_ADDR` | `0.0.0.0:8080` | HTTP listen address |
//! | `USE_PERSISTENT_STORES` | `false` | Postgres (`true`) or in-memory store |
//! | `DATABASE_URL` | none | Required when persistent |
//! | `DATABASE_MAX_CONNECTIONS` | `5` | Pool size |
//! | `MAX_WRITE_ATTEMPTS` | `3` | Compare-and-swap rounds before giving up |

use std::net::SocketAddr;

use thiserror::Error;

use crate::record_service::DEFAULT_MAX_WRITE_ATTEMPTS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

/// Where inventory records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreConfig,
    pub max_write_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            store: StoreConfig::InMemory,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.bind_addr,
        };

        let persistent = match lookup("USE_PERSISTENT_STORES") {
            Some(raw) => parse_flag("USE_PERSISTENT_STORES", &raw)?,
            None => false,
        };

        let store = if persistent {
            let database_url = lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
                Some(raw) => parse_positive("DATABASE_MAX_CONNECTIONS", &raw)?,
                None => 5,
            };
            StoreConfig::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StoreConfig::InMemory
        };

        let max_write_attempts = match lookup("MAX_WRITE_ATTEMPTS") {
            Some(raw) => parse_positive("MAX_WRITE_ATTEMPTS", &raw)?,
            None => defaults.max_write_attempts,
        };

        Ok(Self {
            bind_addr,
            store,
            max_write_attempts,
        })
    }
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(v) if v >= 1 => Ok(v),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
            reason: "expected a positive integer".to_string(),
        }),
    }
}
