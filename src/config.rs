//! Configuration for the identity core
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)
//!
//! Every knob has a default so the core runs unconfigured in tests.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub flow: FlowSettings,
    pub session: SessionSettings,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        Ok(Settings {
            flow: FlowSettings::from_env()?,
            session: SessionSettings::from_env()?,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            flow: FlowSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

/// Verification flow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSettings {
    /// Length of the numeric verification code
    pub code_length: usize,
    /// Time-to-live of a pending flow, in seconds
    pub ttl_secs: i64,
}

impl FlowSettings {
    pub fn from_env() -> Result<Self> {
        Ok(FlowSettings {
            code_length: read_env("AUTH_CODE_LENGTH", 6)?,
            ttl_secs: read_env("AUTH_FLOW_TTL_SECS", 300)?,
        })
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        FlowSettings {
            code_length: 6,
            ttl_secs: 300,
        }
    }
}

/// Session lifetime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Session lifetime, in seconds
    pub ttl_secs: i64,
}

impl SessionSettings {
    pub fn from_env() -> Result<Self> {
        Ok(SessionSettings {
            // 30 days, matching the session expiry the identity store issues
            ttl_secs: read_env("AUTH_SESSION_TTL_SECS", 30 * 24 * 60 * 60)?,
        })
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            ttl_secs: 30 * 24 * 60 * 60,
        }
    }
}

fn read_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}")),
        Err(_) => Ok(default),
    }
}
