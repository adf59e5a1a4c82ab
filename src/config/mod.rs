//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;

use uuid::Uuid;

use crate::game::GameMode;

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Headless host configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,

    /// REST backend base URL; loadout and stats calls are skipped when unset
    pub backend_url: Option<String>,
    /// Bearer credential for the backend
    pub backend_token: Option<String>,

    pub game_mode: GameMode,
    /// Realtime match to join
    pub match_id: Option<Uuid>,
    pub player_id: Uuid,
    /// Seed for spread, spawn order and AI
    pub sim_seed: u64,
    /// Hard cap on session length
    pub session_secs: u64,
    /// Max local pose broadcasts per second
    pub pose_send_hz: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; `from_env` uses the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let log_format = match var("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        Ok(Self {
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,

            backend_url: var("BACKEND_URL").map(|url| url.trim_end_matches('/').to_string()),
            backend_token: var("BACKEND_TOKEN"),

            game_mode: parse_or(var("GAME_MODE"), "GAME_MODE", GameMode::Waves)?,
            match_id: var("MATCH_ID")
                .map(|v| v.trim().parse().map_err(|_| ConfigError::Invalid("MATCH_ID")))
                .transpose()?,
            player_id: var("PLAYER_ID")
                .map(|v| v.trim().parse().map_err(|_| ConfigError::Invalid("PLAYER_ID")))
                .transpose()?
                .unwrap_or_else(Uuid::new_v4),
            sim_seed: var("SIM_SEED")
                .map(|v| v.trim().parse().map_err(|_| ConfigError::Invalid("SIM_SEED")))
                .transpose()?
                .unwrap_or_else(rand::random),
            session_secs: parse_or(var("SESSION_SECS"), "SESSION_SECS", 300)?,
            pose_send_hz: parse_or(var("POSE_SEND_HZ"), "POSE_SEND_HZ", 20)?,
        })
    }
}

fn parse_or<T: FromStr>(
    value: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
