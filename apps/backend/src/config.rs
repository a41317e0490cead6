//! Service configuration read from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use reader_core::PracticeSettings;

use crate::error::{ApiError, Result};

/// Everything the service needs at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. Without it the in-memory store is used.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    /// Shared bearer token expected from the transport.
    pub api_token: String,
    pub content_dir: PathBuf,
    pub tts_cache_dir: PathBuf,
    pub pet_types: Vec<String>,
    pub rng_seed: Option<u64>,
    pub practice: PracticeSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_token: String::new(),
            content_dir: PathBuf::from("content/levels"),
            tts_cache_dir: PathBuf::from("data/tts_cache"),
            pet_types: vec!["panda".to_string(), "cat".to_string(), "dog".to_string()],
            rng_seed: None,
            practice: PracticeSettings::default(),
        }
    }
}

impl Config {
    /// Build from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_token = var("API_TOKEN")
            .ok_or_else(|| ApiError::Internal("API_TOKEN must be set".to_string()))?;

        let mut practice = defaults.practice.clone();
        practice.session_size = parse_or(var("SESSION_SIZE"), "SESSION_SIZE", practice.session_size)?;
        practice.revival_size = parse_or(var("REVIVAL_SIZE"), "REVIVAL_SIZE", practice.revival_size)?;
        practice.max_attempts = parse_or(var("MAX_ATTEMPTS"), "MAX_ATTEMPTS", practice.max_attempts)?;
        practice.sessions_per_day =
            parse_or(var("SESSIONS_PER_DAY"), "SESSIONS_PER_DAY", practice.sessions_per_day)?;
        practice.daily_reset_hour =
            parse_or(var("DAILY_RESET_HOUR"), "DAILY_RESET_HOUR", practice.daily_reset_hour)?;
        practice.match_threshold =
            parse_or(var("MATCH_THRESHOLD"), "MATCH_THRESHOLD", practice.match_threshold)?;
        if let Some(gates) = var("CARE_GATES") {
            practice.care_gates = parse_list(&gates, "CARE_GATES")?;
        }

        if practice.daily_reset_hour > 23 {
            return Err(ApiError::Internal(
                "DAILY_RESET_HOUR must be between 0 and 23".to_string(),
            ));
        }
        if practice.match_threshold > 100 {
            return Err(ApiError::Internal(
                "MATCH_THRESHOLD must be between 0 and 100".to_string(),
            ));
        }

        let pet_types = match var("PET_TYPES") {
            Some(raw) => raw
                .split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            None => defaults.pet_types,
        };

        Ok(Self {
            database_url: var("DATABASE_URL"),
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_or(var("PORT"), "PORT", defaults.port)?,
            api_token,
            content_dir: var("CONTENT_DIR").map(PathBuf::from).unwrap_or(defaults.content_dir),
            tts_cache_dir: var("TTS_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.tts_cache_dir),
            pet_types,
            rng_seed: var("RNG_SEED")
                .map(|v| parse_value(&v, "RNG_SEED"))
                .transpose()?,
            practice,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Pet type given to new users.
    pub fn default_pet_type(&self) -> &str {
        self.pet_types.first().map(String::as_str).unwrap_or("panda")
    }
}

fn parse_value<T: FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| ApiError::Internal(format!("invalid value for {key}: {raw}")))
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        Some(v) => parse_value(&v, key),
        None => Ok(default),
    }
}

fn parse_list<T: FromStr>(raw: &str, key: &str) -> Result<Vec<T>> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| parse_value(v, key))
        .collect()
}
