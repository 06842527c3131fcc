use std::str::FromStr;
use thiserror::Error;

pub const REDIS_HOST: &str = "REDIS_HOST";
pub const REDIS_PORT: &str = "REDIS_PORT";
pub const JWT_SECRET: &str = "JWT_SECRET";
pub const POLL_DURATION: &str = "POLL_DURATION";
pub const CLIENT_PORT: &str = "CLIENT_PORT";
pub const ALLOW_HEADER_TOKEN: &str = "ALLOW_HEADER_TOKEN";

/// Fatal startup problem. The server refuses to launch with any of these.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("setting {key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigurationError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigurationError::Invalid { key, reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub redis_host: String,
    pub redis_port: u16,
    pub jwt_secret: String,
    /// Seconds. Used both as credential lifetime and as store TTL for polls.
    pub poll_duration: u64,
    pub client_port: u16,
    pub allow_header_token: bool,
}

impl AppConfig {
    /// Reads every setting through `lookup` and validates all of them up front.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            redis_host: required(&lookup, REDIS_HOST)?,
            redis_port: parse(REDIS_PORT, &required(&lookup, REDIS_PORT)?)?,
            jwt_secret: required(&lookup, JWT_SECRET)?,
            poll_duration: parse(POLL_DURATION, &required(&lookup, POLL_DURATION)?)?,
            client_port: parse(CLIENT_PORT, &required(&lookup, CLIENT_PORT)?)?,
            allow_header_token: match lookup(ALLOW_HEADER_TOKEN) {
                Some(raw) => parse_flag(ALLOW_HEADER_TOKEN, &raw)?,
                None => true,
            },
        };

        if config.redis_port == 0 {
            return Err(ConfigurationError::invalid(REDIS_PORT, "port must be non-zero"));
        }
        if config.poll_duration == 0 {
            return Err(ConfigurationError::invalid(POLL_DURATION, "duration must be positive"));
        }

        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigurationError::Missing(key))
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigurationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigurationError::invalid(key, format!("{raw:?}: {e}")))
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigurationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigurationError::invalid(key, format!("{other:?} is not a boolean"))),
    }
}
