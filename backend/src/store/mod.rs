//! The single process-wide connection to the external key-value store.
//!
//! [`StoreConnection`] owns the lifecycle (`NotReady -> Ready -> (Error <-> Ready) -> Closed`)
//! and serializes every repository call through one shared handle. The actual
//! wire protocol lives behind [`StoreBackend`]; production uses Redis.

pub mod backend;
pub mod connection;

pub use backend::{MemoryBackend, RedisBackend, StoreBackend};
pub use connection::{StoreConnection, StoreObserver, StoreState};

use std::time::Duration;
use thiserror::Error;

use crate::config::{AppConfig, ConfigurationError, REDIS_HOST, REDIS_PORT};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("store is not ready")]
    Unavailable,
    #[error("store transport error: {0}")]
    Transport(String),
    #[error("store command failed: {0}")]
    Command(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
}

impl StoreOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ConfigurationError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ConfigurationError::Missing(REDIS_HOST));
        }
        if port == 0 {
            return Err(ConfigurationError::invalid(REDIS_PORT, "port must be non-zero"));
        }

        Ok(Self {
            host,
            port,
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_millis(250),
            max_reconnect_delay: Duration::from_secs(10),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigurationError> {
        Self::new(config.redis_host.clone(), config.redis_port)
    }

    pub fn with_reconnect_delay(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_delay = initial;
        self.max_reconnect_delay = max.max(initial);
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}
