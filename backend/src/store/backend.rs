use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::{StoreError, StoreOptions};
use crate::config::{ConfigurationError, REDIS_HOST};

/// Wire-level access to a key-value store with per-key expiry.
///
/// Implementations report lost connectivity as [`StoreError::Transport`];
/// [`super::StoreConnection`] turns that into a state transition and a reconnect.
#[rocket::async_trait]
pub trait StoreBackend: Send + Sync + 'static {
    fn endpoint(&self) -> String;

    async fn connect(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn close(&self);
}

pub struct RedisBackend {
    client: redis::Client,
    endpoint: String,
    connect_timeout: Duration,
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl RedisBackend {
    pub fn new(options: &StoreOptions) -> Result<Self, ConfigurationError> {
        let client = redis::Client::open(options.url())
            .map_err(|e| ConfigurationError::invalid(REDIS_HOST, e.to_string()))?;

        Ok(Self {
            client,
            endpoint: options.endpoint(),
            connect_timeout: options.connect_timeout,
            connection: RwLock::new(None),
        })
    }

    async fn handle(&self) -> Result<MultiplexedConnection, StoreError> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(StoreError::Unavailable)
    }
}

fn classify(err: RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
        StoreError::Transport(err.to_string())
    } else {
        StoreError::Command(err.to_string())
    }
}

#[rocket::async_trait]
impl StoreBackend for RedisBackend {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn connect(&self) -> Result<(), StoreError> {
        let attempt = self.client.get_multiplexed_async_connection();
        let connection = match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => return Err(StoreError::Transport(e.to_string())),
            Err(_) => return Err(StoreError::Transport(format!("connecting to {} timed out", self.endpoint))),
        };
        *self.connection.write().await = Some(connection);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.handle().await?;
        conn.get::<_, Option<String>>(key).await.map_err(classify)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.handle().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await.map_err(classify)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.handle().await?;
        let removed = conn.del::<_, i64>(key).await.map_err(classify)?;
        Ok(removed > 0)
    }

    async fn close(&self) {
        self.connection.write().await.take();
    }
}

/// In-process store with the same expiry semantics as Redis. Reachability can
/// be toggled to simulate an outage.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    reachable: AtomicBool,
    connected: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            reachable: AtomicBool::new(true),
            connected: AtomicBool::new(false),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        let backend = Self::default();
        backend.reachable.store(false, Ordering::SeqCst);
        backend
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
        if !reachable {
            self.connected.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn check_connected(&self) -> Result<(), StoreError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("connection reset".into()));
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>>, StoreError> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Command(format!("memory store lock poisoned: {e}")))
    }
}

#[rocket::async_trait]
impl StoreBackend for MemoryBackend {
    fn endpoint(&self) -> String {
        "memory".into()
    }

    async fn connect(&self) -> Result<(), StoreError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("connection refused".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_connected()?;
        let mut entries = self.entries()?;
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.check_connected()?;
        if ttl_secs == 0 {
            return Err(StoreError::Command("invalid expire time in 'setex' command".into()));
        }
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries()?.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check_connected()?;
        let mut entries = self.entries()?;
        Ok(match entries.remove(key) {
            Some((_, expires_at)) => expires_at > Instant::now(),
            None => false,
        })
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
