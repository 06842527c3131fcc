use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

use super::{RedisBackend, StoreBackend, StoreError, StoreOptions};
use crate::config::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreState {
    NotReady,
    Ready,
    Error(String),
    Closed,
}

/// Invoked synchronously, on the task that caused the transition.
pub type StoreObserver = Arc<dyn Fn(&StoreState) + Send + Sync>;

struct Inner {
    backend: Arc<dyn StoreBackend>,
    state: watch::Sender<StoreState>,
    observers: Mutex<Vec<StoreObserver>>,
    lost: Notify,
    started: AtomicBool,
    reconnect_delay: Duration,
    max_reconnect_delay: Duration,
}

impl Inner {
    fn current(&self) -> StoreState {
        self.state.borrow().clone()
    }

    /// Applies `next` when `allowed` accepts the current state, then notifies
    /// observers. Repeating a state is ignored except for `Error`, which is
    /// reported once per failure. Nothing leaves `Closed`.
    fn transition_if(&self, next: StoreState, allowed: impl Fn(&StoreState) -> bool) -> bool {
        let repeatable = matches!(next, StoreState::Error(_));
        let changed = self.state.send_if_modified(|current| {
            if *current == StoreState::Closed || (*current == next && !repeatable) || !allowed(current) {
                return false;
            }
            *current = next.clone();
            true
        });

        if changed {
            let observers = self
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for observer in observers {
                observer(&next);
            }
        }
        changed
    }

    fn transition(&self, next: StoreState) -> bool {
        self.transition_if(next, |_| true)
    }

    /// A command hit a transport failure. Only the first failure after a
    /// successful connect wakes the supervisor.
    fn mark_lost(&self, reason: String) {
        let was_ready = self.transition_if(StoreState::Error(reason.clone()), |current| *current == StoreState::Ready);
        if was_ready {
            warn!("Store connection lost: {}", reason);
            self.lost.notify_one();
        }
    }

    fn is_closed(&self) -> bool {
        *self.state.borrow() == StoreState::Closed
    }
}

/// Shared handle to the store. Cloning is cheap and every clone talks through
/// the same underlying connection.
#[derive(Clone)]
pub struct StoreConnection {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConnection")
            .field("endpoint", &self.inner.backend.endpoint())
            .field("state", &self.inner.current())
            .finish()
    }
}

impl StoreConnection {
    /// Validates `options`, registers `observers` and starts connecting to
    /// Redis in the background. Never fails because the store is unreachable;
    /// that only shows up through the observers.
    pub fn connect(
        options: &StoreOptions,
        observers: impl IntoIterator<Item = StoreObserver>,
    ) -> Result<Self, ConfigurationError> {
        let options = StoreOptions::new(options.host.clone(), options.port)?
            .with_reconnect_delay(options.reconnect_delay, options.max_reconnect_delay);
        let backend = Arc::new(RedisBackend::new(&options)?);
        Ok(Self::with_backend(backend, &options, observers))
    }

    /// Same as [`StoreConnection::connect`] over an arbitrary backend. Must be
    /// called from within a tokio runtime.
    pub fn with_backend(
        backend: Arc<dyn StoreBackend>,
        options: &StoreOptions,
        observers: impl IntoIterator<Item = StoreObserver>,
    ) -> Self {
        let connection = Self::new(backend, options);
        for observer in observers {
            connection.observe(observer);
        }
        connection.start();
        connection
    }

    /// Builds an idle connection; nothing happens until [`StoreConnection::start`].
    pub fn new(backend: Arc<dyn StoreBackend>, options: &StoreOptions) -> Self {
        let (state, _) = watch::channel(StoreState::NotReady);
        Self {
            inner: Arc::new(Inner {
                backend,
                state,
                observers: Mutex::new(Vec::new()),
                lost: Notify::new(),
                started: AtomicBool::new(false),
                reconnect_delay: options.reconnect_delay,
                max_reconnect_delay: options.max_reconnect_delay,
            }),
        }
    }

    pub fn observe(&self, observer: StoreObserver) {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn on_ready(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.observe(Arc::new(move |state| {
            if *state == StoreState::Ready {
                callback();
            }
        }));
    }

    pub fn on_error(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.observe(Arc::new(move |state| {
            if let StoreState::Error(reason) = state {
                callback(reason);
            }
        }));
    }

    /// Spawns the supervisor. Subsequent calls are no-ops.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        tokio::spawn(supervise(Arc::clone(&self.inner)));
    }

    pub fn state(&self) -> StoreState {
        self.inner.current()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == StoreState::Ready
    }

    pub fn endpoint(&self) -> String {
        self.inner.backend.endpoint()
    }

    /// Resolves once the connection is ready; fails if it gets closed first.
    pub async fn wait_ready(&self) -> Result<(), StoreError> {
        let mut states = self.inner.state.subscribe();
        loop {
            match &*states.borrow_and_update() {
                StoreState::Ready => return Ok(()),
                StoreState::Closed => return Err(StoreError::Unavailable),
                _ => {}
            }
            states.changed().await.map_err(|_| StoreError::Unavailable)?;
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_ready()?;
        self.inner.backend.get(key).await.map_err(|e| self.fail(e))
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.ensure_ready()?;
        self.inner.backend.set_ex(key, value, ttl_secs).await.map_err(|e| self.fail(e))
    }

    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.ensure_ready()?;
        self.inner.backend.delete(key).await.map_err(|e| self.fail(e))
    }

    /// Final transition. Stops reconnecting and releases the backend.
    pub async fn close(&self) {
        if self.inner.transition(StoreState::Closed) {
            info!("Closing store connection to {}", self.endpoint());
        }
        self.inner.lost.notify_one();
        self.inner.backend.close().await;
    }

    fn ensure_ready(&self) -> Result<(), StoreError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    fn fail(&self, err: StoreError) -> StoreError {
        match err {
            StoreError::Transport(reason) => {
                self.inner.mark_lost(reason);
                StoreError::Unavailable
            }
            other => other,
        }
    }
}

async fn supervise(inner: Arc<Inner>) {
    let mut delay = inner.reconnect_delay;
    loop {
        if inner.is_closed() {
            break;
        }

        match inner.backend.connect().await {
            Ok(()) if inner.is_closed() => break,
            Ok(()) => {
                delay = inner.reconnect_delay;
                if inner.transition(StoreState::Ready) {
                    info!("Connected to store on {}", inner.backend.endpoint());
                }
                inner.lost.notified().await;
            }
            Err(err) => {
                inner.transition(StoreState::Error(err.to_string()));
                debug!("Reconnecting to store in {:?}", delay);
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(inner.max_reconnect_delay);
            }
        }
    }
    // A connect that finished after close() must not outlive it.
    inner.backend.close().await;
    debug!("Store supervisor for {} stopped", inner.backend.endpoint());
}
