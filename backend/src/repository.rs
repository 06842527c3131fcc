use shared::models::PollRecord;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::store::{StoreConnection, StoreError};

const KEY_PREFIX: &str = "polls";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepositoryError {
    #[error("store unavailable")]
    StoreUnavailable,
    #[error("poll {0} not found")]
    RecordNotFound(String),
    #[error("stored poll {0} could not be decoded")]
    Corrupt(String),
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable | StoreError::Transport(_) => RepositoryError::StoreUnavailable,
            StoreError::Command(msg) => RepositoryError::Store(msg),
        }
    }
}

/// Poll records in the external store, one JSON value per poll under
/// `polls:<id>`. Every write sets the TTL to the poll duration so a poll and
/// the credentials issued for it expire together.
///
/// `update_poll` is a plain read-modify-write. Two concurrent updates of the
/// same poll race and the last write wins; mutators should be merges that
/// tolerate being applied on top of someone else's write.
#[derive(Debug, Clone)]
pub struct PollRepository {
    store: StoreConnection,
    ttl_secs: u64,
}

pub fn poll_key(poll_id: &str) -> String {
    format!("{KEY_PREFIX}:{poll_id}")
}

impl PollRepository {
    pub fn new(store: StoreConnection, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    #[instrument(skip(self, record), fields(poll_id = %record.id))]
    pub async fn create_poll(&self, record: &PollRecord) -> Result<(), RepositoryError> {
        self.write(record).await?;
        info!("Created poll {}", record.id);
        Ok(())
    }

    pub async fn get_poll(&self, poll_id: &str) -> Result<PollRecord, RepositoryError> {
        let raw = self
            .store
            .get(&poll_key(poll_id))
            .await?
            .ok_or_else(|| RepositoryError::RecordNotFound(poll_id.to_string()))?;

        serde_json::from_str(&raw).map_err(|e| {
            debug!("Failed to decode poll {}: {}", poll_id, e);
            RepositoryError::Corrupt(poll_id.to_string())
        })
    }

    /// Applies `mutator` to the current record and writes it back. An update
    /// that changes nothing is not written and does not refresh the TTL.
    #[instrument(skip(self, mutator))]
    pub async fn update_poll<F>(&self, poll_id: &str, mutator: F) -> Result<PollRecord, RepositoryError>
    where
        F: FnOnce(&mut PollRecord),
    {
        let current = self.get_poll(poll_id).await?;
        let mut updated = current.clone();
        mutator(&mut updated);

        // The record is addressed by its key, never by what the mutator says.
        updated.id = current.id.clone();

        if updated != current {
            self.write(&updated).await?;
            debug!("Updated poll {}", poll_id);
        }
        Ok(updated)
    }

    pub async fn delete_poll(&self, poll_id: &str) -> Result<(), RepositoryError> {
        if self.store.delete(&poll_key(poll_id)).await? {
            info!("Deleted poll {}", poll_id);
            Ok(())
        } else {
            Err(RepositoryError::RecordNotFound(poll_id.to_string()))
        }
    }

    async fn write(&self, record: &PollRecord) -> Result<(), RepositoryError> {
        let value = serde_json::to_string(record)
            .map_err(|e| RepositoryError::Store(format!("failed to encode poll {}: {}", record.id, e)))?;
        self.store.set_ex(&poll_key(&record.id), &value, self.ttl_secs).await?;
        Ok(())
    }
}
