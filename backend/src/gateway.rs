//! Poll-scoped broadcast groups for admitted persistent connections.

use serde::Serialize;
use serde_json::Value;
use shared::models::PollRecord;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// All persistent poll traffic lives under this namespace.
pub const NAMESPACE: &str = "/polls";

pub const POLL_UPDATED: &str = "poll_updated";

/// One outbound frame: `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GatewayEvent {
    pub event: String,
    pub data: Value,
}

impl GatewayEvent {
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn poll_updated(poll: &PollRecord) -> Result<Self, serde_json::Error> {
        Self::new(POLL_UPDATED, poll)
    }
}

/// The gateway's view of one connection: an id, the participant behind it
/// and its outbound queue.
///
/// Once admitted, the gateway should hold the only handle, so that dropping
/// it from a group closes the transport's receiver.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub subject_id: Option<String>,
    outbound: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    /// Creates a handle plus the receiving end the transport drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (Self { id: Uuid::new_v4(), subject_id: None, outbound }, rx)
    }

    pub fn for_subject(subject_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (mut handle, rx) = Self::new();
        handle.subject_id = Some(subject_id.into());
        (handle, rx)
    }

    fn deliver(&self, frame: &str) -> bool {
        self.outbound.send(frame.to_string()).is_ok()
    }
}

#[derive(Debug, Default)]
struct Groups {
    by_poll: HashMap<String, Vec<ConnectionHandle>>,
    poll_of: HashMap<Uuid, String>,
}

impl Groups {
    fn detach(&mut self, id: Uuid) -> Option<String> {
        let poll_id = self.poll_of.remove(&id)?;
        if let Some(members) = self.by_poll.get_mut(&poll_id) {
            members.retain(|member| member.id != id);
            if members.is_empty() {
                self.by_poll.remove(&poll_id);
            }
        }
        Some(poll_id)
    }
}

#[derive(Debug, Default)]
pub struct BroadcastGateway {
    groups: Mutex<Groups>,
}

impl BroadcastGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn groups(&self) -> MutexGuard<'_, Groups> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `connection` to the group for `poll_id`, creating the group on
    /// first use. A connection belongs to at most one group.
    pub fn admit(&self, connection: ConnectionHandle, poll_id: &str) {
        let mut groups = self.groups();
        if let Some(previous) = groups.detach(connection.id) {
            debug!("Connection {} moved from poll {} to {}", connection.id, previous, poll_id);
        }
        groups.poll_of.insert(connection.id, poll_id.to_string());
        let members = groups.by_poll.entry(poll_id.to_string()).or_default();
        members.push(connection);
        debug!("Poll {} now has {} connection(s)", poll_id, members.len());
    }

    /// Removes a connection from whatever group holds it. Unknown ids are ignored.
    pub fn remove(&self, connection_id: Uuid) -> Option<String> {
        let poll_id = self.groups().detach(connection_id);
        if let Some(poll_id) = &poll_id {
            debug!("Connection {} left poll {}", connection_id, poll_id);
        }
        poll_id
    }

    /// Sends `event` to the members of `poll_id` as of this call, in admission
    /// order. Returns how many connections accepted it; closed ones are skipped.
    pub fn broadcast(&self, poll_id: &str, event: &GatewayEvent) -> usize {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode {} event for poll {}: {}", event.event, poll_id, e);
                return 0;
            }
        };

        let members = match self.groups().by_poll.get(poll_id) {
            Some(members) => members.clone(),
            None => return 0,
        };

        let delivered = members.iter().filter(|member| member.deliver(&frame)).count();
        if delivered < members.len() {
            debug!("Skipped {} closed connection(s) in poll {}", members.len() - delivered, poll_id);
        }
        delivered
    }

    pub fn group_size(&self, poll_id: &str) -> usize {
        self.groups().by_poll.get(poll_id).map_or(0, Vec::len)
    }

    /// Whether `subject_id` still has a live connection in the poll's group.
    pub fn has_subject(&self, poll_id: &str, subject_id: &str) -> bool {
        self.groups().by_poll.get(poll_id).is_some_and(|members| {
            members
                .iter()
                .any(|member| member.subject_id.as_deref() == Some(subject_id))
        })
    }

    pub fn contains(&self, connection_id: Uuid) -> bool {
        self.groups().poll_of.contains_key(&connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.groups().poll_of.len()
    }

    /// Drops every group along with the senders it holds, so each transport's
    /// receiver sees its channel close.
    pub fn clear(&self) {
        let mut groups = self.groups();
        let dropped = groups.poll_of.len();
        groups.by_poll.clear();
        groups.poll_of.clear();
        info!("Dropped {} connection(s) from {}", dropped, NAMESPACE);
    }
}
