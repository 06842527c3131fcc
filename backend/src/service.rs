use ring::rand::SystemRandom;
use rustrict::CensorStr;
use shared::models::{CreatePollRequest, JoinPollRequest, PollRecord, PollSession, SessionIdentity};
use shared::validation::{validate_create_request, validate_join_request, ValidationError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::gateway::{BroadcastGateway, GatewayEvent};
use crate::ids::{create_participant_id, create_poll_id};
use crate::repository::{PollRepository, RepositoryError};
use crate::token::{CredentialIssuer, TokenError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Possible profanity detected in {0}")]
    Inappropriate(&'static str),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("failed to issue credential: {0}")]
    Token(#[from] TokenError),
    #[error("failed to generate poll id")]
    Random,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => ApiError::InvalidInput(e.to_string()),
            e @ ServiceError::Inappropriate(_) => ApiError::InvalidInput(e.to_string()),
            ServiceError::Repository(RepositoryError::StoreUnavailable) => ApiError::StoreUnavailable,
            ServiceError::Repository(RepositoryError::RecordNotFound(id)) => {
                ApiError::NotFound(format!("Poll {id} not found"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Participant lifecycle on top of the repository: creating and joining
/// polls, and keeping the participant list in step with live connections.
/// Every change that connected clients should see is broadcast as `poll_updated`.
pub struct PollService {
    repository: Arc<PollRepository>,
    issuer: Arc<CredentialIssuer>,
    gateway: Arc<BroadcastGateway>,
    rng: SystemRandom,
}

impl PollService {
    pub fn new(repository: Arc<PollRepository>, issuer: Arc<CredentialIssuer>, gateway: Arc<BroadcastGateway>) -> Self {
        Self {
            repository,
            issuer,
            gateway,
            rng: SystemRandom::new(),
        }
    }

    pub async fn create_poll(&self, request: &CreatePollRequest) -> Result<PollSession, ServiceError> {
        validate_create_request(request)?;
        if request.topic.is_inappropriate() {
            return Err(ServiceError::Inappropriate("topic"));
        }
        if request.name.is_inappropriate() {
            return Err(ServiceError::Inappropriate("name"));
        }

        let poll_id = create_poll_id(&self.rng).map_err(|_| ServiceError::Random)?;
        let admin_id = create_participant_id();
        let poll = PollRecord::new(poll_id, request.topic.trim(), request.votes_per_voter, admin_id);
        self.repository.create_poll(&poll).await?;

        let credential = self
            .issuer
            .issue(&poll.admin_id, &poll.id, request.name.trim(), self.repository.ttl_secs())?;
        info!("Poll {} created by {}", poll.id, poll.admin_id);

        Ok(PollSession { poll, access_token: credential.token })
    }

    /// Issues a credential for an existing poll. The participant is only
    /// recorded once their connection (or a rejoin) comes in.
    pub async fn join_poll(&self, request: &JoinPollRequest) -> Result<PollSession, ServiceError> {
        let request = JoinPollRequest {
            poll_id: request.poll_id.trim().to_uppercase(),
            name: request.name.trim().to_string(),
        };
        validate_join_request(&request)?;
        if request.name.is_inappropriate() {
            return Err(ServiceError::Inappropriate("name"));
        }

        let poll = self.repository.get_poll(&request.poll_id).await?;
        let participant_id = create_participant_id();
        let credential = self
            .issuer
            .issue(&participant_id, &poll.id, &request.name, self.repository.ttl_secs())?;
        debug!("Issued credential for {} to join poll {}", participant_id, poll.id);

        Ok(PollSession { poll, access_token: credential.token })
    }

    pub async fn rejoin_poll(&self, identity: &SessionIdentity) -> Result<PollRecord, ServiceError> {
        self.add_participant(identity).await
    }

    pub async fn add_participant(&self, identity: &SessionIdentity) -> Result<PollRecord, ServiceError> {
        let poll = self
            .repository
            .update_poll(&identity.poll_id, |poll| {
                poll.add_participant(identity.subject_id.clone(), identity.display_name.clone());
            })
            .await?;

        self.publish(&poll);
        Ok(poll)
    }

    /// Participants stay on record once the poll has started, so their votes
    /// keep an owner after they disconnect. A participant with another live
    /// connection to the poll is kept too.
    pub async fn remove_participant(&self, identity: &SessionIdentity) -> Result<Option<PollRecord>, ServiceError> {
        if self.gateway.has_subject(&identity.poll_id, &identity.subject_id) {
            debug!("{} still connected to poll {}", identity.subject_id, identity.poll_id);
            return Ok(None);
        }

        let mut removed = false;
        let poll = self
            .repository
            .update_poll(&identity.poll_id, |poll| {
                if !poll.has_started {
                    removed = poll.remove_participant(&identity.subject_id).is_some();
                }
            })
            .await?;

        if !removed {
            return Ok(None);
        }
        self.publish(&poll);
        Ok(Some(poll))
    }

    fn publish(&self, poll: &PollRecord) {
        match GatewayEvent::poll_updated(poll) {
            Ok(event) => {
                let delivered = self.gateway.broadcast(&poll.id, &event);
                debug!("poll_updated for {} delivered to {} connection(s)", poll.id, delivered);
            }
            Err(e) => warn!("Failed to encode poll {}: {}", poll.id, e),
        }
    }
}
