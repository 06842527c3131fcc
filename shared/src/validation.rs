use crate::models::{CreatePollRequest, JoinPollRequest};

pub const MAX_TOPIC_LENGTH: usize = 100;
pub const MAX_NAME_LENGTH: usize = 25;
pub const MIN_VOTES_PER_VOTER: u8 = 1;
pub const MAX_VOTES_PER_VOTER: u8 = 5;
pub const POLL_ID_LENGTH: usize = 6;
pub const POLL_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Topic must not be empty")]
    EmptyTopic,
    #[error("Topic exceeds maximum length of {MAX_TOPIC_LENGTH}")]
    TopicTooLong,
    #[error("Name must not be empty")]
    EmptyName,
    #[error("Name exceeds maximum length of {MAX_NAME_LENGTH}")]
    NameTooLong,
    #[error("Votes per voter must be between {MIN_VOTES_PER_VOTER} and {MAX_VOTES_PER_VOTER}")]
    VotesPerVoterOutOfRange(u8),
    #[error("Invalid poll ID: {0}")]
    InvalidPollId(String),
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() { return Err(ValidationError::EmptyName); }
    if name.chars().count() > MAX_NAME_LENGTH { return Err(ValidationError::NameTooLong); }
    Ok(())
}

pub fn validate_poll_id(poll_id: &str) -> Result<(), ValidationError> {
    let well_formed = poll_id.len() == POLL_ID_LENGTH
        && poll_id.bytes().all(|b| POLL_ID_ALPHABET.contains(&b));
    if !well_formed {
        return Err(ValidationError::InvalidPollId(poll_id.to_string()));
    }
    Ok(())
}

pub fn validate_create_request(request: &CreatePollRequest) -> Result<(), ValidationError> {
    let topic = request.topic.trim();
    if topic.is_empty() { return Err(ValidationError::EmptyTopic); }
    if topic.chars().count() > MAX_TOPIC_LENGTH { return Err(ValidationError::TopicTooLong); }

    if !(MIN_VOTES_PER_VOTER..=MAX_VOTES_PER_VOTER).contains(&request.votes_per_voter) {
        return Err(ValidationError::VotesPerVoterOutOfRange(request.votes_per_voter));
    }

    validate_name(&request.name)
}

pub fn validate_join_request(request: &JoinPollRequest) -> Result<(), ValidationError> {
    validate_poll_id(&request.poll_id)?;
    validate_name(&request.name)
}
