use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// participant id -> display name
pub type Participants = BTreeMap<String, String>;
/// nomination id -> nomination
pub type Nominations = BTreeMap<String, Nomination>;
/// participant id -> ranked nomination ids
pub type Votes = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Nomination {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NominationResult {
    #[serde(rename = "nominationID")]
    pub nomination_id: String,
    pub nomination_text: String,
    pub score: f64,
}

/// A poll as it lives in the store. Only the store owns it; every read goes
/// back to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollRecord {
    pub id: String,
    pub topic: String,
    pub votes_per_voter: u8,
    pub participants: Participants,
    pub nominations: Nominations,
    pub votes: Votes,
    pub results: Vec<NominationResult>,
    #[serde(rename = "adminID")]
    pub admin_id: String,
    pub has_started: bool,
    pub created_at: OffsetDateTime,
}

impl PollRecord {
    pub fn new(id: impl Into<String>, topic: impl Into<String>, votes_per_voter: u8, admin_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            votes_per_voter,
            participants: Participants::new(),
            nominations: Nominations::new(),
            votes: Votes::new(),
            results: Vec::new(),
            admin_id: admin_id.into(),
            has_started: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn add_participant(&mut self, participant_id: impl Into<String>, name: impl Into<String>) {
        self.participants.insert(participant_id.into(), name.into());
    }

    pub fn remove_participant(&mut self, participant_id: &str) -> Option<String> {
        self.participants.remove(participant_id)
    }

    pub fn is_admin(&self, participant_id: &str) -> bool {
        self.admin_id == participant_id
    }
}

/// The identity carried by a verified session credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionIdentity {
    #[serde(rename = "userID")]
    pub subject_id: String,
    #[serde(rename = "pollID")]
    pub poll_id: String,
    #[serde(rename = "name")]
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    pub topic: String,
    pub votes_per_voter: u8,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPollRequest {
    #[serde(rename = "pollID")]
    pub poll_id: String,
    pub name: String,
}

/// Returned by create and join: the poll plus the credential for the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollSession {
    pub poll: PollRecord,
    pub access_token: String,
}
