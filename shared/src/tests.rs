#[cfg(test)]
mod tests {
    use crate::models::*;
    use crate::validation::*;
    use crate::error::{ErrorCode, ErrorResponse};

    fn create_request(topic: &str, votes_per_voter: u8, name: &str) -> CreatePollRequest {
        CreatePollRequest {
            topic: topic.into(),
            votes_per_voter,
            name: name.into(),
        }
    }

    #[test]
    fn test_create_request_validation() {
        assert!(validate_create_request(&create_request("Where to eat?", 3, "Alice")).is_ok());
        assert_eq!(validate_create_request(&create_request("   ", 3, "Alice")), Err(ValidationError::EmptyTopic));
        assert_eq!(
            validate_create_request(&create_request(&"x".repeat(MAX_TOPIC_LENGTH + 1), 3, "Alice")),
            Err(ValidationError::TopicTooLong)
        );
        assert_eq!(
            validate_create_request(&create_request("Lunch", 0, "Alice")),
            Err(ValidationError::VotesPerVoterOutOfRange(0))
        );
        assert_eq!(
            validate_create_request(&create_request("Lunch", MAX_VOTES_PER_VOTER + 1, "Alice")),
            Err(ValidationError::VotesPerVoterOutOfRange(MAX_VOTES_PER_VOTER + 1))
        );
        assert_eq!(validate_create_request(&create_request("Lunch", 1, "")), Err(ValidationError::EmptyName));
    }

    #[test]
    fn test_name_length_counts_characters() {
        assert!(validate_name(&"é".repeat(MAX_NAME_LENGTH)).is_ok());
        assert_eq!(validate_name(&"é".repeat(MAX_NAME_LENGTH + 1)), Err(ValidationError::NameTooLong));
    }

    #[test]
    fn test_poll_id_format() {
        assert!(validate_poll_id("AB12CD").is_ok());
        assert!(validate_poll_id("ab12cd").is_err());
        assert!(validate_poll_id("AB12C").is_err());
        assert!(validate_poll_id("AB12CD7").is_err());
        assert!(validate_poll_id("AB-2CD").is_err());

        let join = JoinPollRequest { poll_id: "XYZ789".into(), name: "Bob".into() };
        assert!(validate_join_request(&join).is_ok());
    }

    #[test]
    fn test_participants() {
        let mut poll = PollRecord::new("AB12CD", "Lunch", 2, "admin");
        poll.add_participant("admin", "Alice");
        poll.add_participant("u2", "Bob");
        assert_eq!(poll.participants.len(), 2);
        assert!(poll.is_admin("admin"));
        assert!(!poll.is_admin("u2"));

        assert_eq!(poll.remove_participant("u2"), Some("Bob".to_string()));
        assert_eq!(poll.remove_participant("u2"), None);
    }

    #[test]
    fn test_wire_field_names() {
        let identity = SessionIdentity {
            subject_id: "u1".into(),
            poll_id: "p1".into(),
            display_name: "Alice".into(),
        };
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["userID"], "u1");
        assert_eq!(json["pollID"], "p1");
        assert_eq!(json["name"], "Alice");

        let poll = PollRecord::new("AB12CD", "Lunch", 2, "admin");
        let json = serde_json::to_value(&poll).unwrap();
        assert_eq!(json["adminID"], "admin");
        assert_eq!(json["votesPerVoter"], 2);
        assert_eq!(json["hasStarted"], false);

        let decoded: PollRecord = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, poll);
    }

    #[test]
    fn test_error_response_status() {
        let response = ErrorResponse::new(ErrorCode::Forbidden, "Forbidden");
        assert_eq!(response.status, 403);
        assert_eq!(ErrorCode::StoreUnavailable.status_code(), 503);
        assert_eq!(ErrorCode::NotFound.status_code(), 404);
    }
}
