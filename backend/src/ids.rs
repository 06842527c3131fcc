use ring::error::Unspecified;
use ring::rand::SecureRandom;
use shared::validation::{POLL_ID_ALPHABET, POLL_ID_LENGTH};
use uuid::Uuid;

/// Largest multiple of the alphabet size that fits in a byte; bytes at or
/// above it are discarded so every character is equally likely.
const ACCEPT_BELOW: u8 = (256 / POLL_ID_ALPHABET.len() * POLL_ID_ALPHABET.len()) as u8;

pub fn create_poll_id(rng: &dyn SecureRandom) -> Result<String, Unspecified> {
    let mut id = String::with_capacity(POLL_ID_LENGTH);
    let mut bytes = [0u8; 16];
    while id.len() < POLL_ID_LENGTH {
        rng.fill(&mut bytes)?;
        for &byte in bytes.iter().filter(|&&b| b < ACCEPT_BELOW) {
            if id.len() == POLL_ID_LENGTH {
                break;
            }
            id.push(POLL_ID_ALPHABET[byte as usize % POLL_ID_ALPHABET.len()] as char);
        }
    }
    Ok(id)
}

pub fn create_participant_id() -> String {
    Uuid::new_v4().simple().to_string()
}
