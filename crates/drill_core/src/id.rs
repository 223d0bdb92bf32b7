use rand::Rng;
use uuid::Uuid;

use crate::{SessionId, UserId};

/// Generate a deterministic v4-format UUID from a seeded RNG.
pub fn generate_uuid(rng: &mut impl Rng) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

pub fn generate_session_id(rng: &mut impl Rng) -> SessionId {
    SessionId(format!("session_{}", generate_uuid(rng)))
}

pub fn generate_user_id(rng: &mut impl Rng) -> UserId {
    UserId(format!("user_{}", generate_uuid(rng)))
}
