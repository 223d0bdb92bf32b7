//! `drill_core`: red flag discovery and reward engine.
//!
//! No IO, no network. Progress leaves the engine only through `ProgressTracker`.

mod id;
mod progress;
mod reward;
mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;
mod types;

pub use id::{generate_session_id, generate_user_id, generate_uuid};
pub use progress::{
    level_for_points, ActivityKind, ActivityRecord, InMemoryProgress, ProgressTracker,
    UserProgress, ACTIVITY_LOG_LIMIT,
};
pub use reward::RewardDispatcher;
pub use session::{Session, SessionView};
pub use types::*;

pub(crate) fn emit(session: &SessionId, next_event_id: &mut u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", *next_event_id));
    *next_event_id += 1;
    EventEnvelope {
        id,
        session: session.clone(),
        event,
    }
}

#[cfg(test)]
mod tests;
