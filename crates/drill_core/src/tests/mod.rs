use super::*;
use crate::test_fixtures::{
    base_content, complete_track, email_session, find_all_in_current, session_with,
    RecordingTracker, TrackerCall, EMAIL_SIMULATION, SMS_SIMULATION,
};

mod rewards;

// --- Shared test helpers ------------------------------------------------

fn flag(id: &str) -> FlagId {
    FlagId::from(id)
}

fn recording_session(track: Track) -> Session<RecordingTracker> {
    session_with(&base_content(), track, RecordingTracker::default())
}

fn found_ids(session: &Session<impl ProgressTracker>) -> Vec<String> {
    session
        .current_example()
        .red_flags
        .iter()
        .filter(|f| f.found)
        .map(|f| f.id.0.clone())
        .collect()
}

fn points<T: ProgressTracker>(session: &Session<T>) -> i64 {
    session.tracker().snapshot().points
}
