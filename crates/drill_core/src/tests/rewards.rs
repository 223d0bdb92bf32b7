use super::*;

fn badge(id: &str) -> BadgeId {
    BadgeId::from(id)
}

#[test]
fn finishing_email_track_unlocks_email_badges() {
    let mut session = recording_session(Track::Email);
    complete_track(&mut session);

    let mut unlocked = session.tracker().unlocked();
    unlocked.sort();
    assert_eq!(
        unlocked,
        vec![
            badge("eagle-eye"),
            badge("phishing-detector"),
            badge("security-novice")
        ]
    );
    assert_eq!(
        session.tracker().completions(),
        vec![SimulationId::from(EMAIL_SIMULATION)]
    );
}

#[test]
fn scam_buster_needs_other_track_recorded() {
    let mut session = recording_session(Track::Sms);
    complete_track(&mut session);
    assert!(!session.tracker().unlocked().contains(&badge("scam-buster")));

    let mut progress = UserProgress::default();
    progress
        .completed_simulations
        .insert(SimulationId::from(EMAIL_SIMULATION));
    let mut session = session_with(
        &base_content(),
        Track::Sms,
        RecordingTracker::with_progress(progress),
    );
    complete_track(&mut session);
    assert!(session.tracker().unlocked().contains(&badge("scam-buster")));
}

#[test]
fn badges_held_from_earlier_sessions_are_not_regranted() {
    let mut first = session_with(&base_content(), Track::Email, InMemoryProgress::new());
    complete_track(&mut first);
    let progress = first.into_tracker().into_progress();

    let mut second = session_with(
        &base_content(),
        Track::Email,
        RecordingTracker::with_progress(progress),
    );
    complete_track(&mut second);
    assert!(second.tracker().unlocked().is_empty());
    assert_eq!(second.tracker().inner.progress().badges.len(), 3);
}

#[test]
fn both_tracks_in_sequence_unlock_all_five_badges() {
    let content = base_content();
    let mut tracker = InMemoryProgress::new();

    let mut email = session_with(&content, Track::Email, &mut tracker);
    complete_track(&mut email);
    drop(email);

    let mut sms = session_with(&content, Track::Sms, &mut tracker);
    complete_track(&mut sms);
    drop(sms);

    let progress = tracker.progress();
    assert_eq!(progress.badges.len(), 5);
    assert!(progress.has_badge(&badge("scam-buster")));
    assert!(progress.has_completed(&SimulationId::from(SMS_SIMULATION)));
}

#[test]
fn completion_summary_reports_session_score() {
    let mut session = recording_session(Track::Email);
    complete_track(&mut session);

    let summary = session
        .tracker()
        .calls
        .iter()
        .find_map(|call| match call {
            TrackerCall::CompleteSimulation(_, summary) => Some(*summary),
            _ => None,
        })
        .unwrap();
    assert_eq!(summary.score, 3 * 125);
    assert_eq!(summary.red_flags_found, 9);
    assert_eq!(summary.total_red_flags, 9);
}

#[test]
fn completion_summary_reports_time_taken_and_stays_frozen() {
    let mut session = recording_session(Track::Sms);
    assert_eq!(session.summary().time_taken_secs, 0);

    std::thread::sleep(std::time::Duration::from_millis(1100));
    complete_track(&mut session);
    let reported = session
        .tracker()
        .calls
        .iter()
        .find_map(|call| match call {
            TrackerCall::CompleteSimulation(_, summary) => Some(*summary),
            _ => None,
        })
        .unwrap();
    assert!(reported.time_taken_secs >= 1);

    std::thread::sleep(std::time::Duration::from_millis(1100));
    assert_eq!(session.summary(), reported);
}

#[test]
fn points_are_sent_as_deltas() {
    let mut session = recording_session(Track::Email);
    session.mark_found(&flag("a1")).unwrap();
    session.mark_found(&flag("a2")).unwrap();
    session.undo_last().unwrap();
    assert_eq!(session.tracker().points_calls(), vec![25, 25, -25]);
}

#[test]
fn completion_events_come_after_point_awards() {
    let mut session = recording_session(Track::Email);
    find_all_in_current(&mut session);
    session.next().unwrap();
    find_all_in_current(&mut session);
    session.next().unwrap();
    session.mark_found(&flag("c1")).unwrap();
    session.mark_found(&flag("c2")).unwrap();
    let events = session.mark_found(&flag("c3")).unwrap();

    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e.event {
            Event::FlagFound { .. } => "found",
            Event::PointsAwarded { .. } => "points",
            Event::ExampleCompleted { .. } => "example",
            Event::BadgeUnlocked { .. } => "badge",
            Event::SimulationCompleted { .. } => "simulation",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "found",
            "points",
            "example",
            "points",
            "badge",
            "badge",
            "badge",
            "simulation"
        ]
    );
}

#[test]
fn event_ids_increase_within_a_session() {
    let mut session = email_session();
    let mut ids = Vec::new();
    for id in ["a1", "a2", "a3"] {
        ids.extend(session.mark_found(&flag(id)).unwrap().into_iter().map(|e| e.id.0));
    }
    assert_eq!(ids.first().map(String::as_str), Some("evt_000000"));
    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, ids);
}

#[test]
fn custom_reward_rules_apply() {
    let mut content = base_content();
    content.rewards = RewardRules {
        per_flag_reward: 10,
        completion_bonus: 5,
        points_per_level: 100,
    };
    let mut session = session_with(&content, Track::Sms, InMemoryProgress::new());
    find_all_in_current(&mut session);
    assert_eq!(points(&session), 10 * 2 + 5);
}
