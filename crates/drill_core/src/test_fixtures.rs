//! Shared test fixtures for `drill_core` and downstream crates.
//!
//! `base_content()` mirrors the production catalogs in shape: a three-example
//! email track with three flags each, a two-example SMS track, and the
//! production badge policy. `RecordingTracker` keeps every tracker call.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    Activity, BadgeDef, BadgeId, BadgeRule, BadgeRuleDef, BodySegment, Content, Difficulty,
    Example, ExampleId, FlagId, InMemoryProgress, ProgressTracker, RedFlag, RewardRules,
    SegmentStyle, Session, SessionId, SessionSummary, SimulationId, Track, TrackDef,
    UserProgress,
};

pub const EMAIL_SIMULATION: &str = "phishing-email-1";
pub const SMS_SIMULATION: &str = "sms-scam-1";

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

pub fn red_flag(id: &str) -> RedFlag {
    RedFlag {
        id: FlagId::from(id),
        title: format!("Flag {id}"),
        description: format!("{id} is suspicious"),
        hint: format!("look for {id}"),
        found: false,
    }
}

/// Example whose flags are each reachable from one body segment.
pub fn example(id: &str, flag_ids: &[&str]) -> Example {
    Example {
        id: ExampleId::from(id),
        title: format!("Example {id}"),
        sender: format!("sender@{id}.example"),
        sender_flag: None,
        subject: Some(format!("About {id}")),
        body: flag_ids
            .iter()
            .map(|flag| BodySegment {
                text: format!("segment hiding {flag}"),
                style: SegmentStyle::Plain,
                flag: Some(FlagId::from(*flag)),
            })
            .collect(),
        red_flags: flag_ids.iter().map(|flag| red_flag(flag)).collect(),
    }
}

pub fn email_track() -> TrackDef {
    TrackDef {
        track: Track::Email,
        simulation_id: SimulationId::from(EMAIL_SIMULATION),
        display_name: "Email Safety Training".to_string(),
        difficulty: Difficulty::Beginner,
        examples: vec![
            example("bank", &["a1", "a2", "a3"]),
            example("prize", &["b1", "b2", "b3"]),
            example("support", &["c1", "c2", "c3"]),
        ],
    }
}

pub fn sms_track() -> TrackDef {
    TrackDef {
        track: Track::Sms,
        simulation_id: SimulationId::from(SMS_SIMULATION),
        display_name: "Text Message Safety Training".to_string(),
        difficulty: Difficulty::Beginner,
        examples: vec![
            example("bank-sms", &["s1", "s2"]),
            example("delivery", &["t1", "t2"]),
        ],
    }
}

fn badge(id: &str, name: &str) -> BadgeDef {
    BadgeDef {
        id: BadgeId::from(id),
        name: name.to_string(),
        description: format!("{name} badge"),
    }
}

fn track_rule(badge: &str, tracks: Vec<Track>) -> BadgeRuleDef {
    BadgeRuleDef {
        badge: BadgeId::from(badge),
        rule: BadgeRule::TrackCompleted { tracks },
    }
}

pub fn base_content() -> Content {
    Content {
        content_version: "test".to_string(),
        rewards: RewardRules::default(),
        tracks: vec![email_track(), sms_track()],
        badges: vec![
            badge("phishing-detector", "Email Detective"),
            badge("sms-guardian", "Text Message Hero"),
            badge("security-novice", "Safety Student"),
            badge("eagle-eye", "Sharp Eyes"),
            badge("scam-buster", "Scam Fighter"),
        ],
        badge_policy: vec![
            track_rule("phishing-detector", vec![Track::Email]),
            track_rule("sms-guardian", vec![Track::Sms]),
            track_rule("security-novice", vec![]),
            track_rule("eagle-eye", vec![]),
            BadgeRuleDef {
                badge: BadgeId::from("scam-buster"),
                rule: BadgeRule::AllSimulationsCompleted {
                    simulations: vec![
                        SimulationId::from(EMAIL_SIMULATION),
                        SimulationId::from(SMS_SIMULATION),
                    ],
                },
            },
        ],
    }
}

pub fn session_with<T: ProgressTracker>(content: &Content, track: Track, tracker: T) -> Session<T> {
    let track_def = content
        .track(track)
        .expect("fixture content has both tracks");
    Session::new(
        SessionId::from("session_test"),
        track_def,
        content.rewards,
        content.badge_policy.clone(),
        tracker,
    )
    .expect("fixture tracks are not empty")
}

pub fn email_session() -> Session<InMemoryProgress> {
    session_with(&base_content(), Track::Email, InMemoryProgress::new())
}

/// Finds every flag of the current example in catalog order.
pub fn find_all_in_current<T: ProgressTracker>(session: &mut Session<T>) {
    let flags: Vec<FlagId> = session
        .current_example()
        .red_flags
        .iter()
        .filter(|f| !f.found)
        .map(|f| f.id.clone())
        .collect();
    for flag in flags {
        session.mark_found(&flag).expect("fixture flag is findable");
    }
}

/// Plays a whole track without mistakes.
pub fn complete_track<T: ProgressTracker>(session: &mut Session<T>) {
    while !session.is_complete() {
        find_all_in_current(session);
        if !session.is_complete() {
            session.next().expect("example is complete");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCall {
    AddPoints(i64, Activity),
    UnlockBadge(BadgeId),
    CompleteSimulation(SimulationId, SessionSummary),
    ReturnToDashboard,
}

/// Tracker that applies calls like `InMemoryProgress` and keeps all of them.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    pub inner: InMemoryProgress,
    pub calls: Vec<TrackerCall>,
}

impl RecordingTracker {
    pub fn with_progress(progress: UserProgress) -> Self {
        Self {
            inner: InMemoryProgress::from_progress(progress),
            calls: Vec::new(),
        }
    }

    pub fn points_calls(&self) -> Vec<i64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                TrackerCall::AddPoints(delta, _) => Some(*delta),
                _ => None,
            })
            .collect()
    }

    pub fn unlocked(&self) -> Vec<BadgeId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                TrackerCall::UnlockBadge(badge) => Some(badge.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<SimulationId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                TrackerCall::CompleteSimulation(sim, _) => Some(sim.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressTracker for RecordingTracker {
    fn add_points(&mut self, delta: i64, activity: &Activity) {
        self.inner.add_points(delta, activity);
        self.calls.push(TrackerCall::AddPoints(delta, activity.clone()));
    }

    fn unlock_badge(&mut self, badge: &BadgeId) {
        self.inner.unlock_badge(badge);
        self.calls.push(TrackerCall::UnlockBadge(badge.clone()));
    }

    fn complete_simulation(&mut self, simulation: &SimulationId, summary: &SessionSummary) {
        self.inner.complete_simulation(simulation, summary);
        self.calls
            .push(TrackerCall::CompleteSimulation(simulation.clone(), *summary));
    }

    fn return_to_dashboard(&mut self) {
        self.calls.push(TrackerCall::ReturnToDashboard);
    }

    fn snapshot(&self) -> UserProgress {
        self.inner.snapshot()
    }
}
