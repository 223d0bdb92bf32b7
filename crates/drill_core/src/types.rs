//! Type definitions for `drill_core`.
//!
//! Catalog content, session actions, events, and the ID newtypes shared by
//! every crate in the workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(FlagId);
string_id!(ExampleId);
string_id!(SimulationId);
string_id!(BadgeId);
string_id!(SessionId);
string_id!(EventId);
string_id!(UserId);

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Email,
    Sms,
}

impl Track {
    pub const ALL: [Track; 2] = [Track::Email, Track::Sms];

    pub fn label(self) -> &'static str {
        match self {
            Track::Email => "email",
            Track::Sms => "sms",
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for Track {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Ok(Track::Email),
            "sms" => Ok(Track::Sms),
            other => Err(format!("unknown track '{other}' (expected email or sms)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

// ---------------------------------------------------------------------------
// Catalog types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedFlag {
    pub id: FlagId,
    pub title: String,
    pub description: String,
    pub hint: String,
    #[serde(default)]
    pub found: bool,
}

impl RedFlag {
    /// Text for the hint overlay: the explanation once found, the nudge before.
    pub fn hint_text(&self) -> &str {
        if self.found {
            &self.description
        } else {
            &self.hint
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStyle {
    #[default]
    Plain,
    Alert,
    Details,
    Link,
    Footer,
}

/// One block of message body. Segments carrying a `flag` are click targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodySegment {
    pub text: String,
    #[serde(default)]
    pub style: SegmentStyle,
    #[serde(default)]
    pub flag: Option<FlagId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub id: ExampleId,
    pub title: String,
    pub sender: String,
    /// Clicking the sender line reports this flag.
    #[serde(default)]
    pub sender_flag: Option<FlagId>,
    /// Email subject line; text messages have none.
    #[serde(default)]
    pub subject: Option<String>,
    pub body: Vec<BodySegment>,
    pub red_flags: Vec<RedFlag>,
}

impl Example {
    pub fn flag(&self, id: &FlagId) -> Option<&RedFlag> {
        self.red_flags.iter().find(|flag| flag.id == *id)
    }

    pub fn flags_found(&self) -> usize {
        self.red_flags.iter().filter(|flag| flag.found).count()
    }

    pub fn all_flags_found(&self) -> bool {
        self.red_flags.iter().all(|flag| flag.found)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDef {
    pub track: Track,
    /// Identifier recorded in the user's completed simulations.
    pub simulation_id: SimulationId,
    pub display_name: String,
    pub difficulty: Difficulty,
    pub examples: Vec<Example>,
}

impl TrackDef {
    pub fn total_flags(&self) -> usize {
        self.examples.iter().map(|e| e.red_flags.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeDef {
    pub id: BadgeId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BadgeRule {
    /// Finishing a session on one of `tracks`; an empty list means any track.
    TrackCompleted {
        #[serde(default)]
        tracks: Vec<Track>,
    },
    /// Finishing the last outstanding simulation of the set.
    AllSimulationsCompleted { simulations: Vec<SimulationId> },
    /// Point total reaching a threshold.
    PointsReached { points: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeRuleDef {
    pub badge: BadgeId,
    pub rule: BadgeRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRules {
    pub per_flag_reward: i64,
    pub completion_bonus: i64,
    pub points_per_level: i64,
}

impl Default for RewardRules {
    fn default() -> Self {
        Self {
            per_flag_reward: 25,
            completion_bonus: 50,
            points_per_level: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub content_version: String,
    pub rewards: RewardRules,
    pub tracks: Vec<TrackDef>,
    pub badges: Vec<BadgeDef>,
    pub badge_policy: Vec<BadgeRuleDef>,
}

impl Content {
    pub fn track(&self, track: Track) -> Option<&TrackDef> {
        self.tracks.iter().find(|def| def.track == track)
    }

    pub fn badge(&self, id: &BadgeId) -> Option<&BadgeDef> {
        self.badges.iter().find(|badge| badge.id == *id)
    }
}

// ---------------------------------------------------------------------------
// Action types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    MarkFound { flag: FlagId },
    Undo,
    Next,
    Previous,
    /// Leave the drill for the dashboard.
    Exit,
}

/// Why an action left the session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    EmptyTrack,
    UnknownFlag,
    AlreadyFound,
    ExampleComplete,
    NothingToUndo,
    SessionComplete,
    ExampleIncomplete,
    AtFirstExample,
    AtLastExample,
}

impl Rejection {
    pub fn code(self) -> &'static str {
        match self {
            Rejection::EmptyTrack => "empty_track",
            Rejection::UnknownFlag => "unknown_flag",
            Rejection::AlreadyFound => "already_found",
            Rejection::ExampleComplete => "example_complete",
            Rejection::NothingToUndo => "nothing_to_undo",
            Rejection::SessionComplete => "session_complete",
            Rejection::ExampleIncomplete => "example_incomplete",
            Rejection::AtFirstExample => "at_first_example",
            Rejection::AtLastExample => "at_last_example",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Rejection::EmptyTrack => "track has no examples",
            Rejection::UnknownFlag => "flag is not part of the current example",
            Rejection::AlreadyFound => "flag was already found",
            Rejection::ExampleComplete => "every flag in this example is already found",
            Rejection::NothingToUndo => "no discovery to undo",
            Rejection::SessionComplete => "simulation is already complete",
            Rejection::ExampleIncomplete => "find every flag before moving on",
            Rejection::AtFirstExample => "already at the first example",
            Rejection::AtLastExample => "already at the last example",
        };
        f.write_str(message)
    }
}

impl std::error::Error for Rejection {}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// What a point delta was for; becomes the activity log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activity {
    FlagFound { flag: FlagId },
    FlagUndone { flag: FlagId },
    ExampleCompleted { example: ExampleId },
    CompletionRevoked { example: ExampleId },
}

/// Reported with `complete_simulation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Net points earned during the session.
    pub score: i64,
    pub red_flags_found: u32,
    pub total_red_flags: u32,
    /// Wall-clock seconds from session start, frozen at completion.
    pub time_taken_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub session: SessionId,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    FlagFound {
        example: ExampleId,
        flag: FlagId,
    },
    FlagUndone {
        example: ExampleId,
        flag: FlagId,
    },
    ExampleCompleted {
        example: ExampleId,
    },
    /// An undo took back the discovery that had completed the example.
    ExampleReopened {
        example: ExampleId,
    },
    ExampleChanged {
        from: usize,
        to: usize,
        example: ExampleId,
    },
    PointsAwarded {
        delta: i64,
        activity: Activity,
    },
    BadgeUnlocked {
        badge: BadgeId,
    },
    SimulationCompleted {
        simulation: SimulationId,
        summary: SessionSummary,
    },
}
