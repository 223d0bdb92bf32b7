//! The progress tracker seam and an in-memory tracker.
//!
//! Sessions never own user progress. They send deltas and idempotent unlocks
//! through `ProgressTracker` and read a snapshot when a badge decision needs one.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{Activity, BadgeId, SessionSummary, SimulationId};

/// Most recent activity entries kept by `InMemoryProgress`.
pub const ACTIVITY_LOG_LIMIT: usize = 20;

pub trait ProgressTracker {
    /// Apply a signed point delta.
    fn add_points(&mut self, delta: i64, activity: &Activity);
    /// Add a badge; no-op when already held.
    fn unlock_badge(&mut self, badge: &BadgeId);
    /// Record a simulation as completed; no-op when already recorded.
    fn complete_simulation(&mut self, simulation: &SimulationId, summary: &SessionSummary);
    fn return_to_dashboard(&mut self) {}
    /// Current view of the user's progress.
    fn snapshot(&self) -> UserProgress;
}

impl<T: ProgressTracker + ?Sized> ProgressTracker for &mut T {
    fn add_points(&mut self, delta: i64, activity: &Activity) {
        (**self).add_points(delta, activity);
    }

    fn unlock_badge(&mut self, badge: &BadgeId) {
        (**self).unlock_badge(badge);
    }

    fn complete_simulation(&mut self, simulation: &SimulationId, summary: &SessionSummary) {
        (**self).complete_simulation(simulation, summary);
    }

    fn return_to_dashboard(&mut self) {
        (**self).return_to_dashboard();
    }

    fn snapshot(&self) -> UserProgress {
        (**self).snapshot()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub points: i64,
    pub badges: BTreeSet<BadgeId>,
    pub completed_simulations: BTreeSet<SimulationId>,
}

impl UserProgress {
    pub fn has_badge(&self, badge: &BadgeId) -> bool {
        self.badges.contains(badge)
    }

    pub fn has_completed(&self, simulation: &SimulationId) -> bool {
        self.completed_simulations.contains(simulation)
    }

    pub fn level(&self, points_per_level: i64) -> i64 {
        level_for_points(self.points, points_per_level)
    }
}

/// `floor(points / points_per_level) + 1`, treating negative totals as zero.
pub fn level_for_points(points: i64, points_per_level: i64) -> i64 {
    points.max(0) / points_per_level.max(1) + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PointsEarned,
    BadgeUnlocked,
    SimulationCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    pub points_earned: i64,
    pub detail: String,
}

/// Progress tracker that keeps everything in process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryProgress {
    progress: UserProgress,
    activity: VecDeque<ActivityRecord>,
}

impl InMemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_progress(progress: UserProgress) -> Self {
        Self {
            progress,
            activity: VecDeque::new(),
        }
    }

    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    pub fn into_progress(self) -> UserProgress {
        self.progress
    }

    /// Newest first.
    pub fn activity(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.activity.iter()
    }

    fn log(&mut self, kind: ActivityKind, points_earned: i64, detail: String) {
        self.activity.push_front(ActivityRecord {
            kind,
            points_earned,
            detail,
        });
        self.activity.truncate(ACTIVITY_LOG_LIMIT);
    }
}

impl ProgressTracker for InMemoryProgress {
    fn add_points(&mut self, delta: i64, activity: &Activity) {
        self.progress.points = (self.progress.points + delta).max(0);
        let detail = match activity {
            Activity::FlagFound { flag } => format!("found {flag}"),
            Activity::FlagUndone { flag } => format!("undid {flag}"),
            Activity::ExampleCompleted { example } => format!("completed {example}"),
            Activity::CompletionRevoked { example } => format!("reopened {example}"),
        };
        self.log(ActivityKind::PointsEarned, delta, detail);
    }

    fn unlock_badge(&mut self, badge: &BadgeId) {
        if self.progress.badges.insert(badge.clone()) {
            self.log(ActivityKind::BadgeUnlocked, 0, badge.to_string());
        }
    }

    fn complete_simulation(&mut self, simulation: &SimulationId, summary: &SessionSummary) {
        if self.progress.completed_simulations.insert(simulation.clone()) {
            self.log(
                ActivityKind::SimulationCompleted,
                0,
                format!(
                    "{simulation}: score {} ({}/{} flags) in {}s",
                    summary.score,
                    summary.red_flags_found,
                    summary.total_red_flags,
                    summary.time_taken_secs
                ),
            );
        }
    }

    fn snapshot(&self) -> UserProgress {
        self.progress.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlagId;

    fn found(flag: &str) -> Activity {
        Activity::FlagFound {
            flag: FlagId::from(flag),
        }
    }

    #[test]
    fn level_starts_at_one_and_steps_every_hundred() {
        assert_eq!(level_for_points(0, 100), 1);
        assert_eq!(level_for_points(99, 100), 1);
        assert_eq!(level_for_points(100, 100), 2);
        assert_eq!(level_for_points(375, 100), 4);
        assert_eq!(level_for_points(-40, 100), 1);
    }

    #[test]
    fn points_never_drop_below_zero() {
        let mut progress = InMemoryProgress::new();
        progress.add_points(25, &found("a"));
        progress.add_points(-60, &found("a"));
        assert_eq!(progress.progress().points, 0);
    }

    #[test]
    fn badge_unlock_is_idempotent() {
        let mut progress = InMemoryProgress::new();
        let badge = BadgeId::from("eagle-eye");
        progress.unlock_badge(&badge);
        progress.unlock_badge(&badge);
        assert_eq!(progress.progress().badges.len(), 1);
        let unlock_entries = progress
            .activity()
            .filter(|r| r.kind == ActivityKind::BadgeUnlocked)
            .count();
        assert_eq!(unlock_entries, 1);
    }

    #[test]
    fn completion_is_recorded_once() {
        let mut progress = InMemoryProgress::new();
        let sim = SimulationId::from("sms-scam-1");
        progress.complete_simulation(&sim, &SessionSummary::default());
        progress.complete_simulation(&sim, &SessionSummary::default());
        assert!(progress.progress().has_completed(&sim));
        assert_eq!(progress.activity().count(), 1);
    }

    #[test]
    fn completion_record_carries_time_taken() {
        let mut progress = InMemoryProgress::new();
        let summary = SessionSummary {
            score: 375,
            red_flags_found: 9,
            total_red_flags: 9,
            time_taken_secs: 94,
        };
        progress.complete_simulation(&SimulationId::from("phishing-email-1"), &summary);
        let record = progress.activity().next().unwrap();
        assert_eq!(record.kind, ActivityKind::SimulationCompleted);
        assert_eq!(record.detail, "phishing-email-1: score 375 (9/9 flags) in 94s");
    }

    #[test]
    fn activity_log_keeps_most_recent_entries() {
        let mut progress = InMemoryProgress::new();
        for i in 0..(ACTIVITY_LOG_LIMIT as i64 + 5) {
            progress.add_points(i, &found("a"));
        }
        assert_eq!(progress.activity().count(), ACTIVITY_LOG_LIMIT);
        let newest = progress.activity().next().unwrap();
        assert_eq!(newest.points_earned, ACTIVITY_LOG_LIMIT as i64 + 4);
    }

    #[test]
    fn mutable_reference_forwards_to_tracker() {
        fn award<T: ProgressTracker>(mut tracker: T) -> i64 {
            tracker.add_points(50, &found("b"));
            tracker.snapshot().points
        }

        let mut progress = InMemoryProgress::new();
        assert_eq!(award(&mut progress), 50);
        assert_eq!(progress.progress().points, 50);
    }
}
