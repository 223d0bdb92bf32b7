use std::collections::BTreeSet;

use crate::{
    Activity, BadgeId, BadgeRule, BadgeRuleDef, Event, ExampleId, FlagId, ProgressTracker,
    RewardRules, SessionSummary, SimulationId, Track, UserProgress,
};

impl BadgeRule {
    /// Whether finishing `simulation` on `track` earns the badge, given the
    /// progress recorded before this session.
    pub fn earned_on_completion(
        &self,
        track: Track,
        simulation: &SimulationId,
        progress: &UserProgress,
    ) -> bool {
        match self {
            BadgeRule::TrackCompleted { tracks } => tracks.is_empty() || tracks.contains(&track),
            BadgeRule::AllSimulationsCompleted { simulations } => {
                simulations.contains(simulation)
                    && simulations
                        .iter()
                        .filter(|other| *other != simulation)
                        .all(|other| progress.has_completed(other))
            }
            BadgeRule::PointsReached { points } => progress.points >= *points,
        }
    }
}

/// Turns discovery and completion transitions into tracker calls.
///
/// Badge decisions always read the tracker's snapshot at dispatch time, so a
/// badge held from an earlier session is never granted twice.
pub struct RewardDispatcher<T> {
    tracker: T,
    rules: RewardRules,
    policy: Vec<BadgeRuleDef>,
}

impl<T: ProgressTracker> RewardDispatcher<T> {
    pub fn new(tracker: T, rules: RewardRules, policy: Vec<BadgeRuleDef>) -> Self {
        Self {
            tracker,
            rules,
            policy,
        }
    }

    pub fn rules(&self) -> &RewardRules {
        &self.rules
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    pub fn into_tracker(self) -> T {
        self.tracker
    }

    pub fn flag_found(&mut self, flag: &FlagId, events: &mut Vec<Event>) -> i64 {
        let delta = self.rules.per_flag_reward;
        self.award(delta, Activity::FlagFound { flag: flag.clone() }, events);
        delta
    }

    pub fn flag_undone(&mut self, flag: &FlagId, events: &mut Vec<Event>) -> i64 {
        let delta = -self.rules.per_flag_reward;
        self.award(delta, Activity::FlagUndone { flag: flag.clone() }, events);
        delta
    }

    pub fn example_completed(&mut self, example: &ExampleId, events: &mut Vec<Event>) -> i64 {
        let delta = self.rules.completion_bonus;
        let activity = Activity::ExampleCompleted {
            example: example.clone(),
        };
        self.award(delta, activity, events);
        delta
    }

    pub fn completion_revoked(&mut self, example: &ExampleId, events: &mut Vec<Event>) -> i64 {
        let delta = -self.rules.completion_bonus;
        let activity = Activity::CompletionRevoked {
            example: example.clone(),
        };
        self.award(delta, activity, events);
        delta
    }

    /// Session-end path: unlock every earned badge not yet held, then record
    /// the simulation. Returns the badges unlocked by this call.
    pub fn session_completed(
        &mut self,
        track: Track,
        simulation: &SimulationId,
        summary: SessionSummary,
        events: &mut Vec<Event>,
    ) -> Vec<BadgeId> {
        let snapshot = self.tracker.snapshot();
        let earned: Vec<BadgeId> = self
            .policy
            .iter()
            .filter(|def| def.rule.earned_on_completion(track, simulation, &snapshot))
            .map(|def| def.badge.clone())
            .collect();
        let unlocked = self.unlock_missing(earned, &snapshot, events);

        self.tracker.complete_simulation(simulation, &summary);
        events.push(Event::SimulationCompleted {
            simulation: simulation.clone(),
            summary,
        });
        unlocked
    }

    fn award(&mut self, delta: i64, activity: Activity, events: &mut Vec<Event>) {
        self.tracker.add_points(delta, &activity);
        events.push(Event::PointsAwarded { delta, activity });
        if delta > 0 {
            self.unlock_point_badges(events);
        }
    }

    fn unlock_point_badges(&mut self, events: &mut Vec<Event>) {
        let snapshot = self.tracker.snapshot();
        let earned: Vec<BadgeId> = self
            .policy
            .iter()
            .filter(|def| {
                matches!(def.rule, BadgeRule::PointsReached { points } if snapshot.points >= points)
            })
            .map(|def| def.badge.clone())
            .collect();
        self.unlock_missing(earned, &snapshot, events);
    }

    fn unlock_missing(
        &mut self,
        earned: Vec<BadgeId>,
        snapshot: &UserProgress,
        events: &mut Vec<Event>,
    ) -> Vec<BadgeId> {
        // Several rules may name the same badge.
        let mut granted = BTreeSet::new();
        let mut unlocked = Vec::new();
        for badge in earned {
            if snapshot.has_badge(&badge) || !granted.insert(badge.clone()) {
                continue;
            }
            self.tracker.unlock_badge(&badge);
            events.push(Event::BadgeUnlocked {
                badge: badge.clone(),
            });
            unlocked.push(badge);
        }
        unlocked
    }
}
