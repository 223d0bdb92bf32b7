use std::time::Instant;

use serde::Serialize;

use crate::reward::RewardDispatcher;
use crate::{
    Action, BadgeRuleDef, Event, EventEnvelope, Example, FlagId, ProgressTracker, Rejection,
    RewardRules, SessionId, SessionSummary, SimulationId, Track, TrackDef,
};

/// One run through a track's examples.
///
/// Every operation either applies fully and returns the events it produced,
/// or returns a `Rejection` and leaves the session exactly as it was.
pub struct Session<T> {
    id: SessionId,
    track: Track,
    simulation: SimulationId,
    display_name: String,
    examples: Vec<Example>,
    /// Completion bonus currently held, per example.
    bonus_held: Vec<bool>,
    current: usize,
    last_found: Option<FlagId>,
    completed: bool,
    points_earned: i64,
    started: Instant,
    /// Set once the session completes.
    time_taken_secs: Option<u64>,
    next_event_id: u64,
    dispatcher: RewardDispatcher<T>,
}

/// Read-only state for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session: SessionId,
    pub track: Track,
    pub simulation: SimulationId,
    pub display_name: String,
    pub example_index: usize,
    pub example_count: usize,
    pub example: Example,
    pub flags_found: usize,
    pub total_flags: usize,
    pub all_flags_found: bool,
    pub session_complete: bool,
    pub last_discovered_flag: Option<FlagId>,
    pub can_go_next: bool,
    pub can_go_previous: bool,
    pub points_earned: i64,
}

impl SessionView {
    /// Share of the current example's flags found, in `0.0..=1.0`.
    pub fn progress_ratio(&self) -> f32 {
        if self.total_flags == 0 {
            return 1.0;
        }
        self.flags_found as f32 / self.total_flags as f32
    }
}

impl<T: ProgressTracker> Session<T> {
    /// Starts a session over a fresh copy of `track_def`'s examples.
    pub fn new(
        id: SessionId,
        track_def: &TrackDef,
        rules: RewardRules,
        policy: Vec<BadgeRuleDef>,
        tracker: T,
    ) -> Result<Self, Rejection> {
        if track_def.examples.is_empty() {
            return Err(Rejection::EmptyTrack);
        }
        let mut examples = track_def.examples.clone();
        for flag in examples.iter_mut().flat_map(|e| e.red_flags.iter_mut()) {
            flag.found = false;
        }
        Ok(Self {
            id,
            track: track_def.track,
            simulation: track_def.simulation_id.clone(),
            display_name: track_def.display_name.clone(),
            bonus_held: vec![false; examples.len()],
            examples,
            current: 0,
            last_found: None,
            completed: false,
            points_earned: 0,
            started: Instant::now(),
            time_taken_secs: None,
            next_event_id: 0,
            dispatcher: RewardDispatcher::new(tracker, rules, policy),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn track(&self) -> Track {
        self.track
    }

    pub fn simulation(&self) -> &SimulationId {
        &self.simulation
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_example(&self) -> &Example {
        &self.examples[self.current]
    }

    pub fn last_discovered(&self) -> Option<&FlagId> {
        self.last_found.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn points_earned(&self) -> i64 {
        self.points_earned
    }

    pub fn tracker(&self) -> &T {
        self.dispatcher.tracker()
    }

    pub fn into_tracker(self) -> T {
        self.dispatcher.into_tracker()
    }

    pub fn summary(&self) -> SessionSummary {
        let found: usize = self.examples.iter().map(Example::flags_found).sum();
        let total: usize = self.examples.iter().map(|e| e.red_flags.len()).sum();
        SessionSummary {
            score: self.points_earned,
            red_flags_found: u32::try_from(found).unwrap_or(u32::MAX),
            total_red_flags: u32::try_from(total).unwrap_or(u32::MAX),
            time_taken_secs: self
                .time_taken_secs
                .unwrap_or_else(|| self.started.elapsed().as_secs()),
        }
    }

    pub fn view(&self) -> SessionView {
        let example = self.current_example();
        let all_flags_found = example.all_flags_found();
        let is_last = self.current + 1 == self.examples.len();
        SessionView {
            session: self.id.clone(),
            track: self.track,
            simulation: self.simulation.clone(),
            display_name: self.display_name.clone(),
            example_index: self.current,
            example_count: self.examples.len(),
            example: example.clone(),
            flags_found: example.flags_found(),
            total_flags: example.red_flags.len(),
            all_flags_found,
            session_complete: self.completed,
            last_discovered_flag: self.last_found.clone(),
            can_go_next: all_flags_found && !(is_last && self.completed),
            can_go_previous: self.current > 0,
            points_earned: self.points_earned,
        }
    }

    pub fn apply(&mut self, action: &Action) -> Result<Vec<EventEnvelope>, Rejection> {
        match action {
            Action::MarkFound { flag } => self.mark_found(flag),
            Action::Undo => self.undo_last(),
            Action::Next => self.next(),
            Action::Previous => self.previous(),
            Action::Exit => Ok(self.exit()),
        }
    }

    /// Records a discovery in the current example.
    ///
    /// Finding the last flag of an example grants the completion bonus; doing
    /// so on the final example completes the session.
    pub fn mark_found(&mut self, flag: &FlagId) -> Result<Vec<EventEnvelope>, Rejection> {
        if self.completed {
            return Err(Rejection::SessionComplete);
        }
        let index = self.current;
        let example = &mut self.examples[index];
        let red_flag = example
            .red_flags
            .iter_mut()
            .find(|f| f.id == *flag)
            .ok_or(Rejection::UnknownFlag)?;
        if self.bonus_held[index] {
            return Err(Rejection::ExampleComplete);
        }
        if red_flag.found {
            return Err(Rejection::AlreadyFound);
        }
        red_flag.found = true;
        let example_id = example.id.clone();
        let completes_example = example.all_flags_found();

        self.last_found = Some(flag.clone());
        let mut events = vec![Event::FlagFound {
            example: example_id.clone(),
            flag: flag.clone(),
        }];
        self.points_earned += self.dispatcher.flag_found(flag, &mut events);

        if completes_example {
            self.bonus_held[index] = true;
            events.push(Event::ExampleCompleted {
                example: example_id.clone(),
            });
            self.points_earned += self.dispatcher.example_completed(&example_id, &mut events);
            if index + 1 == self.examples.len() {
                self.finish(&mut events);
            }
        }
        Ok(self.wrap(events))
    }

    /// Reverts the most recent discovery, one step only.
    pub fn undo_last(&mut self) -> Result<Vec<EventEnvelope>, Rejection> {
        if self.completed {
            return Err(Rejection::SessionComplete);
        }
        let flag = self.last_found.take().ok_or(Rejection::NothingToUndo)?;
        let index = self.current;
        let example = &mut self.examples[index];
        if let Some(red_flag) = example.red_flags.iter_mut().find(|f| f.id == flag) {
            red_flag.found = false;
        }
        let example_id = example.id.clone();

        let mut events = vec![Event::FlagUndone {
            example: example_id.clone(),
            flag: flag.clone(),
        }];
        self.points_earned += self.dispatcher.flag_undone(&flag, &mut events);

        if self.bonus_held[index] {
            self.bonus_held[index] = false;
            events.push(Event::ExampleReopened {
                example: example_id.clone(),
            });
            self.points_earned += self.dispatcher.completion_revoked(&example_id, &mut events);
        }
        Ok(self.wrap(events))
    }

    /// Advances once the current example is fully discovered. At the last
    /// example this completes the session instead.
    pub fn next(&mut self) -> Result<Vec<EventEnvelope>, Rejection> {
        if !self.current_example().all_flags_found() {
            return Err(Rejection::ExampleIncomplete);
        }
        let mut events = Vec::new();
        if self.current + 1 < self.examples.len() {
            self.move_to(self.current + 1, &mut events);
        } else if self.completed {
            return Err(Rejection::AtLastExample);
        } else {
            self.finish(&mut events);
        }
        Ok(self.wrap(events))
    }

    /// Steps back for review; allowed whatever the completion state.
    pub fn previous(&mut self) -> Result<Vec<EventEnvelope>, Rejection> {
        if self.current == 0 {
            return Err(Rejection::AtFirstExample);
        }
        let mut events = Vec::new();
        self.move_to(self.current - 1, &mut events);
        Ok(self.wrap(events))
    }

    pub fn exit(&mut self) -> Vec<EventEnvelope> {
        self.dispatcher.tracker_mut().return_to_dashboard();
        Vec::new()
    }

    fn move_to(&mut self, to: usize, events: &mut Vec<Event>) {
        let from = self.current;
        self.current = to;
        self.last_found = None;
        events.push(Event::ExampleChanged {
            from,
            to,
            example: self.examples[to].id.clone(),
        });
    }

    fn finish(&mut self, events: &mut Vec<Event>) {
        self.completed = true;
        self.last_found = None;
        self.time_taken_secs = Some(self.started.elapsed().as_secs());
        let summary = self.summary();
        self.dispatcher
            .session_completed(self.track, &self.simulation, summary, events);
    }

    fn wrap(&mut self, events: Vec<Event>) -> Vec<EventEnvelope> {
        events
            .into_iter()
            .map(|event| crate::emit(&self.id, &mut self.next_event_id, event))
            .collect()
    }
}
