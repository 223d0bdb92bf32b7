use drill_core::{Action, EventEnvelope, FlagId, ProgressTracker, Rejection, Session, SessionView};
use rand::Rng;

pub trait ActionSource {
    /// Next action for the session as currently shown, or `None` to stop.
    fn next_action(&mut self, view: &SessionView) -> Option<Action>;
}

/// Plays a track without mistakes:
/// 1. Report the first unfound flag of the current example.
/// 2. Advance once every flag is found.
/// 3. Stop when the session is complete.
pub struct DiligentTrainee;

impl ActionSource for DiligentTrainee {
    fn next_action(&mut self, view: &SessionView) -> Option<Action> {
        if view.session_complete {
            return None;
        }
        if let Some(flag) = view.example.red_flags.iter().find(|f| !f.found) {
            return Some(Action::MarkFound {
                flag: flag.id.clone(),
            });
        }
        Some(Action::Next)
    }
}

/// Clicks around the way a distracted learner might: repeats, misclicks,
/// undo, and navigation in both directions. Deterministic for a given rng.
pub struct SeededTrainee<R> {
    rng: R,
    remaining: usize,
}

const MISCLICK_FLAG: &str = "not-a-red-flag";

impl<R: Rng> SeededTrainee<R> {
    pub fn new(rng: R, max_actions: usize) -> Self {
        Self {
            rng,
            remaining: max_actions,
        }
    }
}

impl<R: Rng> ActionSource for SeededTrainee<R> {
    fn next_action(&mut self, view: &SessionView) -> Option<Action> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let roll: u8 = self.rng.gen_range(0..100);
        let flags = &view.example.red_flags;
        let action = match roll {
            0..=49 if !flags.is_empty() => {
                let pick = &flags[self.rng.gen_range(0..flags.len())];
                Action::MarkFound {
                    flag: pick.id.clone(),
                }
            }
            50..=59 => Action::MarkFound {
                flag: FlagId(MISCLICK_FLAG.to_string()),
            },
            60..=74 => Action::Undo,
            75..=89 => Action::Next,
            90..=97 => Action::Previous,
            _ => Action::Exit,
        };
        Some(action)
    }
}

#[derive(Debug, Default)]
pub struct DriveReport {
    pub applied: usize,
    pub rejected: Vec<Rejection>,
    pub events: Vec<EventEnvelope>,
}

/// Feeds `source` into `session` until the source stops or `max_actions` is hit.
pub fn drive<T: ProgressTracker>(
    session: &mut Session<T>,
    source: &mut impl ActionSource,
    max_actions: usize,
) -> DriveReport {
    let mut report = DriveReport::default();
    for _ in 0..max_actions {
        let Some(action) = source.next_action(&session.view()) else {
            break;
        };
        match session.apply(&action) {
            Ok(events) => {
                report.applied += 1;
                report.events.extend(events);
            }
            Err(rejection) => report.rejected.push(rejection),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::test_fixtures::email_session;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn diligent_trainee_reports_first_unfound_flag() {
        let session = email_session();
        let action = DiligentTrainee.next_action(&session.view());
        assert_eq!(
            action,
            Some(Action::MarkFound {
                flag: FlagId::from("a1")
            })
        );
    }

    #[test]
    fn diligent_trainee_never_gets_rejected() {
        let mut session = email_session();
        let report = drive(&mut session, &mut DiligentTrainee, 100);
        assert!(session.is_complete());
        assert!(report.rejected.is_empty());
        // 9 flags and 2 advances.
        assert_eq!(report.applied, 11);
    }

    #[test]
    fn seeded_trainee_is_deterministic() {
        let actions = |seed| {
            let session = email_session();
            let mut trainee = SeededTrainee::new(ChaCha8Rng::seed_from_u64(seed), 20);
            (0..20)
                .filter_map(|_| trainee.next_action(&session.view()))
                .collect::<Vec<_>>()
        };
        assert_eq!(actions(5), actions(5));
    }

    #[test]
    fn seeded_trainee_stops_after_budget() {
        let mut session = email_session();
        let mut trainee = SeededTrainee::new(ChaCha8Rng::seed_from_u64(1), 7);
        let report = drive(&mut session, &mut trainee, 100);
        assert_eq!(report.applied + report.rejected.len(), 7);
    }
}
