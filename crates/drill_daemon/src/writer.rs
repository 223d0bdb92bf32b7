//! Asynchronous progress persistence.
//!
//! Sessions never wait on the store. `RemoteProgress` turns tracker calls into
//! `ProgressWrite` messages and one writer task applies them in order.

use std::fmt;

use drill_core::{
    Activity, BadgeId, ProgressTracker, SessionSummary, SimulationId, UserId, UserProgress,
};
use tokio::sync::mpsc;

use crate::state::{ProgressStore, WriteTx};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressWrite {
    AddPoints {
        user: UserId,
        delta: i64,
        activity: Activity,
    },
    UnlockBadge {
        user: UserId,
        badge: BadgeId,
    },
    CompleteSimulation {
        user: UserId,
        simulation: SimulationId,
        summary: SessionSummary,
    },
}

impl ProgressWrite {
    fn user(&self) -> &UserId {
        match self {
            Self::AddPoints { user, .. }
            | Self::UnlockBadge { user, .. }
            | Self::CompleteSimulation { user, .. } => user,
        }
    }

    /// The effect this write will have once applied, folded into a snapshot.
    fn apply_to(&self, progress: &mut UserProgress) {
        match self {
            Self::AddPoints { delta, .. } => progress.points = (progress.points + delta).max(0),
            Self::UnlockBadge { badge, .. } => {
                progress.badges.insert(badge.clone());
            }
            Self::CompleteSimulation { simulation, .. } => {
                progress.completed_simulations.insert(simulation.clone());
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum WriteError {
    UnknownUser(UserId),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownUser(user) => write!(f, "no progress record for user {user}"),
        }
    }
}

impl std::error::Error for WriteError {}

pub fn apply_write(store: &ProgressStore, write: ProgressWrite) -> Result<(), WriteError> {
    let mut users = store.lock();
    let record = users
        .get_mut(write.user())
        .ok_or_else(|| WriteError::UnknownUser(write.user().clone()))?;
    if record.queued.front() == Some(&write) {
        record.queued.pop_front();
    }
    let tracker = &mut record.tracker;
    match write {
        ProgressWrite::AddPoints {
            delta, activity, ..
        } => tracker.add_points(delta, &activity),
        ProgressWrite::UnlockBadge { badge, .. } => tracker.unlock_badge(&badge),
        ProgressWrite::CompleteSimulation {
            simulation,
            summary,
            ..
        } => tracker.complete_simulation(&simulation, &summary),
    }
    Ok(())
}

/// Applies whatever is already queued without waiting. Returns the number of
/// writes taken off the channel.
pub fn apply_pending(
    rx: &mut mpsc::UnboundedReceiver<ProgressWrite>,
    store: &ProgressStore,
) -> usize {
    let mut taken = 0;
    while let Ok(write) = rx.try_recv() {
        taken += 1;
        if let Err(err) = apply_write(store, write) {
            tracing::warn!("progress write dropped: {err}");
        }
    }
    taken
}

/// Runs until every sender is gone. Failed writes are logged, never retried.
pub async fn run_progress_writer(
    store: ProgressStore,
    mut rx: mpsc::UnboundedReceiver<ProgressWrite>,
) {
    while let Some(write) = rx.recv().await {
        if let Err(err) = apply_write(&store, write) {
            tracing::warn!("progress write dropped: {err}");
        }
    }
    tracing::info!("progress writer stopped");
}

/// Tracker handed to daemon sessions.
///
/// Writes are fire-and-forget. Each one is also kept on the user's record
/// until the writer applies it, and snapshots replay those pending writes
/// over the stored progress, so a session sees its own awards immediately.
pub struct RemoteProgress {
    user: UserId,
    store: ProgressStore,
    tx: WriteTx,
}

impl RemoteProgress {
    pub fn new(user: UserId, store: ProgressStore, tx: WriteTx) -> Self {
        Self { user, store, tx }
    }

    /// Queues under the store lock so the writer cannot apply a write before
    /// it is recorded as pending.
    fn send(&self, write: ProgressWrite) {
        let mut users = self.store.lock();
        if self.tx.send(write.clone()).is_err() {
            tracing::warn!(user = %self.user, "progress writer is gone; write dropped");
            return;
        }
        if let Some(record) = users.get_mut(&self.user) {
            record.queued.push_back(write);
        }
    }
}

impl ProgressTracker for RemoteProgress {
    fn add_points(&mut self, delta: i64, activity: &Activity) {
        self.send(ProgressWrite::AddPoints {
            user: self.user.clone(),
            delta,
            activity: activity.clone(),
        });
    }

    fn unlock_badge(&mut self, badge: &BadgeId) {
        self.send(ProgressWrite::UnlockBadge {
            user: self.user.clone(),
            badge: badge.clone(),
        });
    }

    fn complete_simulation(&mut self, simulation: &SimulationId, summary: &SessionSummary) {
        tracing::info!(
            user = %self.user,
            %simulation,
            score = summary.score,
            "simulation completed"
        );
        self.send(ProgressWrite::CompleteSimulation {
            user: self.user.clone(),
            simulation: simulation.clone(),
            summary: *summary,
        });
    }

    fn return_to_dashboard(&mut self) {
        tracing::debug!(user = %self.user, "returned to dashboard");
    }

    fn snapshot(&self) -> UserProgress {
        let users = self.store.lock();
        let Some(record) = users.get(&self.user) else {
            return UserProgress::default();
        };
        let mut progress = record.tracker.snapshot();
        for write in &record.queued {
            write.apply_to(&mut progress);
        }
        progress
    }
}
