use chrono::{DateTime, Utc};
use drill_core::{Content, EventEnvelope, InMemoryProgress, Session, SessionId, UserId};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

use crate::writer::{ProgressWrite, RemoteProgress};

pub struct UserRecord {
    pub id: UserId,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub tracker: InMemoryProgress,
    /// Writes sent to the writer task and not yet applied to `tracker`, oldest first.
    pub queued: VecDeque<ProgressWrite>,
}

impl UserRecord {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            created_at: Utc::now(),
            tracker: InMemoryProgress::new(),
            queued: VecDeque::new(),
        }
    }
}

pub struct ActiveSession {
    pub session: Session<RemoteProgress>,
    /// Last request that reached this session.
    pub touched: Instant,
}

impl ActiveSession {
    pub fn new(session: Session<RemoteProgress>) -> Self {
        Self {
            session,
            touched: Instant::now(),
        }
    }

    pub fn touch(&mut self) -> &mut Session<RemoteProgress> {
        self.touched = Instant::now();
        &mut self.session
    }
}

pub type ProgressStore = Arc<Mutex<HashMap<UserId, UserRecord>>>;
pub type SharedSessions = Arc<Mutex<HashMap<SessionId, ActiveSession>>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;
pub type WriteTx = mpsc::UnboundedSender<ProgressWrite>;

/// Lock order is `sessions` before `store`. The writer task only takes `store`.
#[derive(Clone)]
pub struct AppState {
    pub content: Arc<Content>,
    pub sessions: SharedSessions,
    pub store: ProgressStore,
    pub event_tx: EventTx,
    pub write_tx: WriteTx,
    pub rng: Arc<Mutex<ChaCha8Rng>>,
}

impl AppState {
    /// Returns the state and the receiving end for the progress writer.
    pub fn new(content: Content, seed: u64) -> (Self, mpsc::UnboundedReceiver<ProgressWrite>) {
        let (event_tx, _) = broadcast::channel(256);
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let state = Self {
            content: Arc::new(content),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            store: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
            write_tx,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        };
        (state, write_rx)
    }

    pub fn tracker_for(&self, user: &UserId) -> RemoteProgress {
        RemoteProgress::new(user.clone(), self.store.clone(), self.write_tx.clone())
    }
}

/// Ends every session untouched for longer than `idle`, the same way
/// `DELETE /sessions/:id` does. Returns how many were dropped.
pub fn sweep_idle_sessions(sessions: &SharedSessions, idle: Duration) -> usize {
    let now = Instant::now();
    let mut sessions = sessions.lock();
    let before = sessions.len();
    sessions.retain(|id, active| {
        if now.duration_since(active.touched) <= idle {
            return true;
        }
        active.session.exit();
        tracing::info!(session = %id, "idle session evicted");
        false
    });
    before - sessions.len()
}

/// Sweeps once per `period` for the life of the daemon.
pub async fn run_session_sweeper(sessions: SharedSessions, idle: Duration, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // discard the immediate first tick
    loop {
        interval.tick().await;
        let evicted = sweep_idle_sessions(&sessions, idle);
        if evicted > 0 {
            tracing::debug!(evicted, "idle sweep finished");
        }
    }
}
