//! Per-session conversation state with serialized access.
//!
//! Each session key owns one [`ConversationState`] behind its own async
//! mutex. Calls on the same key run one at a time; different keys proceed
//! concurrently.
//!
//! At most [`MAX_SESSIONS`] sessions are held. Creating one more evicts the
//! least recently used session, preferring one with no call in flight.

use crate::orchestrator::ConversationOrchestrator;
use crate::response::{self, Reply};
use crate::state::ConversationState;
use factchat_core::message::SessionId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Maximum number of sessions held in memory.
pub const MAX_SESSIONS: usize = 1_000;

type SharedState = Arc<Mutex<ConversationState>>;

struct SessionEntry {
    state: SharedState,
    last_used: AtomicU64,
}

impl SessionEntry {
    /// No caller holds a handle besides the map.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.state) == 1
    }
}

pub struct SessionManager {
    orchestrator: Arc<ConversationOrchestrator>,
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    clock: AtomicU64,
}

impl SessionManager {
    pub fn new(orchestrator: Arc<ConversationOrchestrator>) -> Self {
        Self {
            orchestrator,
            sessions: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    pub fn orchestrator(&self) -> &ConversationOrchestrator {
        &self.orchestrator
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    async fn session(&self, id: &SessionId) -> SharedState {
        if let Some(entry) = self.sessions.read().await.get(id) {
            entry.last_used.store(self.tick(), Ordering::Relaxed);
            return entry.state.clone();
        }

        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get(id) {
            entry.last_used.store(self.tick(), Ordering::Relaxed);
            return entry.state.clone();
        }

        if sessions.len() >= MAX_SESSIONS {
            evict_one(&mut sessions);
        }

        debug!(session = %id, "Session created");
        let state = Arc::new(Mutex::new(ConversationState::new()));
        sessions.insert(
            id.clone(),
            SessionEntry {
                state: state.clone(),
                last_used: AtomicU64::new(self.tick()),
            },
        );
        state
    }

    /// Answer within session `id`.
    pub async fn answer(&self, id: &SessionId, question: &str) -> String {
        let session = self.session(id).await;
        let mut state = session.lock().await;
        self.orchestrator.answer(&mut state, question).await
    }

    /// Answer within session `id` and tag the reply.
    ///
    /// Image requests never touch history, so they skip the session lock.
    pub async fn respond(&self, id: &SessionId, question: &str) -> Reply {
        if let Some(prompt) = response::image_prompt(question) {
            return self.orchestrator.image_reply(prompt).await;
        }

        let session = self.session(id).await;
        let mut state = session.lock().await;
        self.orchestrator.respond(&mut state, question).await
    }

    /// Forget session `id`. A call already in flight finishes against the
    /// discarded state.
    pub async fn reset(&self, id: &SessionId) {
        if self.sessions.write().await.remove(id).is_some() {
            debug!(session = %id, "Session cleared");
        }
    }

    /// A copy of the current state of session `id`.
    pub async fn snapshot(&self, id: &SessionId) -> ConversationState {
        let existing = self.sessions.read().await.get(id).map(|e| e.state.clone());
        match existing {
            Some(session) => session.lock().await.clone(),
            None => ConversationState::new(),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Drop the least recently used idle session, or the least recently used
/// one when every session is busy.
fn evict_one(sessions: &mut HashMap<SessionId, SessionEntry>) {
    let last_used = |e: &SessionEntry| e.last_used.load(Ordering::Relaxed);
    let victim = sessions
        .iter()
        .filter(|(_, e)| e.is_idle())
        .min_by_key(|(_, e)| last_used(e))
        .or_else(|| sessions.iter().min_by_key(|(_, e)| last_used(e)))
        .map(|(id, _)| id.clone());

    if let Some(id) = victim {
        sessions.remove(&id);
        info!(session = %id, "Evicted least recently used session");
    }
}
