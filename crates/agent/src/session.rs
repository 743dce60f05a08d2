//! Session history: bounded per-session conversation memory.
//!
//! Sessions live in an injected [`SessionStore`]. A turn checks out its
//! session and holds the guard until the reply is appended, so two turns on
//! the same session id run one after the other while turns on different
//! sessions never wait on each other.

use async_trait::async_trait;
use sage_core::Exchange;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Exclusive access to one session for the duration of a turn.
pub type SessionGuard = OwnedMutexGuard<Session>;

/// An ordered, size-bounded list of exchanges.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    history: VecDeque<Exchange>,
    max_history: usize,
}

impl Session {
    pub fn new(id: impl Into<String>, max_history: usize) -> Self {
        Self {
            id: id.into(),
            history: VecDeque::with_capacity(max_history + 1),
            max_history,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The retained exchanges, oldest first.
    pub fn history(&self) -> Vec<Exchange> {
        self.history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Append the newest exchange, evicting the oldest while over the bound.
    pub fn append(&mut self, exchange: Exchange) {
        self.history.push_back(exchange);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }
}

/// Storage for sessions, keyed by caller-supplied id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get-or-create the session and lock it for one turn.
    async fn checkout(&self, session_id: &str) -> SessionGuard;

    /// A copy of the session's history, or `None` for an unknown id.
    async fn snapshot(&self, session_id: &str) -> Option<Vec<Exchange>>;

    /// Drop a session once no turn holds it. Returns whether it existed.
    async fn evict(&self, session_id: &str) -> bool;

    /// Number of live sessions.
    async fn len(&self) -> usize;
}

/// Process-lifetime, in-memory session store.
///
/// Sessions are never expired; they live until evicted or the process exits.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    max_history: usize,
}

impl InMemorySessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history,
        }
    }

    async fn slot(&self, session_id: &str) -> Arc<Mutex<Session>> {
        if let Some(slot) = self.sessions.read().await.get(session_id) {
            return slot.clone();
        }
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(session_id, self.max_history))))
            .clone()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn checkout(&self, session_id: &str) -> SessionGuard {
        loop {
            let slot = self.slot(session_id).await;
            let guard = slot.clone().lock_owned().await;
            // The session may have been evicted while we waited for it.
            let current = self
                .sessions
                .read()
                .await
                .get(session_id)
                .is_some_and(|live| Arc::ptr_eq(live, &slot));
            if current {
                return guard;
            }
        }
    }

    async fn snapshot(&self, session_id: &str) -> Option<Vec<Exchange>> {
        let slot = self.sessions.read().await.get(session_id).cloned()?;
        let session = slot.lock().await;
        Some(session.history())
    }

    async fn evict(&self, session_id: &str) -> bool {
        let Some(slot) = self.sessions.read().await.get(session_id).cloned() else {
            return false;
        };
        // Wait for any in-flight turn to finish before dropping the session.
        let _guard = slot.lock().await;
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(session_id)
            .is_some_and(|live| Arc::ptr_eq(live, &slot))
        {
            sessions.remove(session_id);
            true
        } else {
            false
        }
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
