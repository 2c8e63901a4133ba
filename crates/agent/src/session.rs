//! Per-session conversation state.
//!
//! Every session id owns one [`ConversationState`]. Sessions are created lazily in `Idle`,
//! restart from `Idle` once they have been inactive longer than the idle timeout, and are
//! removed by [`SessionStore::purge_expired`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use slotbot_core::dialogue::ConversationState;
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session capacity exhausted ({max_sessions} active sessions)")]
    CapacityExhausted { max_sessions: usize },
}

#[derive(Clone, Debug)]
struct SessionEntry {
    state: ConversationState,
    last_active: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: ConversationState,
    pub last_active: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), idle_timeout, max_sessions }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Runs `transition` against the session's state while holding the store lock.
    ///
    /// The closure sees the whole transition in isolation: a concurrent call on the same
    /// session waits until this one has written its new state back.
    pub fn with_session<T>(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        transition: impl FnOnce(&mut ConversationState) -> T,
    ) -> Result<T, SessionError> {
        let mut sessions = self.lock();

        if !sessions.contains_key(session_id) && sessions.len() >= self.max_sessions {
            let purged = purge_expired_locked(&mut sessions, now, self.idle_timeout);
            debug!(
                event_name = "session.capacity.purge",
                purged,
                remaining = sessions.len(),
                "purged expired sessions to make room"
            );
            if sessions.len() >= self.max_sessions {
                return Err(SessionError::CapacityExhausted { max_sessions: self.max_sessions });
            }
        }

        let entry = sessions.entry(session_id.to_owned()).or_insert_with(|| {
            debug!(event_name = "session.created", session_id, "session created");
            SessionEntry { state: ConversationState::Idle, last_active: now }
        });

        if is_expired(entry.last_active, now, self.idle_timeout) {
            debug!(event_name = "session.expired", session_id, "expired session restarted");
            entry.state.reset();
        }

        let output = transition(&mut entry.state);
        entry.last_active = now;
        Ok(output)
    }

    /// Removes every session idle for longer than the timeout and returns how many went.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.lock();
        purge_expired_locked(&mut sessions, now, self.idle_timeout)
    }

    pub fn reset(&self, session_id: &str) -> bool {
        let mut sessions = self.lock();
        match sessions.get_mut(session_id) {
            Some(entry) => {
                entry.state.reset();
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.lock().get(session_id).map(|entry| SessionSnapshot {
            session_id: session_id.to_owned(),
            state: entry.state.clone(),
            last_active: entry.last_active,
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_expired(last_active: DateTime<Utc>, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
    (now - last_active).to_std().map(|idle| idle > idle_timeout).unwrap_or(false)
}

fn purge_expired_locked(
    sessions: &mut HashMap<String, SessionEntry>,
    now: DateTime<Utc>,
    idle_timeout: Duration,
) -> usize {
    let before = sessions.len();
    sessions.retain(|_, entry| !is_expired(entry.last_active, now, idle_timeout));
    before - sessions.len()
}
