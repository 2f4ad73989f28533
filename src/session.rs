use crate::event::Event;
use crate::extract::History;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// Conversation identity whose events accumulate for the life of the process.
pub struct Session {
    key: SessionKey,
    log: Mutex<Vec<Event>>,
}

/// Exclusive access to a session's event log.
///
/// Holding one serialises invocations for the session; other sessions are
/// unaffected.
pub struct SessionLog<'a> {
    events: MutexGuard<'a, Vec<Event>>,
}

/// In-memory registry of sessions. Entries are never evicted.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionKey, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `(user_id, session_id)`, creating it when absent.
    pub async fn get_or_create(&self, user_id: &str, session_id: &str) -> Arc<Session> {
        let key = SessionKey::new(user_id, session_id);
        let mut sessions = self.sessions.lock().await;

        if let Some(session) = sessions.get(&key) {
            return Arc::clone(session);
        }

        info!(user_id, session_id, "created new session");
        let session = Arc::new(Session {
            key: key.clone(),
            log: Mutex::new(Vec::new()),
        });
        sessions.insert(key, Arc::clone(&session));
        session
    }
}

impl Session {
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Waits for any in-flight invocation on this session to finish.
    pub async fn lock(&self) -> SessionLog<'_> {
        SessionLog {
            events: self.log.lock().await,
        }
    }
}

impl SessionLog<'_> {
    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl History for SessionLog<'_> {
    fn events(&self) -> &[Event] {
        &self.events
    }
}
