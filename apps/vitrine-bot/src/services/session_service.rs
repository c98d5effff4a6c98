use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vitrine_shared::UserId;

use crate::models::session::Session;

/// In-memory session store, the engine's working memory.
///
/// All mutation goes through `update`/`with`, which run the closure
/// under the store lock. The lock is never held across an await, so a
/// "check flag then set flag" sequence inside one closure is atomic
/// with respect to every other task touching the same user.
#[derive(Clone, Default)]
pub struct SessionService {
    sessions: Arc<Mutex<HashMap<UserId, Session>>>,
}

impl SessionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the user's session, creating a default one if
    /// none exists (sessions are born lazily on first interaction).
    pub fn update<R>(&self, user_id: UserId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        f(sessions.entry(user_id).or_default())
    }

    /// Run `f` against an existing session only. Polling tasks use this
    /// so a closed ticket is never resurrected by a late tick.
    pub fn with<R>(&self, user_id: UserId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        sessions.get_mut(&user_id).map(f)
    }

    pub fn get(&self, user_id: UserId) -> Option<Session> {
        self.sessions
            .lock()
            .expect("session lock poisoned")
            .get(&user_id)
            .cloned()
    }

    pub fn remove(&self, user_id: UserId) {
        self.sessions
            .lock()
            .expect("session lock poisoned")
            .remove(&user_id);
    }
}
