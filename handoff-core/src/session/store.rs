//! SessionStore: the single shared map of capture sessions
//!
//! All mutations run under one write lock, so the read-merge-write of a
//! callback is never interleaved with another callback for the same session.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::error::SessionError;

use super::state::{Destination, Session, SessionId};

/// In-memory session store with optional time-based expiry
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    ttl: Option<Duration>,
}

impl SessionStore {
    /// Create a store that keeps sessions until the process exits
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: None,
        }
    }

    /// Create a store whose sessions expire `ttl` after creation
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        self.ttl
            .is_some_and(|ttl| now - session.created_at >= ttl)
    }

    /// Create a session with a freshly minted id
    pub async fn create(&self, destination: Destination) -> SessionId {
        let mut sessions = self.sessions.write().await;
        let id = loop {
            let candidate = SessionId::generate();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        sessions.insert(id.clone(), Session::new(id.clone(), destination));
        id
    }

    /// Register a session under an id minted elsewhere
    pub async fn insert_with_id(
        &self,
        id: SessionId,
        destination: Destination,
    ) -> Result<SessionId, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(SessionError::AlreadyExists(id.to_string()));
        }
        sessions.insert(id.clone(), Session::new(id.clone(), destination));
        Ok(id)
    }

    /// Snapshot of a session
    pub async fn get(&self, id: &str) -> Result<Session, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .filter(|s| !self.is_expired(s, Utc::now()))
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Run a partial update and return the post-update snapshot
    ///
    /// If `f` fails, whatever it changed is discarded.
    pub async fn update<F, R>(&self, id: &str, f: F) -> Result<(Session, R), SessionError>
    where
        F: FnOnce(&mut Session) -> Result<R, SessionError>,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .filter(|s| !self.is_expired(s, Utc::now()))
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let mut draft = session.clone();
        let result = f(&mut draft)?;
        *session = draft;
        Ok((session.clone(), result))
    }

    /// Remove sessions created before `cutoff`, returning how many went
    pub async fn evict_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.created_at >= cutoff);
        before - sessions.len()
    }

    /// Remove expired sessions according to the configured TTL
    pub async fn evict_expired(&self) -> usize {
        match self.ttl {
            Some(ttl) => self.evict_older_than(Utc::now() - ttl).await,
            None => 0,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
