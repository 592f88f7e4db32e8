//! Concurrent registry of pending review sessions
//!
//! The map itself sits behind one async `RwLock`; each entry carries its own
//! record mutex and completion channel so that a state transition on one
//! session never waits on another session's work.

use super::guard::TimeoutGuard;
use crate::error::{InterludeError, Result};
use crate::types::{Outcome, Resolution, SessionId, SessionRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard, RwLock};
use tracing::debug;

/// Store entry: one record plus the machinery of its rendezvous
pub struct SessionSlot {
    id: SessionId,
    record: Mutex<SessionRecord>,
    completion: watch::Sender<Option<Resolution>>,
    guard: Mutex<Option<TimeoutGuard>>,
}

impl SessionSlot {
    fn new(record: SessionRecord) -> Self {
        let (completion, _rx) = watch::channel(None);
        Self {
            id: record.id,
            record: Mutex::new(record),
            completion,
            guard: Mutex::new(None),
        }
    }

    /// Session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Lock the record for a short critical section
    ///
    /// Callers must not hold the guard across an `.await` on anything other
    /// than this lock.
    pub async fn record(&self) -> MutexGuard<'_, SessionRecord> {
        self.record.lock().await
    }

    /// Subscribe to the completion signal
    pub fn subscribe(&self) -> watch::Receiver<Option<Resolution>> {
        self.completion.subscribe()
    }

    /// Complete with a reviewer submission, mapping the reserved markers
    ///
    /// Returns the outcome if this call won the transition.
    pub async fn complete(&self, content: String) -> Option<Outcome> {
        let mut record = self.record.lock().await;
        if !record.is_pending() {
            return None;
        }
        let outcome = Outcome::from_submission(content, &record.fallback_content);
        let resolution = Resolution::Completed(outcome.clone());
        record.resolve(&resolution);
        // Published under the record lock so the status and the signal agree
        self.completion.send_replace(Some(resolution));
        Some(outcome)
    }

    /// Force the timed-out state. Returns true if this call won the transition.
    pub async fn expire(&self) -> bool {
        let mut record = self.record.lock().await;
        if !record.resolve(&Resolution::TimedOut) {
            return false;
        }
        self.completion.send_replace(Some(Resolution::TimedOut));
        true
    }

    /// Attach the deadline timer armed for this session
    pub(crate) async fn attach_guard(&self, guard: TimeoutGuard) {
        // Held across the store so a racing submit either sees the guard or
        // is seen here. Lock order is always record, then guard.
        let record = self.record.lock().await;
        if !record.is_pending() {
            guard.disarm();
            return;
        }
        *self.guard.lock().await = Some(guard);
    }

    /// Cancel the deadline timer, if one is attached
    pub(crate) async fn disarm_guard(&self) {
        if let Some(guard) = self.guard.lock().await.take() {
            guard.disarm();
        }
    }
}

/// Concurrent-safe mapping from session id to session slot
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<SessionSlot>>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a new record
    ///
    /// Fails with `DuplicateId` instead of overwriting an existing session.
    pub async fn put(&self, record: SessionRecord) -> Result<Arc<SessionSlot>> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&record.id) {
            return Err(InterludeError::DuplicateId(record.id.to_string()));
        }

        let slot = Arc::new(SessionSlot::new(record));
        sessions.insert(slot.id(), slot.clone());
        Ok(slot)
    }

    /// Get a session by id
    pub async fn get(&self, id: SessionId) -> Result<Arc<SessionSlot>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| InterludeError::SessionNotFound(id.to_string()))
    }

    /// Remove a session. Removing an unknown id is a no-op.
    pub async fn remove(&self, id: SessionId) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&id).is_some() {
            debug!("Removed session {} from store", id);
        }
    }

    /// Check whether a session is present
    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Number of sessions currently held
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
