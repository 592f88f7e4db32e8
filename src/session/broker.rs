//! Session broker: the review rendezvous
//!
//! An automated caller creates a session and blocks in
//! [`SessionBroker::await_completion`]; a reviewer, through the HTTP gateway,
//! calls [`SessionBroker::reprocess`] any number of times and finally
//! [`SessionBroker::submit`]. Whichever terminal transition comes first,
//! the submission or the [`TimeoutGuard`], wins. The other is rejected by
//! the status test-and-set on the record.

use super::guard::TimeoutGuard;
use super::store::SessionStore;
use crate::error::{InterludeError, Result};
use crate::events::{Event, EventBroadcaster};
use crate::services::PromptEnhancer;
use crate::types::{Outcome, Resolution, SessionId, SessionRecord, SessionSnapshot};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default fixed deadline for a reviewer decision
pub const DEFAULT_REVIEW_TIMEOUT: Duration = Duration::from_secs(8 * 60);

/// Broker configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Deadline from session creation; not extended by reviewer activity
    pub timeout: Duration,
    /// Lifecycle event channel capacity
    pub event_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REVIEW_TIMEOUT,
            event_capacity: 1000,
        }
    }
}

struct BrokerInner {
    store: SessionStore,
    enhancer: Arc<dyn PromptEnhancer>,
    timeout: Duration,
    events: EventBroadcaster,
}

/// Public face of the review rendezvous
///
/// Cheap to clone; all clones share one store.
#[derive(Clone)]
pub struct SessionBroker {
    inner: Arc<BrokerInner>,
}

impl SessionBroker {
    /// Create a broker around an enhancement backend
    pub fn new(enhancer: Arc<dyn PromptEnhancer>, config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                store: SessionStore::new(),
                enhancer,
                timeout: config.timeout,
                events: EventBroadcaster::new(config.event_capacity),
            }),
        }
    }

    /// Session store (read access for presentation and diagnostics)
    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    /// Lifecycle event broadcaster
    pub fn events(&self) -> &EventBroadcaster {
        &self.inner.events
    }

    /// Enhancement backend shared with the broker
    pub fn enhancer(&self) -> Arc<dyn PromptEnhancer> {
        self.inner.enhancer.clone()
    }

    /// Fixed review deadline
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Number of sessions awaiting a decision
    pub async fn pending_count(&self) -> usize {
        self.inner.store.len().await
    }

    /// Open a new review session and arm its deadline
    ///
    /// Returns immediately with the session id.
    pub async fn create(
        &self,
        initial_content: String,
        fallback_content: String,
        context_blob: String,
        context_refs: Vec<String>,
    ) -> Result<SessionId> {
        let review = self
            .open(initial_content, fallback_content, context_blob, context_refs)
            .await?;
        Ok(review.id())
    }

    /// Like [`create`](Self::create), but already subscribed to the outcome
    ///
    /// The subscription exists before the id is published, so even a
    /// resolution that lands before the caller starts waiting is observed.
    pub async fn open(
        &self,
        initial_content: String,
        fallback_content: String,
        context_blob: String,
        context_refs: Vec<String>,
    ) -> Result<PendingReview> {
        let record = SessionRecord::new(
            initial_content,
            fallback_content,
            context_blob,
            context_refs,
        );
        let id = record.id;

        let slot = self.inner.store.put(record).await?;
        let rx = slot.subscribe();

        let broker = Arc::downgrade(&self.inner);
        let guard = TimeoutGuard::arm(Instant::now() + self.inner.timeout, async move {
            fire_guard(broker, id).await;
        });
        slot.attach_guard(guard).await;

        let timeout_ms = self.inner.timeout.as_millis() as u64;
        info!("Created review session {} (timeout {}ms)", id, timeout_ms);
        self.inner.events.publish(Event::session_created(id, timeout_ms));

        Ok(PendingReview { id, rx })
    }

    /// Wait for the session to resolve
    ///
    /// Every waiter on the same id observes the same resolution. A deadline
    /// expiry surfaces as [`InterludeError::Timeout`] so the caller can fall
    /// back to the original content.
    pub async fn await_completion(&self, id: SessionId) -> Result<Outcome> {
        // Only the receiver survives this block; no lock is held while waiting
        let rx = {
            let slot = self.inner.store.get(id).await?;
            slot.subscribe()
        };

        PendingReview { id, rx }.wait().await
    }

    /// Record the reviewer's decision
    ///
    /// Only the first terminal transition applies; later ones fail with
    /// [`InterludeError::AlreadyResolved`] and have no effect.
    pub async fn submit(&self, id: SessionId, content: String) -> Result<()> {
        let slot = self.inner.store.get(id).await?;

        let outcome = match slot.complete(content).await {
            Some(outcome) => outcome,
            None => {
                debug!("Submit lost the race for session {}", id);
                return Err(InterludeError::AlreadyResolved(id.to_string()));
            }
        };

        slot.disarm_guard().await;
        self.inner.store.remove(id).await;

        let kind = outcome_kind(&outcome);
        info!("Review session {} completed ({})", id, kind);
        self.inner.events.publish(Event::session_completed(id, kind));

        Ok(())
    }

    /// Force the timed-out state, as the deadline guard does
    ///
    /// Fails with [`InterludeError::AlreadyResolved`] if a submission won first.
    pub async fn expire(&self, id: SessionId) -> Result<()> {
        self.inner.expire(id, true).await
    }

    /// Re-run the enhancement on the reviewer's edited text
    ///
    /// On success `current_content` is replaced and returned. On failure the
    /// record is left as it was and the session stays pending. The deadline
    /// is not extended. If the session resolves while the enhancer is
    /// running, the result is discarded and `SessionResolved` is returned.
    pub async fn reprocess(&self, id: SessionId, edited_content: String) -> Result<String> {
        let slot = self.inner.store.get(id).await?;

        let (context_blob, context_refs) = {
            let record = slot.record().await;
            if !record.is_pending() {
                return Err(InterludeError::SessionResolved(id.to_string()));
            }
            (record.context_blob.clone(), record.context_refs.clone())
        };

        let revised = self
            .inner
            .enhancer
            .enhance(&edited_content, &context_blob, &context_refs)
            .await
            .map_err(|e| {
                warn!("Enhancement failed for session {}: {}", id, e);
                match e {
                    InterludeError::ComputationFailed(msg) => InterludeError::ComputationFailed(msg),
                    other => InterludeError::ComputationFailed(other.to_string()),
                }
            })?;

        {
            let mut record = slot.record().await;
            if !record.is_pending() {
                debug!("Session {} resolved during reprocess; discarding result", id);
                return Err(InterludeError::SessionResolved(id.to_string()));
            }
            record.current_content = revised.clone();
        }

        debug!("Reprocessed session {}", id);
        self.inner.events.publish(Event::session_reprocessed(id));

        Ok(revised)
    }

    /// Current view of a pending session
    pub async fn snapshot(&self, id: SessionId) -> Result<SessionSnapshot> {
        let slot = self.inner.store.get(id).await?;
        let record = slot.record().await;
        Ok(SessionSnapshot {
            id,
            current_content: record.current_content.clone(),
            status: record.status,
            created_at: record.created_at,
            timeout: self.inner.timeout,
        })
    }
}

/// A session opened by [`SessionBroker::open`], with its outcome subscription
pub struct PendingReview {
    id: SessionId,
    rx: watch::Receiver<Option<Resolution>>,
}

impl PendingReview {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Wait for the session to resolve
    pub async fn wait(mut self) -> Result<Outcome> {
        let id = self.id;
        let resolution = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| InterludeError::SessionNotFound(id.to_string()))?
            .clone();

        match resolution {
            Some(Resolution::Completed(outcome)) => Ok(outcome),
            Some(Resolution::TimedOut) => Err(InterludeError::Timeout(id.to_string())),
            None => Err(InterludeError::SessionNotFound(id.to_string())),
        }
    }
}

impl BrokerInner {
    /// `disarm` is false when called from the guard task itself, which must
    /// not abort its own handle.
    async fn expire(&self, id: SessionId, disarm: bool) -> Result<()> {
        let slot = self.store.get(id).await?;

        if !slot.expire().await {
            return Err(InterludeError::AlreadyResolved(id.to_string()));
        }

        if disarm {
            slot.disarm_guard().await;
        }
        self.store.remove(id).await;

        info!("Review session {} timed out", id);
        self.events.publish(Event::session_timed_out(id));
        Ok(())
    }
}

/// Deadline callback; holds the broker weakly so pending timers never keep it alive
async fn fire_guard(broker: Weak<BrokerInner>, id: SessionId) {
    let Some(inner) = broker.upgrade() else {
        return;
    };

    if let Err(e) = inner.expire(id, false).await {
        // Reviewer beat the clock
        debug!("Timeout guard for {} was a no-op: {}", id, e);
    }
}

fn outcome_kind(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Edited(_) => "edited",
        Outcome::Original(_) => "original",
        Outcome::EndConversation => "end_conversation",
    }
}
