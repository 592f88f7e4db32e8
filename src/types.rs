//! Core data types for Interlude
//!
//! Defines the session record at the center of the review rendezvous, its
//! identifier, its status machine and the outcomes a reviewer can produce.

use crate::error::InterludeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reserved submission meaning "proceed with the original, unedited content"
pub const USE_ORIGINAL_MARKER: &str = "__USE_ORIGINAL__";

/// Reserved submission meaning "stop the automated work altogether"
pub const END_CONVERSATION_MARKER: &str = "__END_CONVERSATION__";

/// Unique identifier for review sessions
///
/// 128 random bits from a cryptographically secure generator. The id is the
/// only access control on a session, so it must not be guessable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SessionId(u128);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(rand::random::<u128>())
    }

    /// Parse a session ID from its 32-character hex form
    pub fn parse(s: &str) -> Result<Self, InterludeError> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InterludeError::InvalidSessionId(s.to_string()));
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| InterludeError::InvalidSessionId(s.to_string()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for SessionId {
    type Error = InterludeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl std::str::FromStr for SessionId {
    type Err = InterludeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Lifecycle status of a session
///
/// Monotonic: `Pending` moves to exactly one of the terminal states and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for the reviewer
    Pending,
    /// Reviewer submitted a decision
    Completed,
    /// Deadline passed with no decision
    TimedOut,
}

impl SessionStatus {
    /// Check if this status is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Pending)
    }
}

/// What the reviewer decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Outcome {
    /// Reviewer submitted this text
    Edited(String),
    /// Reviewer chose the original; carries the fallback content
    Original(String),
    /// Reviewer asked the caller to abort further automated work
    EndConversation,
}

impl Outcome {
    /// Map a raw submission to an outcome, honoring the reserved markers
    pub fn from_submission(content: String, fallback: &str) -> Self {
        match content.as_str() {
            USE_ORIGINAL_MARKER => Outcome::Original(fallback.to_string()),
            END_CONVERSATION_MARKER => Outcome::EndConversation,
            _ => Outcome::Edited(content),
        }
    }

    /// Content the caller should proceed with, if any
    pub fn content(&self) -> Option<&str> {
        match self {
            Outcome::Edited(text) | Outcome::Original(text) => Some(text),
            Outcome::EndConversation => None,
        }
    }
}

/// Terminal transition applied to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Reviewer decision
    Completed(Outcome),
    /// Deadline expiry
    TimedOut,
}

impl Resolution {
    fn status(&self) -> SessionStatus {
        match self {
            Resolution::Completed(_) => SessionStatus::Completed,
            Resolution::TimedOut => SessionStatus::TimedOut,
        }
    }
}

/// One review rendezvous
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Opaque id handed to the reviewer
    pub id: SessionId,

    /// Artifact under review; replaced by reprocess while pending
    pub current_content: String,

    /// Original, unedited artifact
    pub fallback_content: String,

    /// Conversation context used to (re)compute content
    pub context_blob: String,

    /// Auxiliary context pointers (file paths, symbols)
    pub context_refs: Vec<String>,

    /// Lifecycle status
    pub status: SessionStatus,

    /// Creation time; origin of the deadline
    pub created_at: DateTime<Utc>,

    /// Set exactly once, only when completed
    pub outcome: Option<Outcome>,
}

impl SessionRecord {
    /// Create a new pending record with a fresh id
    pub fn new(
        initial_content: String,
        fallback_content: String,
        context_blob: String,
        context_refs: Vec<String>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            current_content: initial_content,
            fallback_content,
            context_blob,
            context_refs,
            status: SessionStatus::Pending,
            created_at: Utc::now(),
            outcome: None,
        }
    }

    /// Check if the record still accepts edits and decisions
    pub fn is_pending(&self) -> bool {
        self.status == SessionStatus::Pending
    }

    /// Test-and-set on status
    ///
    /// Applies the terminal transition and returns true only if the record
    /// was still pending. A false return leaves the record untouched.
    pub fn resolve(&mut self, resolution: &Resolution) -> bool {
        if !self.is_pending() {
            return false;
        }

        self.status = resolution.status();
        if let Resolution::Completed(outcome) = resolution {
            self.outcome = Some(outcome.clone());
        }
        true
    }
}

/// Read-only view of a pending session, for presentation
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub current_content: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display_and_parse() {
        let id = SessionId::new();
        let s = id.to_string();
        assert_eq!(s.len(), 32);
        assert_eq!(SessionId::parse(&s).unwrap(), id);
    }

    #[test]
    fn test_session_id_rejects_garbage() {
        assert!(SessionId::parse("not-an-id").is_err());
        assert!(SessionId::parse("").is_err());
        assert!(SessionId::parse(&"g".repeat(32)).is_err());
        assert!(SessionId::parse("+0000000000000000000000000000001").is_err());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_outcome_from_markers() {
        assert_eq!(
            Outcome::from_submission(USE_ORIGINAL_MARKER.to_string(), "orig"),
            Outcome::Original("orig".to_string())
        );
        assert_eq!(
            Outcome::from_submission(END_CONVERSATION_MARKER.to_string(), "orig"),
            Outcome::EndConversation
        );
        assert_eq!(
            Outcome::from_submission("draft".to_string(), "orig"),
            Outcome::Edited("draft".to_string())
        );
    }

    #[test]
    fn test_resolve_is_one_shot() {
        let mut record = SessionRecord::new(
            "draft".to_string(),
            "orig".to_string(),
            String::new(),
            vec![],
        );

        assert!(record.resolve(&Resolution::Completed(Outcome::Edited("a".into()))));
        assert_eq!(record.status, SessionStatus::Completed);
        assert_eq!(record.outcome, Some(Outcome::Edited("a".into())));

        // Second transition is rejected and leaves state intact
        assert!(!record.resolve(&Resolution::TimedOut));
        assert_eq!(record.status, SessionStatus::Completed);
        assert_eq!(record.outcome, Some(Outcome::Edited("a".into())));
    }

    #[test]
    fn test_timeout_sets_no_outcome() {
        let mut record =
            SessionRecord::new("x".to_string(), "y".to_string(), String::new(), vec![]);
        assert!(record.resolve(&Resolution::TimedOut));
        assert_eq!(record.status, SessionStatus::TimedOut);
        assert!(record.outcome.is_none());
        assert!(record.status.is_terminal());
    }
}
