//! Error types for Interlude
//!
//! This module provides structured error definitions using thiserror. The
//! session variants mirror the rendezvous protocol: callers can tell a
//! missing session from a lost race, and a reviewer timeout from a failure.

use thiserror::Error;

/// Main error type for Interlude operations
#[derive(Error, Debug)]
pub enum InterludeError {
    /// Session id is unknown, or its rendezvous already resolved and was reaped
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A terminal transition was attempted on a session that already left Pending
    #[error("Session already completed or timed out: {0}")]
    AlreadyResolved(String),

    /// Reprocess was attempted on a session that is no longer Pending
    #[error("Session already resolved, no further edits possible: {0}")]
    SessionResolved(String),

    /// Store insert collided with an existing id
    #[error("Duplicate session id: {0}")]
    DuplicateId(String),

    /// The external enhancement computation failed
    #[error("Enhancement failed: {0}")]
    ComputationFailed(String),

    /// No reviewer decision arrived before the deadline
    #[error("Review timed out: {0}")]
    Timeout(String),

    /// Session id could not be parsed
    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),

    /// LLM API request failed
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// MCP protocol error
    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl InterludeError {
    /// Whether the reviewer may retry the failed operation on the same session
    pub fn is_retriable(&self) -> bool {
        matches!(self, InterludeError::ComputationFailed(_))
    }
}

/// Result type alias for Interlude operations
pub type Result<T> = std::result::Result<T, InterludeError>;

/// Convert anyhow::Error to InterludeError
impl From<anyhow::Error> for InterludeError {
    fn from(err: anyhow::Error) -> Self {
        InterludeError::Other(err.to_string())
    }
}
