//! Prompt enhancement seam
//!
//! The broker does not know how prompts are rewritten; it only calls this
//! trait. `LlmService` is the production implementation.

use crate::error::{InterludeError, Result};
use async_trait::async_trait;

/// Turns a prompt plus conversation context into a revised prompt
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromptEnhancer: Send + Sync {
    /// Produce a revised prompt
    ///
    /// `context_refs` are auxiliary pointers (file paths, symbols) supplied by
    /// the code index; implementations may ignore them.
    async fn enhance(&self, prompt: &str, context: &str, context_refs: &[String])
        -> Result<String>;
}

/// Stand-in used when no enhancement backend is configured
///
/// Every call fails, so reviewers see the raw prompt and reprocess reports
/// the reason.
pub struct UnavailableEnhancer {
    reason: String,
}

impl UnavailableEnhancer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PromptEnhancer for UnavailableEnhancer {
    async fn enhance(&self, _: &str, _: &str, _: &[String]) -> Result<String> {
        Err(InterludeError::LlmApi(self.reason.clone()))
    }
}
