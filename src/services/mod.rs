//! Services layer for Interlude
//!
//! Provides the prompt enhancement seam and its LLM-backed implementation.

pub mod enhancer;
pub mod llm;

pub use enhancer::{PromptEnhancer, UnavailableEnhancer};
pub use llm::{LlmConfig, LlmService};
