//! Interlude - Human-in-the-loop prompt review for agent tool calls
//!
//! An agent calls the `interlude.review_prompt` MCP tool; Interlude improves
//! the prompt with an LLM, opens a review session and blocks until a human
//! accepts, edits, or rejects it in the browser, or the review window closes.
//!
//! # Architecture
//!
//! - **Types**: session ids, records, outcomes
//! - **Session**: store, deadline guard and the rendezvous broker
//! - **Services**: prompt enhancement (Anthropic API)
//! - **API**: HTTP gateway used by the review page
//! - **MCP**: JSON-RPC stdio server used by the agent
//!
//! # Example
//!
//! ```ignore
//! use interlude_core::{BrokerConfig, LlmService, SessionBroker};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> interlude_core::Result<()> {
//!     let broker = SessionBroker::new(Arc::new(LlmService::with_default()?), BrokerConfig::default());
//!
//!     let id = broker
//!         .create("Refactor the parser".into(), "fix parser".into(), String::new(), vec![])
//!         .await?;
//!
//!     // A reviewer submits through the gateway; the caller waits here
//!     let outcome = broker.await_completion(id).await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod mcp;
pub mod services;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig};
pub use config::InterludeConfig;
pub use error::{InterludeError, Result};
pub use events::{Event, EventBroadcaster, EventType};
pub use mcp::{McpServer, ToolHandler};
pub use services::{LlmConfig, LlmService, PromptEnhancer};
pub use session::{BrokerConfig, PendingReview, SessionBroker, SessionStore};
pub use types::{Outcome, SessionId, SessionRecord, SessionSnapshot, SessionStatus};
