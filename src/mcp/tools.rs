//! MCP tool implementations
//!
//! A single tool, `interlude.review_prompt`, hands a prompt to a human
//! reviewer and blocks the agent until they decide or the deadline passes.

use crate::error::{InterludeError, Result};
use crate::session::SessionBroker;
use crate::types::{Outcome, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const REVIEW_TOOL: &str = "interlude.review_prompt";

/// Longest the first enhancement may take before the raw prompt is reviewed
pub const DEFAULT_ENHANCE_TIMEOUT: Duration = Duration::from_secs(60);

/// Tool schema definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,

    pub description: String,

    /// JSON Schema for input parameters
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ReviewParams {
    prompt: String,
    #[serde(default)]
    context: String,
    #[serde(default)]
    context_refs: Vec<String>,
}

/// Tool handler that dispatches to the review flow
pub struct ToolHandler {
    broker: SessionBroker,
    review_base_url: String,
    enhance_timeout: Duration,
}

impl ToolHandler {
    /// `review_base_url` is the public gateway URL, without trailing slash
    pub fn new(broker: SessionBroker, review_base_url: String) -> Self {
        Self {
            broker,
            review_base_url,
            enhance_timeout: DEFAULT_ENHANCE_TIMEOUT,
        }
    }

    /// Bound the enhancement that runs before a session is opened
    pub fn with_enhance_timeout(mut self, timeout: Duration) -> Self {
        self.enhance_timeout = timeout;
        self
    }

    pub fn broker(&self) -> &SessionBroker {
        &self.broker
    }

    /// Page the reviewer opens for a session
    pub fn review_url(&self, id: SessionId) -> String {
        format!("{}/review?session={}", self.review_base_url, id)
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        vec![Tool {
            name: REVIEW_TOOL.to_string(),
            description: "Ask a human to review, edit, or reject a prompt before it is used. \
                Blocks until the reviewer decides or the review window closes."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "The prompt to review"
                    },
                    "context": {
                        "type": "string",
                        "description": "Conversation context used to improve the prompt"
                    },
                    "context_refs": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "File paths or references relevant to the prompt"
                    }
                },
                "required": ["prompt"]
            }),
        }]
    }

    pub async fn execute(&self, tool_name: &str, params: Value) -> Result<Value> {
        debug!("Executing tool: {}", tool_name);

        match tool_name {
            REVIEW_TOOL => self.review_prompt(params).await,
            _ => {
                warn!("Unknown tool: {}", tool_name);
                Err(InterludeError::McpProtocol(format!(
                    "Unknown tool: {}",
                    tool_name
                )))
            }
        }
    }

    async fn review_prompt(&self, params: Value) -> Result<Value> {
        let params: ReviewParams = serde_json::from_value(params)?;

        // The reviewer still gets the raw prompt if enhancement fails or stalls
        let enhancer = self.broker.enhancer();
        let enhancement = tokio::time::timeout(
            self.enhance_timeout,
            enhancer.enhance(&params.prompt, &params.context, &params.context_refs),
        )
        .await;
        let initial = match enhancement {
            Ok(Ok(enhanced)) => enhanced,
            Ok(Err(e)) => {
                warn!("Prompt enhancement failed, reviewing original: {}", e);
                params.prompt.clone()
            }
            Err(_) => {
                warn!(
                    "Prompt enhancement exceeded {:?}, reviewing original",
                    self.enhance_timeout
                );
                params.prompt.clone()
            }
        };

        let review = self
            .broker
            .open(
                initial,
                params.prompt.clone(),
                params.context,
                params.context_refs,
            )
            .await?;
        let id = review.id();

        info!("Review pending at {}", self.review_url(id));

        match review.wait().await {
            Ok(Outcome::Edited(prompt)) => Ok(json!({ "status": "edited", "prompt": prompt })),
            Ok(Outcome::Original(prompt)) => {
                Ok(json!({ "status": "original", "prompt": prompt }))
            }
            Ok(Outcome::EndConversation) => Ok(json!({
                "status": "end_conversation",
                "message": "The reviewer ended the conversation. Stop and wait for the user."
            })),
            Err(InterludeError::Timeout(_)) => {
                info!("Review {} timed out, continuing with original prompt", id);
                Ok(json!({ "status": "timeout", "prompt": params.prompt }))
            }
            Err(e) => Err(e),
        }
    }
}
