//! LLM service for prompt enhancement
//!
//! Rewrites a user prompt into a clearer, more complete one using Claude,
//! grounded in the conversation so far and any code references the caller
//! attached.

use super::enhancer::PromptEnhancer;
use crate::config::LlmSettings;
use crate::error::{InterludeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Configuration for LLM service
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Anthropic API key
    pub api_key: String,

    /// Model to use
    pub model: String,

    /// Max tokens for responses
    pub max_tokens: usize,

    /// Temperature for sampling
    pub temperature: f32,

    /// Upper bound on one API round trip, connect included
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::from_settings(&LlmSettings::default())
    }
}

impl LlmConfig {
    /// Build from file settings; the API key always comes from ANTHROPIC_API_KEY
    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self {
            api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

/// LLM-backed prompt enhancer
pub struct LlmService {
    config: LlmConfig,
    client: reqwest::Client,
}

/// Anthropic API message format
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: usize,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Anthropic API response format
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    text: String,
}

impl LlmService {
    /// Create a new LLM service with custom config
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(InterludeError::Config(config::ConfigError::Message(
                "ANTHROPIC_API_KEY not set".to_string(),
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { config, client })
    }

    /// Create with default config
    pub fn with_default() -> Result<Self> {
        Self::new(LlmConfig::default())
    }

    /// Rewrite `prompt` using the conversation and code references
    pub async fn enhance_prompt(
        &self,
        prompt: &str,
        context: &str,
        context_refs: &[String],
    ) -> Result<String> {
        debug!(
            "Enhancing prompt ({} chars, {} refs)",
            prompt.len(),
            context_refs.len()
        );

        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: build_enhancement_prompt(prompt, context, context_refs),
            }],
        };

        let response = self.call_api(&request).await?;
        extract_enhanced_prompt(&response)
    }

    /// Make an API call to Claude
    async fn call_api(&self, request: &AnthropicRequest) -> Result<String> {
        debug!("Calling Anthropic API");

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(InterludeError::LlmApi(format!(
                "API request failed with status {}: {}",
                status, error_text
            )));
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| InterludeError::LlmApi(format!("Failed to parse response: {}", e)))?;

        api_response
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| InterludeError::LlmApi("Empty response from API".to_string()))
    }
}

#[async_trait]
impl PromptEnhancer for LlmService {
    async fn enhance(
        &self,
        prompt: &str,
        context: &str,
        context_refs: &[String],
    ) -> Result<String> {
        self.enhance_prompt(prompt, context, context_refs).await
    }
}

const SYSTEM_PROMPT: &str = "You improve prompts written for an AI coding assistant. \
Keep the author's intent and voice. Make the request specific, resolve vague references \
using the conversation, and mention relevant files when they help. Never answer the prompt \
yourself.";

fn build_enhancement_prompt(prompt: &str, context: &str, context_refs: &[String]) -> String {
    let refs = if context_refs.is_empty() {
        "(none)".to_string()
    } else {
        context_refs
            .iter()
            .map(|r| format!("- {}", r))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"Conversation so far:
{}

Relevant code references:
{}

Prompt to improve:
{}

Respond with the improved prompt wrapped in <enhanced_prompt></enhanced_prompt> tags and nothing else."#,
        if context.trim().is_empty() {
            "(none)"
        } else {
            context
        },
        refs,
        prompt
    )
}

/// Pull the rewritten prompt out of the model response
fn extract_enhanced_prompt(response: &str) -> Result<String> {
    const OPEN: &str = "<enhanced_prompt>";
    const CLOSE: &str = "</enhanced_prompt>";

    let text = match (response.find(OPEN), response.rfind(CLOSE)) {
        (Some(start), Some(end)) if start + OPEN.len() <= end => &response[start + OPEN.len()..end],
        // Model ignored the tags; take the whole reply
        _ => response,
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(InterludeError::LlmApi(
            "Model returned an empty prompt".to_string(),
        ));
    }
    Ok(text.to_string())
}
