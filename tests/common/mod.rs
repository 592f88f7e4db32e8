//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use interlude_core::{
    error::{InterludeError, Result},
    BrokerConfig, PromptEnhancer, SessionBroker, SessionId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Enhancer that prefixes the prompt and counts calls
#[derive(Default)]
pub struct EchoEnhancer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PromptEnhancer for EchoEnhancer {
    async fn enhance(&self, prompt: &str, _context: &str, _refs: &[String]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("enhanced: {}", prompt))
    }
}

/// Enhancer whose backend is always down
pub struct FailingEnhancer;

#[async_trait]
impl PromptEnhancer for FailingEnhancer {
    async fn enhance(&self, _prompt: &str, _context: &str, _refs: &[String]) -> Result<String> {
        Err(InterludeError::LlmApi("upstream returned 529".to_string()))
    }
}

/// Enhancer that blocks until released, for racing reprocess against submit
#[derive(Default)]
pub struct GatedEnhancer {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl PromptEnhancer for GatedEnhancer {
    async fn enhance(&self, prompt: &str, _context: &str, _refs: &[String]) -> Result<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(format!("late: {}", prompt))
    }
}

/// Broker with a custom enhancer and deadline
pub fn test_broker(enhancer: Arc<dyn PromptEnhancer>, timeout: Duration) -> SessionBroker {
    SessionBroker::new(
        enhancer,
        BrokerConfig {
            timeout,
            event_capacity: 64,
        },
    )
}

/// Broker with an echo enhancer and the default deadline
pub fn echo_broker() -> SessionBroker {
    test_broker(
        Arc::new(EchoEnhancer::default()),
        BrokerConfig::default().timeout,
    )
}

/// Open a session with draft/original content and a small context
pub async fn create_session(broker: &SessionBroker) -> SessionId {
    broker
        .create(
            "draft".to_string(),
            "orig".to_string(),
            "user: please tidy the parser".to_string(),
            vec!["src/parser.rs".to_string()],
        )
        .await
        .expect("Failed to create session")
}
