//! Shared helper functions for CLI commands

use interlude_core::{
    error::Result, services::UnavailableEnhancer, BrokerConfig, InterludeConfig, LlmConfig,
    LlmService, PromptEnhancer, SessionBroker,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolve the config path from the CLI flag or the platform default
pub fn config_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path.unwrap_or_else(InterludeConfig::default_path)
}

/// Load configuration, applying a command-line address override
pub fn load_config(cli_path: Option<PathBuf>, addr: Option<String>) -> Result<InterludeConfig> {
    let path = config_path(cli_path);
    debug!("Using config: {:?}", path);

    let mut config = InterludeConfig::load(&path)?;
    if let Some(addr) = addr {
        config.server.addr = addr;
        config.validate()?;
    }
    Ok(config)
}

/// Build the broker and its enhancement backend
///
/// Without an API key the broker still runs; reviewers simply see the
/// unmodified prompt.
pub fn build_broker(config: &InterludeConfig) -> SessionBroker {
    let enhancer: Arc<dyn PromptEnhancer> =
        match LlmService::new(LlmConfig::from_settings(&config.llm)) {
            Ok(service) => Arc::new(service),
            Err(e) => {
                warn!("Prompt enhancement disabled: {}", e);
                Arc::new(UnavailableEnhancer::new(e.to_string()))
            }
        };

    SessionBroker::new(
        enhancer,
        BrokerConfig {
            timeout: config.review.timeout(),
            event_capacity: config.server.event_capacity,
        },
    )
}
