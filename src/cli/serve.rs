//! MCP server startup command
//!
//! Runs the review gateway in the background and the MCP server on stdio.
//! Both share one broker, so a session opened by the agent is visible to the
//! reviewer's browser.

use super::helpers::{build_broker, load_config};
use interlude_core::{error::Result, ApiServer, ApiServerConfig, McpServer, ToolHandler};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};

/// Handle MCP server startup command
pub async fn handle(config_path: Option<PathBuf>, addr: Option<String>) -> Result<()> {
    let config = load_config(config_path, addr)?;
    let broker = build_broker(&config);

    let api_server = ApiServer::new(
        ApiServerConfig {
            addr: config.server.socket_addr()?,
            ui_dir: config.server.ui_dir.clone(),
        },
        broker.clone(),
    );
    let listener = api_server.bind().await?;
    let bound = listener.local_addr()?;

    // A fallback port changes the URL unless a public one is configured
    let review_base_url = match &config.server.public_url {
        Some(_) => config.server.public_base_url(),
        None => format!("http://{}", bound),
    };
    info!("Review pages served at {}/review", review_base_url);

    let gateway = tokio::spawn(async move {
        if let Err(e) = api_server.serve_on(listener).await {
            error!("Review gateway stopped: {}", e);
        }
    });

    let handler = ToolHandler::new(broker, review_base_url)
        .with_enhance_timeout(Duration::from_secs(config.llm.request_timeout_secs));
    let mcp = McpServer::new(handler);
    let result = mcp.run().await;

    debug!("Stopping review gateway");
    gateway.abort();
    result
}
