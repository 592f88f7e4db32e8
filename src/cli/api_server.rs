//! HTTP API server command
//!
//! Runs only the review gateway; useful for developing the review page.

use super::helpers::{build_broker, load_config};
use interlude_core::{error::Result, ApiServer, ApiServerConfig};
use std::path::PathBuf;
use tracing::debug;

/// Handle API server startup command
pub async fn handle(config_path: Option<PathBuf>, addr: Option<String>) -> Result<()> {
    debug!("Starting review gateway...");

    let config = load_config(config_path, addr)?;
    let broker = build_broker(&config);

    let server = ApiServer::new(
        ApiServerConfig {
            addr: config.server.socket_addr()?,
            ui_dir: config.server.ui_dir.clone(),
        },
        broker,
    );
    let listener = server.bind().await?;
    let bound = listener.local_addr()?;

    println!();
    println!("Interlude review gateway");
    println!();
    println!("   Address: http://{}", bound);
    println!("   Review timeout: {}s", config.review.timeout_secs);
    println!();
    println!("   Endpoints:");
    println!("   - GET  /api/session-info?session=<id> - Session content and countdown");
    println!("   - POST /api/submit - Submit the reviewed prompt");
    println!("   - POST /api/reprocess - Re-run enhancement on edited text");
    println!("   - GET  /events - Server-Sent Events stream");
    println!("   - GET  /health - Health check");
    if let Some(dir) = &config.server.ui_dir {
        println!("   - GET  /review - Review page ({})", dir.display());
    }
    println!();

    server.serve_on(listener).await
}
