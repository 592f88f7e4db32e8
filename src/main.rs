//! Interlude - Human-in-the-loop prompt review for agent tool calls
//!
//! Entry point for the MCP server and the review gateway.

mod cli;

use clap::{Parser, Subcommand};
use interlude_core::error::Result;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "interlude")]
#[command(about = "Human review of agent prompts before they run", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Config file (defaults to <config dir>/interlude/config.toml)
    #[arg(long, env = "INTERLUDE_CONFIG", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server (stdio) with the review gateway (default)
    Serve {
        /// Gateway address, overriding server.addr
        #[arg(long)]
        addr: Option<String>,
    },

    /// Start only the HTTP review gateway
    ApiServer {
        /// Server address, overriding server.addr
        #[arg(long)]
        addr: Option<String>,
    },

    /// Inspect or initialize configuration
    Config {
        #[command(subcommand)]
        action: cli::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // SSE disconnections make broadcast receivers noisy
    let filter = EnvFilter::new(format!(
        "interlude={0},interlude_core={0},tower_http=warn,tokio::sync::broadcast=error,tokio_stream=error",
        level.as_str().to_lowercase()
    ));

    // stdout carries MCP traffic, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Interlude v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None => cli::serve::handle(cli.config, None).await,
        Some(Commands::Serve { addr }) => cli::serve::handle(cli.config, addr).await,
        Some(Commands::ApiServer { addr }) => cli::api_server::handle(cli.config, addr).await,
        Some(Commands::Config { action }) => cli::config::handle(cli.config, action).await,
    }
}
