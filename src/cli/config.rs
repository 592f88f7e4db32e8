//! Configuration management command

use super::helpers::config_path;
use clap::Subcommand;
use interlude_core::{error::Result, InterludeConfig};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (file plus environment overrides)
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration file path
    Path,
}

/// Handle configuration management command
pub async fn handle(cli_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    let path = config_path(cli_path);

    match action {
        ConfigAction::Show => {
            let config = InterludeConfig::load(&path)?;
            println!("# {}", path.display());
            print!("{}", config.to_toml()?);
            let key_status = if std::env::var("ANTHROPIC_API_KEY").is_ok_and(|k| !k.is_empty()) {
                "set"
            } else {
                "not set"
            };
            println!();
            println!("# ANTHROPIC_API_KEY: {}", key_status);
            Ok(())
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                eprintln!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                );
                return Ok(());
            }
            InterludeConfig::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}
