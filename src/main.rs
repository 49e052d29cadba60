// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Vaultkeeper: image reorganizer for note vaults

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use vaultkeeper::config::{AppConfig, ProviderKind};
use vaultkeeper::{Engine, Result};

/// Vaultkeeper CLI - move, rename and relink the images of a note vault
#[derive(Parser, Debug)]
#[command(name = "vaultkeeper")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Move vault images next to their notes, give them meaningful names and fix every link", long_about = None)]
struct Cli {
    /// Root folder of the vault
    vault: PathBuf,

    /// Show the plan without changing anything
    #[arg(long)]
    dry_run: bool,

    /// API key for the AI provider (overrides config and environment)
    #[arg(long)]
    ai_key: Option<String>,

    /// AI provider: openai, ecnu, ollama or none
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Disable AI naming, use local strategies only
    #[arg(long)]
    no_ai: bool,

    /// Do not back up the vault before changing it
    #[arg(long)]
    no_backup: bool,

    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "vaultkeeper.json")]
    config: PathBuf,

    /// Log level (overrides config)
    #[arg(long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Output format for the plan and summary
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

impl Cli {
    /// Fold command-line overrides into the loaded configuration
    fn apply_to(&self, config: &mut AppConfig) {
        config.apply_env();
        if let Some(provider) = self.provider {
            config.ai.provider = provider;
        }
        if let Some(key) = &self.ai_key {
            config.ai.api_key = key.clone();
        }
        if self.no_ai {
            config.naming.use_ai = false;
        }
        if self.no_backup {
            config.organization.create_backup = false;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    cli.apply_to(&mut config);

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .with_target(false)
        .init();

    config.validate()?;
    info!("Vaultkeeper v{}", env!("CARGO_PKG_VERSION"));

    if cli.dry_run {
        warn!("DRY RUN MODE - nothing in the vault will be changed");
    }

    // Ctrl+C stops the run between images
    let (abort_tx, abort_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received Ctrl+C, finishing the current image and stopping...");
                let _ = abort_tx.send(true);
            }
            Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
        }
    });

    let engine = Engine::new(Arc::new(config)).with_abort(abort_rx);
    let report = engine.run(&cli.vault, cli.dry_run).await?;

    match cli.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            if cli.dry_run {
                println!("{}", report.plan_text);
            }
            println!("{}", report.summary.render_text());
        }
    }

    Ok(())
}
