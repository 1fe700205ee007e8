//! flaglevel
//!
//! Adjusts the process's log level at runtime from a feature flag.
//!
//! # Architecture Overview
//!
//! ```text
//!   flags.toml ──watch──▶ FileFlagClient ──FlagEvent──▶ LevelController
//!                                                          │
//!                                         resolver::resolve (tenant, payload)
//!                                                          │
//!                                                          ▼
//!   config.toml ──watch──▶ FlagSettings (ArcSwap)    StructuredLogger
//!                                                    ├─ console sink
//!                                                    └─ file sink (optional)
//! ```

use std::path::PathBuf;

use clap::Parser;

use flaglevel::config::{load_config, AppConfig};
use flaglevel::lifecycle;
use flaglevel::observability::logging;

#[derive(Parser)]
#[command(name = "flaglevel")]
#[command(about = "Feature-flag driven runtime log level", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Flags file, overriding `flag_source.path`.
    #[arg(short, long)]
    flags: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(flags) = cli.flags {
        config.flag_source.path = flags;
    }

    let logger = logging::init(&config.logging, config.flag.fallback_level)?;

    tracing::info!(
        flag = %config.flag.flag_name,
        fallback_level = %config.flag.fallback_level,
        sinks = logger.len(),
        "flaglevel v0.1.0 starting"
    );

    let service = lifecycle::start(config, cli.config, logger).await?;
    service.run_until_signal().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
