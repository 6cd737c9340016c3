//! PRISMA Intro - Host Shell
//!
//! Plays the intro sequence in the terminal, then "mounts" the main
//! interface and optionally runs its ambient glitch effects.
//!
//! # Usage
//!
//! ```bash
//! # Play the default intro
//! prisma-intro
//!
//! # Custom config file
//! prisma-intro --config ./intro.toml
//!
//! # Mount straight away
//! prisma-intro --skip-intro
//!
//! # Show the resolved scene table
//! prisma-intro --print-scenes
//!
//! # Keep the page's ambient effects running for 30s after mount
//! RUST_LOG=debug prisma-intro --ambient-secs 30
//! ```
//!
//! # Environment Variables
//!
//! - `PRISMA_INTRO_CONFIG`: Config file path
//! - `PRISMA_INTRO_FALLBACK_GRACE_MS`: Grace before animation fallbacks fire
//! - `PRISMA_INTRO_TEARDOWN_DELAY_MS`: Loader fade-out before mount
//! - `PRISMA_INTRO_SKIP`: Allow skipping (`true`/`false`)
//! - `PRISMA_INTRO_SEED`: Ambient RNG seed
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)
//!
//! # Signals
//!
//! - `SIGINT` during the intro: skip to the main interface
//! - `SIGINT` after mount: exit

mod host;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use intro_core::{default_config_path, load_config_from_path, ConfigOverrides};

use host::HostShell;

/// PRISMA intro sequencer host
#[derive(Parser, Debug)]
#[command(name = "prisma-intro")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "PRISMA_INTRO_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Mount the main interface without playing the intro
    #[arg(long)]
    skip_intro: bool,

    /// Print the resolved scene table as JSON and exit
    #[arg(long)]
    print_scenes: bool,

    /// Run the ambient effects for this many seconds after mount (0 = none)
    #[arg(long, default_value_t = 0, value_name = "SECS")]
    ambient_secs: u64,

    /// Loader fade-out before mount (milliseconds)
    #[arg(long, value_name = "MS")]
    teardown_delay_ms: Option<u64>,

    /// Ambient RNG seed
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "PRISMA_INTRO_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new().with_skip_intro(self.skip_intro);
        if let Some(ms) = self.teardown_delay_ms {
            overrides = overrides.with_teardown_delay_ms(ms);
        }
        if let Some(seed) = self.seed {
            overrides = overrides.with_ambient_seed(seed);
        }
        overrides
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("intro_shell={level},intro_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path.clone())
        .with_context(|| format!("Failed to load intro config from {path:?}"))?;
    args.overrides().apply(&mut config);

    info!(
        source = %config.source(),
        config_file = ?config.config_file_path,
        scenes = config.scenes.len(),
        "Configuration loaded"
    );

    if args.print_scenes {
        let json = serde_json::to_string_pretty(&config.scenes)
            .context("Failed to serialize scene table")?;
        println!("{json}");
        return Ok(());
    }

    let mut host = HostShell::new(config);
    let report = host.play_intro(ctrl_c()).await;
    println!(
        "PRISMA mounted ({} scenes, {}ms{})",
        report.advances,
        report.elapsed.as_millis(),
        if report.skipped { ", skipped" } else { "" }
    );

    if args.ambient_secs > 0 {
        let run_for = tokio::time::sleep(Duration::from_secs(args.ambient_secs));
        let stats = host
            .run_ambient(async {
                tokio::select! {
                    () = run_for => {}
                    () = ctrl_c() => info!("Received SIGINT, exiting"),
                }
            })
            .await;

        for (name, stats) in stats {
            info!(
                effect = %name,
                checks = stats.checks,
                triggers = stats.triggers,
                reverts = stats.reverts,
                "Ambient effect summary"
            );
        }
    }

    info!(phase = %host.phase(), "PRISMA intro host stopped");
    Ok(())
}
