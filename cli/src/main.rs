use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use eraser::logging::init_logging;
use eraser::report::render_outcome;
use eraser_core::trace::{replay, Trace};
use eraser_core::{Config, Detector};

#[derive(Parser)]
#[command(name = "eraser")]
#[command(about = "Lockset-based data race detection over recorded traces", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "eraser.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded trace through the detector
    Replay {
        /// Trace file (JSON)
        trace: PathBuf,
        /// Output raw JSON instead of a summary
        #[arg(long)]
        json: bool,
        /// Write the detector's event stream to this file as JSON lines
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Parse and sanity-check a trace without running it
    Check {
        /// Trace file (JSON)
        trace: PathBuf,
    },

    /// Print the default configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        Config::default()
    };
    config.validate()?;
    init_logging(&config.logging);

    if cli.config.exists() {
        tracing::info!("Loaded configuration from {:?}", cli.config);
    } else {
        tracing::debug!("Config file not found at {:?}, using defaults", cli.config);
    }

    match cli.command {
        Commands::Replay {
            trace,
            json,
            events,
        } => handle_replay(&config, &trace, json, events.as_deref())?,
        Commands::Check { trace } => handle_check(&trace)?,
        Commands::Config => {
            print!("{}", Config::default_toml()?);
        }
    }

    Ok(())
}

fn handle_replay(config: &Config, path: &Path, json: bool, events: Option<&Path>) -> Result<()> {
    let trace = Trace::from_file(path)?;
    let detector = Detector::from_config(config);
    tracing::debug!(
        steps = trace.len(),
        relaxation = ?detector.config().relaxation,
        "replaying trace"
    );
    let outcome = replay(&detector, &trace);

    if let Some(events_path) = events {
        write_events(&detector, events_path)?;
    }

    if json {
        let text = serde_json::to_string_pretty(&outcome).context("Failed to encode outcome")?;
        println!("{}", text);
    } else {
        print!("{}", render_outcome(&outcome));
    }

    Ok(())
}

fn write_events(detector: &Detector, path: &Path) -> Result<()> {
    let capture = detector
        .capture()
        .ok_or_else(|| anyhow!("Event stream is disabled (events.enabled = false)"))?;

    if capture.dropped() > 0 {
        tracing::warn!(
            dropped = capture.dropped(),
            "event buffer overflowed; increase events.buffer_size"
        );
    }

    let mut lines = String::new();
    for event in capture.drain() {
        lines.push_str(&serde_json::to_string(&event)?);
        lines.push('\n');
    }
    std::fs::write(path, lines).with_context(|| format!("Failed to write events to {:?}", path))?;
    Ok(())
}

fn handle_check(path: &Path) -> Result<()> {
    let trace = Trace::from_file(path)?;
    println!("📄 {:?}: {} steps", path, trace.len());

    let unresolved = trace.unresolved_variables();
    if unresolved.is_empty() {
        println!("✅ Every variable is registered before use");
    } else {
        println!("⚠️  {} reference(s) to unregistered variables:", unresolved.len());
        for (step, name) in unresolved {
            println!("  [step {}] '{}'", step, name);
        }
    }

    Ok(())
}
