//! Cinder Player - headless demo runner
//!
//! Drives the demo scene through the frame pipeline and prints per-system
//! timing when done.
//!
//! Usage:
//!   cinder-player [--config <engine.toml>] [--frames N] [--fps F]
//!                 [--crash-at N] [--pause-at N] [--log FILTER]

use anyhow::{Context, Result};
use cinder_player::demo::DemoScript;
use cinder_player::{PlayerApp, PlayerOptions};
use cinder_runtime::EngineConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cinder-player")]
#[command(about = "Cinder player - run the demo scene through the frame pipeline")]
struct Args {
    /// Path to engine config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of frames to run (0 runs until exit is requested)
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Target frame rate (0 runs unthrottled)
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Raise a fault in the mover from this frame on
    #[arg(long)]
    crash_at: Option<u64>,

    /// Pause the session on this frame
    #[arg(long)]
    pause_at: Option<u64>,

    /// Frames to stay paused
    #[arg(long, default_value_t = 30)]
    pause_frames: u64,

    /// Log filter, overrides config and CINDER_LOG
    #[arg(long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => {
            let mut config = EngineConfig::default();
            config.apply_overrides(|key| std::env::var(key).ok());
            config
        }
    };
    if let Some(filter) = &args.log {
        config.log.filter = filter.clone();
    }

    cinder_player::init_logging(&config.log.filter).context("Failed to initialize logger")?;

    let options = PlayerOptions {
        frames: (args.frames > 0).then_some(args.frames),
        target_fps: args.fps,
        script: DemoScript {
            crash_at: args.crash_at,
            pause_at: args.pause_at,
            pause_frames: args.pause_frames,
        },
    };

    let mut app = match PlayerApp::new(&config, options) {
        Ok(app) => app,
        Err(e) if e.is_configuration_fault() => {
            log::error!("Invalid engine setup: {}", e);
            std::process::exit(2);
        }
        Err(e) => return Err(e).context("Failed to start engine"),
    };
    let summary = app.run().context("Crash inspector failed")?;

    println!(
        "Ran {} frames ({:.2}s simulated){}",
        summary.frames,
        summary.simulated_seconds,
        if summary.crashed { ", crashed" } else { "" }
    );
    println!(
        "{:.1} fps, last frame {:.2} ms",
        summary.fps, summary.frame_time_ms
    );
    println!();
    println!(
        "{:<24} {:>8} {:>10} {:>10} {:>10}",
        "name", "samples", "avg ms", "p90 ms", "p99 ms"
    );
    for row in app.profile_report() {
        println!(
            "{:<24} {:>8} {:>10.4} {:>10.4} {:>10.4}",
            row.name, row.samples, row.average_ms, row.p90_ms, row.p99_ms
        );
    }

    if summary.crashed {
        std::process::exit(1);
    }
    Ok(())
}
