use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use arrvee_performance::{AudioEngine, Clock, PerformanceConfig, SystemClock};

#[derive(Parser)]
#[command(name = "arrvee-audio-monitor")]
#[command(about = "Live microphone meter - prints the levels the acts would see")]
struct Args {
    /// JSON config file for the audio settings
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// How long to monitor, in seconds
    #[arg(long, default_value = "30")]
    seconds: u64,

    /// Print every Nth tick
    #[arg(long, default_value = "6")]
    every: u64,
}

const TICK: Duration = Duration::from_millis(16);

fn bar(level: f32) -> String {
    let filled = (level.clamp(0.0, 1.0) * 20.0).round() as usize;
    format!("{:<20}", "#".repeat(filled))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PerformanceConfig::load(path)?,
        None => PerformanceConfig::default(),
    };

    let clock = SystemClock;
    let started = clock.now();
    let mut engine = AudioEngine::new(&config.audio, started);
    if !engine.request_microphone(started) {
        warn!("No microphone available, showing the ambient fallback signal");
    }

    info!("🎤 Monitoring for {}s", args.seconds);
    let ticks = args.seconds * 1000 / TICK.as_millis() as u64;
    let every = args.every.max(1);

    for tick in 0..ticks {
        let now = clock.now();
        let state = *engine.update(now);

        if tick % every == 0 {
            println!(
                "vol [{}] low [{}] mid [{}] high [{}] gain {:>5.1}{}{}",
                bar(state.volume),
                bar(state.low_freq),
                bar(state.mid_freq),
                bar(state.high_freq),
                engine.gain(),
                if state.beat { " BEAT" } else { "     " },
                if engine.is_silent() { " (silent)" } else { "" }
            );
        }

        thread::sleep(TICK);
    }

    if let Some(bpm) = engine.estimated_bpm() {
        info!("Estimated tempo: {:.0} BPM", bpm);
    }
    engine.dispose();
    Ok(())
}
