use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use arrvee_performance::{
    ActRegistry, AudioEngine, Clock, Performance, PerformanceConfig, SystemClock, TransitionEvent,
};

#[derive(Parser)]
#[command(name = "arrvee-performance")]
#[command(about = "Audio-reactive four-act performance driver")]
struct Args {
    /// JSON config file (missing fields use defaults)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Use the compressed demo timing
    #[arg(long)]
    demo: bool,

    /// Don't ask for the microphone; run on the ambient fallback signal
    #[arg(long)]
    no_mic: bool,

    /// Wrap from the last act back to the first
    #[arg(long = "loop")]
    looped: bool,

    /// Ticks per second
    #[arg(long, default_value = "60")]
    fps: u32,

    /// Stop after this many seconds (runs until killed otherwise)
    #[arg(long)]
    run_secs: Option<u64>,

    /// Act to open on, 1-4
    #[arg(long)]
    start_act: Option<u8>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PerformanceConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PerformanceConfig::default(),
    };
    if args.demo {
        config.timing.demo_mode = true;
    }
    if args.looped {
        config.timing.looped = true;
    }
    if let Some(act) = args.start_act {
        config.timing.start_act = act;
    }
    config.validate()?;

    info!("🎭 Starting Arrvee performance");

    let clock = SystemClock;
    let started = clock.now();

    let mut engine = AudioEngine::new(&config.audio, started);
    if args.no_mic {
        info!("Microphone disabled, using ambient signal");
    } else if engine.request_microphone(started) {
        info!("🎤 Microphone connected");
    } else {
        warn!("🎤 No microphone, using ambient signal");
    }
    if let Some(message) = engine.status_message() {
        warn!("{}", message);
    }

    let mut performance =
        Performance::from_settings(&config.timing, ActRegistry::with_stage_acts(), started);

    let frame = Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1)));
    let run_for = args.run_secs.map(Duration::from_secs);
    let summary_every = u64::from(args.fps.max(1)) * 5;
    let mut tick: u64 = 0;

    loop {
        let frame_start = Instant::now();
        let now = clock.now();
        if let Some(limit) = run_for {
            if now.saturating_sub(started) >= limit {
                break;
            }
        }

        let audio = *engine.update(now);
        for event in performance.update(now, &audio) {
            if let TransitionEvent::CurrentActChanged { from, to } = event {
                info!("🎬 {} → {}", from, to);
            }
        }

        tick += 1;
        if tick % summary_every == 0 {
            info!(
                "{} | volume {:.2} | bass {:.2} | mid {:.2} | high {:.2} | gain {:.1}{}",
                performance.current_act(),
                audio.volume,
                audio.low_freq,
                audio.mid_freq,
                audio.high_freq,
                engine.gain(),
                if engine.is_using_fallback() { " | ambient" } else { "" }
            );
        }

        if let Some(remaining) = frame.checked_sub(frame_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    performance.dispose();
    engine.dispose();
    info!("Performance finished");
    Ok(())
}
