//! # Pulse - Practice Instrument CLI
//!
//! Terminal front end for the Pulse engine crate: a metronome with
//! audible clicks, a live tuner, and an interactive tap-tempo session.
//! All timing and signal processing lives in `pulse-core`; this binary
//! only renders engine events as text and triggers click playback.

mod playback;

use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use log::warn;
use pulse_core::click::ClickKind;
use pulse_core::session::{AccuracyHistory, TempoSessionLog, accuracy_score};
use pulse_core::tap::{BpmHistory, TapTempoEstimator};
use pulse_core::tempo::{Subdivision, TempoClock, tempo_marking};
use pulse_core::{engine::PitchEngine, note};

#[derive(Parser)]
#[command(name = "pulse", about = "Metronome and tuner practice tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum SubdivisionArg {
    #[default]
    None,
    Eighths,
    Triplets,
    Sixteenths,
}

impl From<SubdivisionArg> for Subdivision {
    fn from(arg: SubdivisionArg) -> Self {
        match arg {
            SubdivisionArg::None => Subdivision::None,
            SubdivisionArg::Eighths => Subdivision::Eighths,
            SubdivisionArg::Triplets => Subdivision::Triplets,
            SubdivisionArg::Sixteenths => Subdivision::Sixteenths,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the metronome.
    Metronome {
        /// Tempo in beats per minute (clamped to 40-240).
        #[arg(long, default_value_t = 120)]
        bpm: u32,
        /// Time signature numerator (2, 3, 4, 6, 9, or 12).
        #[arg(long, default_value_t = 4)]
        beats: u32,
        /// Subdivision setting.
        #[arg(long, value_enum, default_value_t)]
        subdivision: SubdivisionArg,
        /// Do not accent the first beat of the measure.
        #[arg(long)]
        no_accent: bool,
        /// Stop after this many seconds (runs until killed otherwise).
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Run the live tuner against the default input device.
    Tuner {
        /// Tuning target note, e.g. "A4". Defaults to whatever note is
        /// nearest to the detected pitch.
        #[arg(long)]
        note: Option<String>,
    },
    /// Derive a tempo from taps: press Enter in rhythm, q to quit.
    Tap,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Metronome {
            bpm,
            beats,
            subdivision,
            no_accent,
            duration_secs,
        } => run_metronome(bpm, beats, subdivision.into(), !no_accent, duration_secs),
        Command::Tuner { note } => run_tuner(note),
        Command::Tap => run_tap(),
    }
}

fn run_metronome(
    bpm: u32,
    beats: u32,
    subdivision: Subdivision,
    accent: bool,
    duration_secs: Option<u64>,
) -> Result<()> {
    let player = match playback::ClickPlayer::new() {
        Ok(player) => Some(player),
        Err(e) => {
            // Playback is best-effort: the clock keeps running either way.
            warn!("click playback unavailable: {e:#}");
            None
        }
    };

    let mut clock = TempoClock::new(bpm, beats, subdivision);
    clock.set_accent_first_beat(accent);
    let effective_bpm = clock.bpm();
    println!(
        "{} BPM ({}), {}/x{}",
        effective_bpm,
        tempo_marking(effective_bpm),
        beats,
        subdivision.multiplier()
    );

    let ticks = clock.start();
    let stop_at = duration_secs.map(|s| Instant::now() + Duration::from_secs(s));

    loop {
        let tick = match stop_at {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match ticks.recv_timeout(remaining) {
                    Ok(tick) => tick,
                    Err(_) => break,
                }
            }
            None => match ticks.recv() {
                Ok(tick) => tick,
                Err(_) => break,
            },
        };

        let kind = ClickKind::for_event(&tick);
        if let Some(player) = &player {
            player.trigger(kind);
        }

        if tick.is_subdivision {
            println!("      .");
        } else if tick.is_accent {
            println!("beat {} *", tick.beat_index + 1);
        } else {
            println!("beat {}", tick.beat_index + 1);
        }
    }

    clock.stop();
    Ok(())
}

fn run_tuner(target_note: Option<String>) -> Result<()> {
    let target = match &target_note {
        Some(name) => {
            let freq = note::note_frequency(name)
                .ok_or_else(|| anyhow::anyhow!("unknown note name: {name}"))?;
            println!("tuning target: {} ({:.2} Hz)", name.to_uppercase(), freq);
            Some(freq)
        }
        None => None,
    };

    let mut engine = PitchEngine::new();
    let readings = engine.start()?;
    let mut history = AccuracyHistory::new();

    println!("listening... (Ctrl-C to quit)");
    for reading in readings.iter() {
        match &reading.note {
            Some(mapped) => {
                // Score against the explicit target, or against the
                // center of whatever note is being displayed.
                let reference = target.unwrap_or_else(|| mapped.frequency());
                history.record(accuracy_score(reading.frequency, reference));

                let stability = history
                    .stability()
                    .map(|s| format!("  stability {:>3.0}%", s * 100.0))
                    .unwrap_or_default();
                println!(
                    "{:<4} {:>8.2} Hz  {:+6.1} cents  accuracy {:>3.0}%{}",
                    mapped.to_string(),
                    reading.frequency,
                    mapped.cents,
                    history.average() * 100.0,
                    stability
                );
            }
            None => println!("---"),
        }
    }

    engine.stop();
    Ok(())
}

fn run_tap() -> Result<()> {
    let mut estimator = TapTempoEstimator::new();
    let mut history = BpmHistory::new();
    let mut session = TempoSessionLog::new();
    let mut last_bpm: Option<u32> = None;

    println!("tap Enter in rhythm (at least 5 taps), q + Enter to quit");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }

        match estimator.register_tap(Instant::now()) {
            Some(bpm) => {
                history.record(bpm);
                session.record(bpm);
                last_bpm = Some(bpm);
                print!("{} BPM ({})", bpm, tempo_marking(bpm));
                if let Some(next) = session.suggest_next(bpm) {
                    print!("  suggested next: {next}");
                }
                println!();
            }
            None => {
                println!("({} taps)", estimator.tap_count());
            }
        }
        std::io::stdout().flush()?;
    }

    if let Some(bpm) = last_bpm {
        println!("\nlast tempo: {} BPM ({})", bpm, tempo_marking(bpm));
        println!("{}", session.trend().describe());
    }
    if !history.is_empty() {
        let tempos: Vec<String> = history.entries().map(|b| b.to_string()).collect();
        println!("history: {}", tempos.join(", "));
    }
    Ok(())
}
