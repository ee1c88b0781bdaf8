//! # Tempo Clock Module
//!
//! Beat and subdivision scheduling for the metronome. A dedicated
//! worker thread fires tick events against absolute deadlines computed
//! from a monotonic epoch (`epoch + k * tick_interval`), so scheduling
//! overhead never accumulates as drift — re-arming a fixed-delay timer
//! after each fire does, and it is audible at high tempi.
//!
//! ## Features
//! - Deadline-based scheduling on a monotonic clock
//! - Time signatures 2/3/4/6/9/12, subdivisions up to sixteenths
//! - Live retuning of BPM, meter, subdivision, and accent
//! - Idempotent stop with a hard no-ticks-after-return guarantee

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, warn};

/// Supported tempo range in beats per minute.
pub const MIN_BPM: u32 = 40;
pub const MAX_BPM: u32 = 240;

/// Supported time-signature numerators.
pub const TIME_SIGNATURE_NUMERATORS: [u32; 6] = [2, 3, 4, 6, 9, 12];

/// Clamps a tempo into the supported [40, 240] BPM domain.
pub fn clamp_bpm(bpm: u32) -> u32 {
    bpm.clamp(MIN_BPM, MAX_BPM)
}

/// Italian tempo marking for a BPM value, matching common practice
/// breakpoints.
pub fn tempo_marking(bpm: u32) -> &'static str {
    match bpm {
        0..=59 => "Largo",
        60..=75 => "Adagio",
        76..=107 => "Andante",
        108..=119 => "Moderato",
        120..=167 => "Allegro",
        168..=199 => "Presto",
        _ => "Prestissimo",
    }
}

/// Subdivision setting: how many ticks each beat is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subdivision {
    #[default]
    None,
    Eighths,
    Triplets,
    Sixteenths,
}

impl Subdivision {
    /// Ticks per beat.
    pub fn multiplier(self) -> u32 {
        match self {
            Subdivision::None => 1,
            Subdivision::Eighths => 2,
            Subdivision::Triplets => 3,
            Subdivision::Sixteenths => 4,
        }
    }

    /// Display label, `None` for the no-subdivision setting.
    pub fn label(self) -> Option<&'static str> {
        match self {
            Subdivision::None => None,
            Subdivision::Eighths => Some("Eighths"),
            Subdivision::Triplets => Some("Triplets"),
            Subdivision::Sixteenths => Some("Sixteenths"),
        }
    }
}

/// One scheduled tick, emitted to the playback/UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvent {
    /// Position within the measure, `0..numerator`.
    pub beat_index: u32,
    /// True on the first beat of the measure when accenting is enabled.
    pub is_accent: bool,
    /// True for the lighter ticks between main beats.
    pub is_subdivision: bool,
}

/// Clock configuration and counters. Mutated only by the worker while
/// the clock runs.
#[derive(Debug, Clone)]
struct ClockState {
    bpm: u32,
    numerator: u32,
    subdivision: Subdivision,
    accent_first_beat: bool,
    beat_index: u32,
    subdivision_index: u32,
}

impl ClockState {
    /// Interval between consecutive ticks at the current settings.
    fn tick_interval(&self) -> Duration {
        let beat = 60.0 / self.bpm as f64;
        Duration::from_secs_f64(beat / self.subdivision.multiplier() as f64)
    }

    /// Advances the counters by one tick and describes the tick fired.
    ///
    /// Subdivision ticks carry the index of the beat they subdivide;
    /// `beat_index` only moves on after the last tick of its beat.
    fn advance(&mut self) -> TickEvent {
        let multiplier = self.subdivision.multiplier();
        let is_main_beat = self.subdivision_index % multiplier == 0;

        let event = TickEvent {
            beat_index: self.beat_index,
            is_accent: is_main_beat && self.beat_index == 0 && self.accent_first_beat,
            is_subdivision: !is_main_beat,
        };

        self.subdivision_index = (self.subdivision_index + 1) % (self.numerator * multiplier);
        if self.subdivision_index % multiplier == 0 {
            self.beat_index = (self.beat_index + 1) % self.numerator;
        }
        event
    }
}

enum ClockCommand {
    SetBpm(u32),
    SetTimeSignature(u32),
    SetSubdivision(Subdivision),
    SetAccent(bool),
    Stop,
}

struct ClockWorker {
    command_tx: Sender<ClockCommand>,
    handle: JoinHandle<()>,
}

/// The metronome scheduling authority.
///
/// `Stopped` until [`TempoClock::start`] is called; settings may be
/// changed in either state and take effect on the next scheduling
/// cycle. Retuning while running restarts the tick phase from "now":
/// subsequent deadlines are `retune_time + k * new_interval`.
pub struct TempoClock {
    bpm: u32,
    numerator: u32,
    subdivision: Subdivision,
    accent_first_beat: bool,
    worker: Option<ClockWorker>,
}

impl TempoClock {
    /// Creates a stopped clock. Out-of-range settings are brought into
    /// the supported domain.
    pub fn new(bpm: u32, numerator: u32, subdivision: Subdivision) -> Self {
        Self {
            bpm: clamp_bpm(bpm),
            numerator: validated_numerator(numerator),
            subdivision,
            accent_first_beat: true,
            worker: None,
        }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Starts the scheduling thread and returns the tick stream.
    ///
    /// Beat and subdivision counters reset to zero and the first tick
    /// fires immediately (`k = 0`). Tick emission never blocks the
    /// scheduler: a slow consumer only delays its own rendering.
    ///
    /// Calling `start` on a running clock restarts it.
    pub fn start(&mut self) -> Receiver<TickEvent> {
        self.stop();

        let state = ClockState {
            bpm: self.bpm,
            numerator: self.numerator,
            subdivision: self.subdivision,
            accent_first_beat: self.accent_first_beat,
            beat_index: 0,
            subdivision_index: 0,
        };

        let (command_tx, command_rx) = unbounded();
        let (tick_tx, tick_rx) = unbounded();
        let handle = thread::spawn(move || run_clock(state, command_rx, tick_tx));
        self.worker = Some(ClockWorker { command_tx, handle });
        tick_rx
    }

    /// Stops the clock. Idempotent; once this returns, no further tick
    /// is fired (the worker thread has exited).
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.command_tx.send(ClockCommand::Stop);
            if worker.handle.join().is_err() {
                warn!("tempo clock worker panicked during shutdown");
            }
        }
    }

    /// Sets the tempo, clamped to [40, 240] BPM. Takes effect on the
    /// next scheduling cycle when running.
    pub fn set_bpm(&mut self, bpm: u32) {
        self.bpm = clamp_bpm(bpm);
        self.send(ClockCommand::SetBpm(self.bpm));
    }

    /// Sets the time-signature numerator. Unsupported numerators fall
    /// back to 4. Resets the measure position.
    pub fn set_time_signature(&mut self, numerator: u32) {
        self.numerator = validated_numerator(numerator);
        self.send(ClockCommand::SetTimeSignature(self.numerator));
    }

    pub fn set_subdivision(&mut self, subdivision: Subdivision) {
        self.subdivision = subdivision;
        self.send(ClockCommand::SetSubdivision(subdivision));
    }

    pub fn set_accent_first_beat(&mut self, enabled: bool) {
        self.accent_first_beat = enabled;
        self.send(ClockCommand::SetAccent(enabled));
    }

    fn send(&self, command: ClockCommand) {
        if let Some(worker) = &self.worker {
            let _ = worker.command_tx.send(command);
        }
    }
}

impl Drop for TempoClock {
    fn drop(&mut self) {
        self.stop();
    }
}

fn validated_numerator(numerator: u32) -> u32 {
    if TIME_SIGNATURE_NUMERATORS.contains(&numerator) {
        numerator
    } else {
        warn!("unsupported time signature numerator {numerator}, using 4");
        4
    }
}

/// Worker loop: waits for commands until the next absolute deadline,
/// then fires the tick. Deadlines are `epoch + k * interval`, so a
/// late wakeup shifts one tick but never the schedule.
fn run_clock(
    mut state: ClockState,
    command_rx: Receiver<ClockCommand>,
    tick_tx: Sender<TickEvent>,
) {
    let mut interval = state.tick_interval();
    let mut epoch = Instant::now();
    let mut k: u32 = 0;

    debug!(
        "tempo clock running: {} bpm, {} beats, interval {:?}",
        state.bpm, state.numerator, interval
    );

    loop {
        let deadline = epoch + interval * k;
        match command_rx.recv_deadline(deadline) {
            Ok(ClockCommand::Stop) => break,
            Ok(command) => {
                let retunes = match command {
                    ClockCommand::SetBpm(bpm) => {
                        state.bpm = bpm;
                        true
                    }
                    ClockCommand::SetTimeSignature(numerator) => {
                        state.numerator = numerator;
                        state.beat_index = 0;
                        state.subdivision_index = 0;
                        true
                    }
                    ClockCommand::SetSubdivision(subdivision) => {
                        state.subdivision = subdivision;
                        state.subdivision_index = 0;
                        true
                    }
                    ClockCommand::SetAccent(enabled) => {
                        state.accent_first_beat = enabled;
                        false
                    }
                    ClockCommand::Stop => unreachable!(),
                };
                if retunes {
                    // Retune policy: restart the phase from now. The
                    // next tick lands one new interval after the change.
                    interval = state.tick_interval();
                    epoch = Instant::now();
                    k = 1;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let event = state.advance();
                if tick_tx.send(event).is_err() {
                    // Consumer went away; keep counting silently until
                    // the owner stops the clock.
                    debug!("tick consumer disconnected");
                }
                k += 1;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("tempo clock stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn tick_interval_is_exact_for_plain_beats() {
        let state = ClockState {
            bpm: 120,
            numerator: 4,
            subdivision: Subdivision::None,
            accent_first_beat: true,
            beat_index: 0,
            subdivision_index: 0,
        };
        assert_eq!(state.tick_interval(), Duration::from_millis(500));
    }

    #[test]
    fn tick_interval_divides_by_subdivision() {
        let state = ClockState {
            bpm: 60,
            numerator: 4,
            subdivision: Subdivision::Eighths,
            accent_first_beat: true,
            beat_index: 0,
            subdivision_index: 0,
        };
        // 60 BPM eighths: beat = 1 s, tick = 0.5 s.
        assert_eq!(state.tick_interval(), Duration::from_millis(500));
    }

    #[test]
    fn beat_index_cycles_through_the_measure() {
        let mut state = ClockState {
            bpm: 120,
            numerator: 4,
            subdivision: Subdivision::None,
            accent_first_beat: true,
            beat_index: 0,
            subdivision_index: 0,
        };
        let beats: Vec<u32> = (0..8).map(|_| state.advance().beat_index).collect();
        assert_eq!(beats, vec![0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn only_first_beat_is_accented() {
        let mut state = ClockState {
            bpm: 120,
            numerator: 3,
            subdivision: Subdivision::None,
            accent_first_beat: true,
            beat_index: 0,
            subdivision_index: 0,
        };
        let accents: Vec<bool> = (0..6).map(|_| state.advance().is_accent).collect();
        assert_eq!(accents, vec![true, false, false, true, false, false]);
    }

    #[test]
    fn accent_toggle_silences_the_downbeat() {
        let mut state = ClockState {
            bpm: 120,
            numerator: 4,
            subdivision: Subdivision::None,
            accent_first_beat: false,
            beat_index: 0,
            subdivision_index: 0,
        };
        assert!(!state.advance().is_accent);
    }

    #[test]
    fn eighths_alternate_main_and_subdivision_ticks() {
        let mut state = ClockState {
            bpm: 60,
            numerator: 4,
            subdivision: Subdivision::Eighths,
            accent_first_beat: true,
            beat_index: 0,
            subdivision_index: 0,
        };
        let flags: Vec<bool> = (0..8).map(|_| state.advance().is_subdivision).collect();
        assert_eq!(
            flags,
            vec![false, true, false, true, false, true, false, true]
        );
    }

    #[test]
    fn subdivision_ticks_carry_their_parent_beat() {
        let mut state = ClockState {
            bpm: 60,
            numerator: 2,
            subdivision: Subdivision::Eighths,
            accent_first_beat: true,
            beat_index: 0,
            subdivision_index: 0,
        };
        let ticks: Vec<(u32, bool)> = (0..8)
            .map(|_| {
                let event = state.advance();
                (event.beat_index, event.is_subdivision)
            })
            .collect();
        // The off-beat eighth belongs to the beat before it, not the
        // one after.
        assert_eq!(
            ticks,
            vec![
                (0, false),
                (0, true),
                (1, false),
                (1, true),
                (0, false),
                (0, true),
                (1, false),
                (1, true),
            ]
        );
    }

    #[test]
    fn counters_stay_within_their_moduli() {
        let mut state = ClockState {
            bpm: 240,
            numerator: 3,
            subdivision: Subdivision::Triplets,
            accent_first_beat: true,
            beat_index: 0,
            subdivision_index: 0,
        };
        for _ in 0..100 {
            let event = state.advance();
            assert!(event.beat_index < state.numerator);
            assert!(state.subdivision_index < state.numerator * state.subdivision.multiplier());
        }
    }

    #[test]
    fn bpm_is_clamped_to_the_supported_domain() {
        assert_eq!(clamp_bpm(10), 40);
        assert_eq!(clamp_bpm(400), 240);
        assert_eq!(clamp_bpm(120), 120);
        let clock = TempoClock::new(500, 4, Subdivision::None);
        assert_eq!(clock.bpm(), 240);
    }

    #[test]
    fn running_clock_emits_cycling_beats() {
        let mut clock = TempoClock::new(240, 4, Subdivision::None);
        let ticks = clock.start();
        // 250 ms per tick; the first fires immediately.
        let events: Vec<TickEvent> = (0..6)
            .map(|_| ticks.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        clock.stop();

        let beats: Vec<u32> = events.iter().map(|e| e.beat_index).collect();
        assert_eq!(beats, vec![0, 1, 2, 3, 0, 1]);
        assert!(events[0].is_accent);
        assert!(!events[1].is_accent);
        assert!(events.iter().all(|e| !e.is_subdivision));
    }

    #[test]
    fn stop_is_idempotent_and_final() {
        let mut clock = TempoClock::new(240, 4, Subdivision::None);
        let ticks = clock.start();
        let _ = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        clock.stop();
        clock.stop();

        // Drain anything emitted before stop returned; afterwards the
        // channel must be disconnected, never producing a new tick.
        while ticks.try_recv().is_ok() {}
        assert!(matches!(
            ticks.recv_timeout(Duration::from_millis(400)),
            Err(RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn retune_while_running_takes_effect() {
        let mut clock = TempoClock::new(40, 2, Subdivision::None);
        let ticks = clock.start();
        let _ = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        // At 40 BPM the next tick is 1.5 s out; retuning to 240 BPM
        // restarts the phase and ticks every 250 ms instead.
        clock.set_bpm(240);
        let started = Instant::now();
        let _ = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(started.elapsed() < Duration::from_millis(1200));
        clock.stop();
    }

    #[test]
    fn time_signature_change_restarts_the_measure() {
        let mut clock = TempoClock::new(240, 4, Subdivision::None);
        let ticks = clock.start();
        let first = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.beat_index, 0);
        let second = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(second.beat_index, 1);

        clock.set_time_signature(3);
        // One tick scheduled before the command was handled may still
        // arrive; everything after it must restart at beat 0 and cycle
        // over three beats.
        let beats: Vec<u32> = (0..7)
            .map(|_| {
                ticks
                    .recv_timeout(Duration::from_secs(2))
                    .unwrap()
                    .beat_index
            })
            .collect();
        clock.stop();

        let restart = beats
            .iter()
            .position(|&b| b == 0)
            .expect("measure never restarted");
        assert!(restart <= 1, "stale ticks beyond one: {beats:?}");
        for (offset, &beat) in beats[restart..].iter().enumerate() {
            assert_eq!(beat as usize, offset % 3, "sequence {beats:?}");
        }
    }

    #[test]
    fn tempo_markings_follow_the_breakpoint_table() {
        assert_eq!(tempo_marking(50), "Largo");
        assert_eq!(tempo_marking(60), "Adagio");
        assert_eq!(tempo_marking(92), "Andante");
        assert_eq!(tempo_marking(114), "Moderato");
        assert_eq!(tempo_marking(144), "Allegro");
        assert_eq!(tempo_marking(184), "Presto");
        assert_eq!(tempo_marking(220), "Prestissimo");
    }

    #[test]
    fn subdivision_multipliers_match_settings() {
        assert_eq!(Subdivision::None.multiplier(), 1);
        assert_eq!(Subdivision::Eighths.multiplier(), 2);
        assert_eq!(Subdivision::Triplets.multiplier(), 3);
        assert_eq!(Subdivision::Sixteenths.multiplier(), 4);
        assert_eq!(Subdivision::Triplets.label(), Some("Triplets"));
        assert!(Subdivision::None.label().is_none());
    }
}
