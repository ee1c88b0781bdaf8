//! # Pitch Engine Module
//!
//! Owns the live tuner pipeline: a dedicated worker thread takes
//! capture blocks, runs the pitch detector, and publishes readings
//! through a single-slot mailbox. Acceptance of new blocks is
//! throttled to bound CPU cost; audio callbacks are never dropped to
//! enforce it, blocks simply go unprocessed.
//!
//! The cpal stream lives on the worker thread (it is not `Send` on
//! every platform), so startup errors are reported back to the caller
//! through a one-shot handshake channel.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded, select};
use log::{debug, info, warn};

use crate::PitchReading;
use crate::audio;
use crate::pitch::PitchDetector;

/// Upper bound on accepted analysis updates per second.
pub const MAX_UPDATE_RATE_HZ: u32 = 30;

struct EngineWorker {
    shutdown_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Rate limit on block acceptance. Blocks arriving sooner than the
/// minimum interval after the last accepted one are skipped; capture
/// itself is never paced.
struct Throttle {
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl Throttle {
    fn new(max_rate_hz: u32) -> Self {
        Self {
            min_interval: Duration::from_secs(1) / max_rate_hz,
            last_accepted: None,
        }
    }

    /// Decides whether a block arriving at `now` is analyzed, and
    /// records the acceptance when it is.
    fn accept(&mut self, now: Instant) -> bool {
        if let Some(at) = self.last_accepted {
            if now.duration_since(at) < self.min_interval {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }
}

/// Lifecycle owner for the pitch-detection pipeline.
///
/// [`PitchEngine::start`] and [`PitchEngine::stop`] are independent of
/// the tempo side; stopping tears the capture tap down before
/// returning and discards all transient detection state.
#[derive(Default)]
pub struct PitchEngine {
    worker: Option<EngineWorker>,
}

impl PitchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Starts capture and analysis, returning the reading mailbox.
    ///
    /// The mailbox holds only the latest reading; a consumer that
    /// falls behind sees the freshest value, not a backlog. Capture
    /// setup failures are returned here and leave the engine stopped.
    pub fn start(&mut self) -> Result<Receiver<PitchReading>> {
        self.stop();

        let (reading_tx, reading_rx) = bounded::<PitchReading>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (startup_tx, startup_rx) = bounded::<Result<u32>>(1);

        let stale_rx = reading_rx.clone();
        let handle = thread::spawn(move || {
            run_engine(reading_tx, stale_rx, shutdown_rx, startup_tx);
        });

        match startup_rx.recv() {
            Ok(Ok(sample_rate)) => {
                info!("pitch engine running at {sample_rate} Hz");
                self.worker = Some(EngineWorker {
                    shutdown_tx,
                    handle,
                });
                Ok(reading_rx)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(anyhow!("pitch engine worker exited before startup"))
            }
        }
    }

    /// Stops the pipeline. Idempotent. The capture tap is uninstalled
    /// before this returns and no further readings are published.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.shutdown_tx.send(());
            if worker.handle.join().is_err() {
                warn!("pitch engine worker panicked during shutdown");
            }
        }
    }
}

impl Drop for PitchEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_engine(
    reading_tx: Sender<PitchReading>,
    stale_rx: Receiver<PitchReading>,
    shutdown_rx: Receiver<()>,
    startup_tx: Sender<Result<u32>>,
) {
    let mut capture = match audio::start_capture() {
        Ok(capture) => {
            let _ = startup_tx.send(Ok(capture.sample_rate()));
            capture
        }
        Err(e) => {
            let _ = startup_tx.send(Err(e));
            return;
        }
    };

    let sample_rate = capture.sample_rate();
    let mut detector = PitchDetector::new();
    let mut throttle = Throttle::new(MAX_UPDATE_RATE_HZ);

    loop {
        select! {
            recv(capture.blocks()) -> block => match block {
                Ok(block) => {
                    if !throttle.accept(Instant::now()) {
                        continue;
                    }

                    let reading = match detector.process(&block, sample_rate) {
                        Some(frequency) => PitchReading::from_frequency(frequency),
                        None => PitchReading::silence(),
                    };
                    publish(&reading_tx, &stale_rx, reading);
                }
                Err(_) => {
                    debug!("capture channel closed");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => {
                debug!("pitch engine received shutdown signal");
                break;
            }
        }
    }

    capture.stop();
}

/// Latest-wins publish into the single-slot reading mailbox.
fn publish(
    reading_tx: &Sender<PitchReading>,
    stale_rx: &Receiver<PitchReading>,
    reading: PitchReading,
) {
    if let Err(rejected) = reading_tx.try_send(reading) {
        let _ = stale_rx.try_recv();
        let _ = reading_tx.try_send(rejected.into_inner());
    }
}
