//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio
//! Library). Incoming callback data is framed into fixed-size analysis
//! blocks and handed to the consumer through a single-slot mailbox:
//! the capture callback never blocks, and a block that was not picked
//! up in time is superseded by the newer one rather than queued.
//!
//! ## Features
//! - Automatic input-device and config selection (f32 mono, 44.1 kHz)
//! - Power-of-two block framing for the FFT path
//! - Bounded handoff with latest-wins semantics
//! - Deterministic stream teardown

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, bounded};
use log::{error, info};

/// Samples per analysis block. Must stay a power of two for the FFT
/// path; 2048 at 44.1 kHz is ~46 ms of signal.
pub const BLOCK_SIZE: usize = 2048;

/// Preferred capture rate in Hz.
const TARGET_SAMPLE_RATE: u32 = 44100;

/// A live capture session. Dropping it (or calling [`Capture::stop`])
/// tears the stream down.
pub struct Capture {
    stream: Option<cpal::Stream>,
    sample_rate: u32,
    blocks: Receiver<Vec<f32>>,
}

impl Capture {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The block mailbox. Holds at most one pending block; a new block
    /// replaces an unconsumed one.
    pub fn blocks(&self) -> &Receiver<Vec<f32>> {
        &self.blocks
    }

    /// Uninstalls the capture tap. Idempotent; no further blocks are
    /// produced once this returns.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                error!("error pausing capture stream: {e}");
            }
            drop(stream);
            info!("audio capture stopped");
        }
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts audio capture from the default input device.
///
/// Selects an f32 mono input config as close to 44.1 kHz as the device
/// supports, then frames callback data into [`BLOCK_SIZE`]-sample
/// blocks for the analysis side.
///
/// # Returns
/// * `Ok(Capture)` - live session with its block mailbox
/// * `Err(e)` - no device, no usable config, or the stream failed
pub fn start_capture() -> Result<Capture> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no audio input device available"))?;
    info!("using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported = pick_input_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("no suitable f32 mono input format found"))?;

    let clamped_rate = cpal::SampleRate(
        TARGET_SAMPLE_RATE
            .clamp(supported.min_sample_rate().0, supported.max_sample_rate().0),
    );
    let config = supported.with_sample_rate(clamped_rate);
    let sample_rate = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();
    info!("selected sample rate: {sample_rate} Hz");

    let (block_tx, block_rx) = bounded::<Vec<f32>>(1);
    // The callback side keeps a receiver clone so a stale block can be
    // dropped to make room for the newer one.
    let stale_rx = block_rx.clone();

    let err_fn = |err| error!("audio stream error: {err}");
    let mut accumulator = Vec::with_capacity(BLOCK_SIZE * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            accumulator.extend_from_slice(data);

            while accumulator.len() >= BLOCK_SIZE {
                let block = accumulator[..BLOCK_SIZE].to_vec();
                accumulator.drain(..BLOCK_SIZE);

                if let Err(rejected) = block_tx.try_send(block) {
                    // Mailbox full: drop the stale block, newest wins.
                    let _ = stale_rx.try_recv();
                    let _ = block_tx.try_send(rejected.into_inner());
                }
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok(Capture {
        stream: Some(stream),
        sample_rate,
        blocks: block_rx,
    })
}

/// Finds the best supported configuration for the target sample rate:
/// mono, f32, rate range closest to the target.
fn pick_input_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i32 - target_rate as i32).abs();
            let max_diff = (c.max_sample_rate().0 as i32 - target_rate as i32).abs();
            min_diff.min(max_diff)
        })
}
