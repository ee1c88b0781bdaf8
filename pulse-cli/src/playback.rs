//! Click playback through the default output device.
//!
//! The output callback owns the rendered [`ClickSet`] and a trigger
//! mailbox; [`ClickPlayer::trigger`] is non-blocking, so the tempo
//! clock never waits on playback. A trigger that arrives while a click
//! is still sounding restarts playback with the new click.

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Sender, bounded};
use log::{error, info};
use pulse_core::click::{ClickKind, ClickSet};

pub struct ClickPlayer {
    // Held for its lifetime; dropping the stream stops playback.
    _stream: cpal::Stream,
    trigger_tx: Sender<ClickKind>,
}

impl ClickPlayer {
    /// Opens the default output device and starts a silent stream that
    /// renders clicks on demand.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no audio output device available"))?;
        let config = device.default_output_config()?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(anyhow!(
                "default output format is not f32: {:?}",
                config.sample_format()
            ));
        }
        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        info!(
            "click playback on {} at {} Hz",
            device.name()?,
            sample_rate
        );

        let clicks = ClickSet::new(sample_rate);
        let (trigger_tx, trigger_rx) = bounded::<ClickKind>(4);

        // Playback cursor: which click is sounding and how far in.
        let mut current: Option<(ClickKind, usize)> = None;

        let err_fn = |err| error!("audio output error: {err}");
        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    if let Ok(kind) = trigger_rx.try_recv() {
                        current = Some((kind, 0));
                    }

                    let value = match current {
                        Some((kind, position)) => {
                            let tone = clicks.tone(kind);
                            let sample = tone.samples.get(position).copied();
                            match sample {
                                Some(s) => {
                                    current = Some((kind, position + 1));
                                    s
                                }
                                None => {
                                    current = None;
                                    0.0
                                }
                            }
                        }
                        None => 0.0,
                    };

                    for out in frame.iter_mut() {
                        *out = value;
                    }
                }
            },
            err_fn,
            None,
        )?;
        stream.play()?;

        Ok(Self {
            _stream: stream,
            trigger_tx,
        })
    }

    /// Queues a click. Never blocks; if the trigger queue is full the
    /// click is dropped rather than stalling the caller.
    pub fn trigger(&self, kind: ClickKind) {
        let _ = self.trigger_tx.try_send(kind);
    }
}
