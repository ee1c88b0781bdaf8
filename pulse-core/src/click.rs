//! # Click Synthesis Module
//!
//! Metronome click tones. Each tick kind gets its own short sine burst
//! with an exponential decay; the accent is brighter and louder than a
//! plain beat, subdivision ticks sit underneath both.

use crate::tempo::TickEvent;

/// Which click a tick should trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    Accent,
    Beat,
    Subdivision,
}

impl ClickKind {
    /// Maps a tick event to the click it should play.
    pub fn for_event(event: &TickEvent) -> Self {
        if event.is_subdivision {
            ClickKind::Subdivision
        } else if event.is_accent {
            ClickKind::Accent
        } else {
            ClickKind::Beat
        }
    }
}

/// A pre-rendered click sound.
#[derive(Debug, Clone)]
pub struct ClickTone {
    /// Mono samples in [-1, 1].
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl ClickTone {
    /// Downbeat accent: 1 kHz, 15 ms, prominent.
    pub fn accent(sample_rate: u32) -> Self {
        Self::synthesize(sample_rate, 1000.0, 0.015, 0.8)
    }

    /// Plain beat: 800 Hz, 12 ms.
    pub fn beat(sample_rate: u32) -> Self {
        Self::synthesize(sample_rate, 800.0, 0.012, 0.5)
    }

    /// Subdivision tick: 600 Hz, 8 ms, quiet.
    pub fn subdivision(sample_rate: u32) -> Self {
        Self::synthesize(sample_rate, 600.0, 0.008, 0.3)
    }

    /// Sine burst with exponential decay.
    fn synthesize(sample_rate: u32, freq: f32, duration_secs: f32, gain: f32) -> Self {
        let num_samples = (sample_rate as f32 * duration_secs) as usize;
        let mut samples = Vec::with_capacity(num_samples);
        for i in 0..num_samples {
            let t = i as f32 / sample_rate as f32;
            let envelope = (-t * 40.0).exp();
            samples.push((t * freq * std::f32::consts::TAU).sin() * envelope * gain);
        }
        Self {
            samples,
            sample_rate,
        }
    }
}

/// The three click tones rendered for one output sample rate.
#[derive(Debug, Clone)]
pub struct ClickSet {
    accent: ClickTone,
    beat: ClickTone,
    subdivision: ClickTone,
}

impl ClickSet {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            accent: ClickTone::accent(sample_rate),
            beat: ClickTone::beat(sample_rate),
            subdivision: ClickTone::subdivision(sample_rate),
        }
    }

    pub fn tone(&self, kind: ClickKind) -> &ClickTone {
        match kind {
            ClickKind::Accent => &self.accent,
            ClickKind::Beat => &self.beat,
            ClickKind::Subdivision => &self.subdivision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_lengths_match_their_durations() {
        let accent = ClickTone::accent(48000);
        assert_eq!(accent.samples.len(), (48000.0f32 * 0.015) as usize);
        let subdivision = ClickTone::subdivision(44100);
        assert_eq!(subdivision.samples.len(), (44100.0f32 * 0.008) as usize);
    }

    #[test]
    fn samples_stay_in_range() {
        let set = ClickSet::new(48000);
        for kind in [ClickKind::Accent, ClickKind::Beat, ClickKind::Subdivision] {
            for &s in &set.tone(kind).samples {
                assert!((-1.0..=1.0).contains(&s));
            }
        }
    }

    #[test]
    fn event_mapping_prefers_subdivision_flag() {
        let sub = TickEvent {
            beat_index: 0,
            is_accent: false,
            is_subdivision: true,
        };
        assert_eq!(ClickKind::for_event(&sub), ClickKind::Subdivision);

        let down = TickEvent {
            beat_index: 0,
            is_accent: true,
            is_subdivision: false,
        };
        assert_eq!(ClickKind::for_event(&down), ClickKind::Accent);

        let plain = TickEvent {
            beat_index: 2,
            is_accent: false,
            is_subdivision: false,
        };
        assert_eq!(ClickKind::for_event(&plain), ClickKind::Beat);
    }
}
