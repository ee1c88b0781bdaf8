//! # Pitch Detection Module
//!
//! Estimates the fundamental frequency of a live audio block. The
//! primary path is a band-limited spectral peak search with parabolic
//! sub-bin interpolation; low fundamentals and weak signals fall back
//! to time-domain autocorrelation, where coarse FFT bin spacing would
//! otherwise dominate the error.
//!
//! ## Features
//! - RMS noise gate to skip silent blocks cheaply
//! - Band-limited peak search (50–2200 Hz)
//! - Parabolic interpolation for sub-bin accuracy
//! - Autocorrelation fallback below 100 Hz or for weak signals
//! - Exponential smoothing to suppress frame-to-frame jitter

use crate::fft;

/// Lower edge of the supported analysis band in Hz.
pub const MIN_FREQUENCY_HZ: f32 = 50.0;
/// Upper edge of the supported analysis band in Hz.
pub const MAX_FREQUENCY_HZ: f32 = 2200.0;

/// Minimum block RMS for any detection attempt.
pub const RMS_THRESHOLD: f32 = 0.01;

/// Below this RMS the spectral peak is not trusted on its own and the
/// autocorrelation fallback runs as well.
const WEAK_RMS_THRESHOLD: f32 = 0.05;

/// Spectral estimates under this frequency are re-checked with
/// autocorrelation; bin spacing is too coarse down there.
const SPECTRAL_CONFIDENCE_FLOOR_HZ: f32 = 100.0;

/// A candidate peak must carry at least this multiple of the
/// energy-derived floor (`rms^2 * N`) to be reported.
const PEAK_GATE_FACTOR: f32 = 5.0;

/// Fraction of the zero-lag self-energy an autocorrelation peak must
/// reach to count as periodic.
const AUTOCORRELATION_THRESHOLD: f32 = 0.2;

/// Cost cap on the autocorrelation lag table.
const MAX_LAG_ENTRIES: usize = 2048;

/// Weight of the newest detection in the exponential smoother.
pub const SMOOTHING_FACTOR: f32 = 0.25;

/// Stateful pitch detector for a stream of fixed-size audio blocks.
///
/// Holds the smoothed output frequency between blocks; create one
/// detector per capture session and feed it blocks in order.
#[derive(Debug, Default)]
pub struct PitchDetector {
    smoothed: Option<f32>,
}

impl PitchDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzes one audio block and returns the smoothed fundamental.
    ///
    /// # Arguments
    /// * `samples` - one capture block; length must be a power of two
    /// * `sample_rate` - capture rate in Hz
    ///
    /// # Returns
    /// * `Some(frequency)` - smoothed estimate within the analysis band
    /// * `None` - no reliable pitch (silence, noise, or out of band)
    ///
    /// # Panics
    /// If the block length is zero or not a power of two.
    pub fn process(&mut self, samples: &[f32], sample_rate: u32) -> Option<f32> {
        assert!(
            samples.len().is_power_of_two(),
            "audio block length must be a non-zero power of two, got {}",
            samples.len()
        );

        let rms = (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
        if rms < RMS_THRESHOLD {
            // Silence: drop the smoothing state so a later onset does
            // not glide in from a stale frequency.
            self.smoothed = None;
            return None;
        }

        let spectral = spectral_estimate(samples, sample_rate, rms);

        let needs_fallback = rms < WEAK_RMS_THRESHOLD
            || spectral.is_some_and(|freq| freq < SPECTRAL_CONFIDENCE_FLOOR_HZ);

        let detected = if needs_fallback {
            autocorrelation_estimate(samples, sample_rate).or(spectral)
        } else {
            spectral
        };

        match detected {
            Some(freq) if (MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&freq) => {
                let smoothed = match self.smoothed {
                    Some(prev) => prev * (1.0 - SMOOTHING_FACTOR) + freq * SMOOTHING_FACTOR,
                    None => freq,
                };
                self.smoothed = Some(smoothed);
                Some(smoothed)
            }
            _ => {
                self.smoothed = None;
                None
            }
        }
    }

    /// Clears the smoothing state, e.g. when capture restarts.
    pub fn reset(&mut self) {
        self.smoothed = None;
    }
}

/// Band-limited spectral peak estimate with parabolic refinement.
///
/// Searches the power spectrum over the bins covering the analysis
/// band, gates the winner against an energy-derived floor, and refines
/// the bin index with a 3-point parabolic fit before converting to Hz.
fn spectral_estimate(samples: &[f32], sample_rate: u32, rms: f32) -> Option<f32> {
    let n = samples.len();
    let spectrum = fft::forward_spectrum(samples);
    let power = fft::power_spectrum(&spectrum);

    let bin_hz = sample_rate as f32 / n as f32;
    let lo = ((MIN_FREQUENCY_HZ / bin_hz).ceil() as usize).max(1);
    let hi = ((MAX_FREQUENCY_HZ / bin_hz).floor() as usize).min(power.len().saturating_sub(1));
    if lo >= hi {
        return None;
    }

    let (peak_bin, &peak_power) = power[lo..=hi]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(offset, p)| (lo + offset, p))?;

    // Reject incidental peaks: a real tone concentrates far more power
    // in one bin than the block's mean energy floor.
    if peak_power < PEAK_GATE_FACTOR * rms * rms * n as f32 {
        return None;
    }

    // 3-point parabolic interpolation on magnitudes for the fractional
    // bin offset. Skip at the search-band edges.
    let refined_bin = if peak_bin > 0 && peak_bin + 1 < power.len() {
        let y1 = power[peak_bin - 1].sqrt();
        let y2 = peak_power.sqrt();
        let y3 = power[peak_bin + 1].sqrt();
        let denominator = y1 - 2.0 * y2 + y3;
        if denominator.abs() < 1e-12 {
            peak_bin as f32
        } else {
            let offset = 0.5 * (y1 - y3) / denominator;
            peak_bin as f32 + offset.clamp(-0.5, 0.5)
        }
    } else {
        peak_bin as f32
    };

    let frequency = refined_bin * bin_hz;
    frequency.is_finite().then_some(frequency)
}

/// Unnormalized autocorrelation pitch estimate.
///
/// Correlates the first `N/2` samples of the block against itself over
/// the lag range covering the analysis band, capped for cost control.
/// The best lag is accepted only if its correlation reaches a fraction
/// of the zero-lag self-energy, which rejects aperiodic noise.
fn autocorrelation_estimate(samples: &[f32], sample_rate: u32) -> Option<f32> {
    let window = samples.len() / 2;
    if window == 0 {
        return None;
    }

    let min_lag = ((sample_rate as f32 / MAX_FREQUENCY_HZ) as usize).max(1);
    let max_lag = ((sample_rate as f32 / MIN_FREQUENCY_HZ) as usize)
        .min(window)
        .min(MAX_LAG_ENTRIES);
    if min_lag >= max_lag {
        return None;
    }

    let energy: f32 = samples[..window].iter().map(|&s| s * s).sum();
    if energy <= 0.0 {
        return None;
    }

    let mut best_lag = 0;
    let mut best_correlation = 0.0f32;
    for lag in min_lag..=max_lag {
        let mut correlation = 0.0f32;
        for i in 0..window {
            correlation += samples[i] * samples[i + lag];
        }
        if correlation > best_correlation {
            best_correlation = correlation;
            best_lag = lag;
        }
    }

    if best_lag == 0 || best_correlation < AUTOCORRELATION_THRESHOLD * energy {
        return None;
    }

    Some(sample_rate as f32 / best_lag as f32)
}
