//! # Spectral Analysis Module
//!
//! Forward FFT processing for the pitch-detection path. Handles DC
//! offset removal, Hann windowing, and power-spectrum extraction.
//!
//! ## Features
//! - High-performance FFT using RustFFT
//! - Hann windowing for reduced spectral leakage
//! - DC offset removal for accurate analysis
//! - Power spectrum (magnitude squared) for peak searches

use rustfft::{FftPlanner, num_complex::Complex};

/// Removes the DC offset from a signal by making its average value zero.
///
/// A DC component shows up as energy at 0 Hz and can leak into the
/// low bins we search for a fundamental, so the signal is centered
/// around zero before windowing.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the buffer to reduce spectral leakage.
///
/// Tapering the block to zero at the edges keeps energy from a tone
/// between two bins from smearing across the whole spectrum.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n == 0 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Performs a forward FFT on one audio block and returns the complex spectrum.
///
/// Processing steps:
/// 1. DC offset removal
/// 2. Hann windowing
/// 3. Forward FFT transformation
///
/// # Panics
/// If the block length is zero or not a power of two. A malformed
/// block is a bug in the capture layer, not a runtime condition.
pub fn forward_spectrum(signal: &[f32]) -> Vec<Complex<f32>> {
    assert!(
        signal.len().is_power_of_two(),
        "audio block length must be a non-zero power of two, got {}",
        signal.len()
    );

    let mut processed = signal.to_vec();
    remove_dc_offset(&mut processed);
    apply_hann_window(&mut processed);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(signal.len());

    let mut buffer: Vec<Complex<f32>> = processed
        .into_iter()
        .map(|sample| Complex { re: sample, im: 0.0 })
        .collect();

    fft.process(&mut buffer);
    buffer
}

/// Calculates the power spectrum (magnitude squared) from a complex spectrum.
///
/// Only the first half of the spectrum is meaningful for a real input
/// signal (Nyquist), so only bins `[0, N/2)` are returned.
pub fn power_spectrum(spectrum: &[Complex<f32>]) -> Vec<f32> {
    spectrum
        .iter()
        .take(spectrum.len() / 2)
        .map(|c| c.norm_sqr())
        .collect()
}
