//! # Tap Tempo Module
//!
//! Derives a BPM estimate from the intervals between user taps, plus a
//! small deduplicated history of accepted tap tempos for later recall.

use std::collections::VecDeque;
use std::time::Instant;

use crate::tempo::{MAX_BPM, clamp_bpm};

/// Number of taps required before an estimate is produced; older taps
/// are evicted beyond this window.
pub const TAP_WINDOW: usize = 5;

/// Capacity of the accepted-tempo recall history.
pub const BPM_HISTORY_CAPACITY: usize = 10;

/// Rolling window of tap timestamps.
#[derive(Debug, Default)]
pub struct TapTempoEstimator {
    taps: VecDeque<Instant>,
}

impl TapTempoEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one tap.
    ///
    /// Returns the estimated tempo once the window holds [`TAP_WINDOW`]
    /// taps: the inter-tap intervals are averaged and converted to BPM,
    /// clamped to the supported [40, 240] domain. Earlier taps are only
    /// recorded and yield `None`.
    pub fn register_tap(&mut self, at: Instant) -> Option<u32> {
        self.taps.push_back(at);
        if self.taps.len() > TAP_WINDOW {
            self.taps.pop_front();
        }
        if self.taps.len() < TAP_WINDOW {
            return None;
        }

        let total: f64 = self
            .taps
            .iter()
            .zip(self.taps.iter().skip(1))
            .map(|(a, b)| b.duration_since(*a).as_secs_f64())
            .sum();
        let average = total / (TAP_WINDOW - 1) as f64;
        if average <= 0.0 {
            return Some(MAX_BPM);
        }

        Some(clamp_bpm((60.0 / average).round() as u32))
    }

    /// Number of taps currently in the window.
    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    /// Discards all recorded taps, e.g. after an idle pause.
    pub fn reset(&mut self) {
        self.taps.clear();
    }
}

/// Deduplicated recall history of tap-accepted BPM values.
///
/// A tempo already present is not re-added; the oldest entry is
/// evicted once [`BPM_HISTORY_CAPACITY`] is exceeded.
#[derive(Debug, Default)]
pub struct BpmHistory {
    entries: VecDeque<u32>,
}

impl BpmHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, bpm: u32) {
        if self.entries.contains(&bpm) {
            return;
        }
        self.entries.push_back(bpm);
        if self.entries.len() > BPM_HISTORY_CAPACITY {
            self.entries.pop_front();
        }
    }

    /// Recorded tempos, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
