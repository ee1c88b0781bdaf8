//! # Session Metrics Module
//!
//! Rolling practice-session statistics: tuning-accuracy history with a
//! variance-based stability score, and a tempo-change log with a trend
//! classifier and a suggested next practice tempo.

use std::collections::VecDeque;

use crate::tempo::{MAX_BPM, MIN_BPM};

/// Default capacity of the accuracy ring buffer.
pub const ACCURACY_CAPACITY: usize = 100;

/// Number of recent readings the stability score is computed over.
const STABILITY_WINDOW: usize = 10;

/// Tolerance around a target frequency that still counts as "on
/// pitch"; accuracy falls linearly to zero across it.
pub const FREQUENCY_TOLERANCE_HZ: f32 = 20.0;

/// Scores how close a detected frequency is to a target, in [0, 1].
///
/// `max(0, 1 - |detected - target| / tolerance)` with the fixed
/// ±20 Hz tolerance. A non-positive target scores zero.
pub fn accuracy_score(detected_hz: f32, target_hz: f32) -> f32 {
    if target_hz <= 0.0 {
        return 0.0;
    }
    (1.0 - (detected_hz - target_hz).abs() / FREQUENCY_TOLERANCE_HZ).max(0.0)
}

/// Bounded ring buffer of accuracy readings in [0, 1].
#[derive(Debug)]
pub struct AccuracyHistory {
    entries: VecDeque<f32>,
    capacity: usize,
}

impl Default for AccuracyHistory {
    fn default() -> Self {
        Self::with_capacity(ACCURACY_CAPACITY)
    }
}

impl AccuracyHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    /// If `capacity` is smaller than the ten-reading stability window.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity >= STABILITY_WINDOW,
            "accuracy history capacity must hold the stability window, got {capacity}"
        );
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a reading, evicting the oldest beyond capacity.
    pub fn record(&mut self, accuracy: f32) {
        self.entries.push_back(accuracy.clamp(0.0, 1.0));
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Mean of all retained readings, 0 when empty.
    pub fn average(&self) -> f32 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.iter().sum::<f32>() / self.entries.len() as f32
    }

    /// Variance-based stability of the last ten readings.
    ///
    /// `max(0, 1 - variance)`, so a steady stream of readings scores
    /// near 1 and an erratic one near 0. `None` until ten readings
    /// exist.
    pub fn stability(&self) -> Option<f32> {
        if self.entries.len() < STABILITY_WINDOW {
            return None;
        }
        let recent: Vec<f32> = self
            .entries
            .iter()
            .rev()
            .take(STABILITY_WINDOW)
            .copied()
            .collect();
        let mean = recent.iter().sum::<f32>() / recent.len() as f32;
        let variance =
            recent.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / recent.len() as f32;
        Some((1.0 - variance).max(0.0))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Direction of recent tempo changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoTrend {
    /// Fewer than three changes recorded so far.
    BuildingData,
    Increasing,
    Decreasing,
    Mixed,
}

impl TempoTrend {
    pub fn describe(self) -> &'static str {
        match self {
            TempoTrend::BuildingData => "Building data...",
            TempoTrend::Increasing => "Tempo increasing - great progress!",
            TempoTrend::Decreasing => "Tempo decreasing - take your time",
            TempoTrend::Mixed => "Exploring different tempos",
        }
    }
}

/// Consecutive-deduplicated log of tempo changes, capacity 50.
#[derive(Debug, Default)]
pub struct TempoSessionLog {
    changes: VecDeque<u32>,
}

const TEMPO_LOG_CAPACITY: usize = 50;
const TREND_WINDOW: usize = 5;

impl TempoSessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a tempo change. Repeats of the current tempo are
    /// ignored; the oldest entry is evicted beyond capacity.
    pub fn record(&mut self, bpm: u32) {
        if self.changes.back() == Some(&bpm) {
            return;
        }
        self.changes.push_back(bpm);
        if self.changes.len() > TEMPO_LOG_CAPACITY {
            self.changes.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Classifies the direction of the last five tempo changes.
    pub fn trend(&self) -> TempoTrend {
        if self.changes.len() < 3 {
            return TempoTrend::BuildingData;
        }
        let recent: Vec<u32> = self
            .changes
            .iter()
            .rev()
            .take(TREND_WINDOW)
            .rev()
            .copied()
            .collect();
        let increasing = recent.windows(2).all(|w| w[0] <= w[1]);
        let decreasing = recent.windows(2).all(|w| w[0] >= w[1]);
        match (increasing, decreasing) {
            (true, _) => TempoTrend::Increasing,
            (_, true) => TempoTrend::Decreasing,
            _ => TempoTrend::Mixed,
        }
    }

    /// Suggests the next practice tempo from the current one.
    ///
    /// Trending upward below 200 BPM earns roughly an 8% bump for
    /// progressive practice; otherwise, above 60 BPM, roughly a 10%
    /// step down for accuracy work. Suggestions stay inside [40, 240].
    pub fn suggest_next(&self, current_bpm: u32) -> Option<u32> {
        if self.changes.len() < 3 {
            return None;
        }
        if self.trend() == TempoTrend::Increasing && current_bpm < 200 {
            let increment = (current_bpm as f32 * 0.08) as u32;
            Some((current_bpm + increment.max(5)).min(MAX_BPM))
        } else if current_bpm > 60 {
            let decrement = (current_bpm as f32 * 0.10) as u32;
            Some((current_bpm - decrement.max(5)).max(MIN_BPM))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_score_is_linear_within_tolerance() {
        assert_eq!(accuracy_score(440.0, 440.0), 1.0);
        assert!((accuracy_score(450.0, 440.0) - 0.5).abs() < 1e-6);
        assert_eq!(accuracy_score(480.0, 440.0), 0.0);
        assert_eq!(accuracy_score(440.0, 0.0), 0.0);
    }

    #[test]
    fn history_never_exceeds_capacity() {
        let mut history = AccuracyHistory::with_capacity(50);
        for i in 0..500 {
            history.record((i % 10) as f32 / 10.0);
            assert!(history.len() <= 50);
        }
        assert_eq!(history.len(), 50);
    }

    #[test]
    #[should_panic(expected = "stability window")]
    fn undersized_capacity_is_rejected() {
        let _ = AccuracyHistory::with_capacity(5);
    }

    #[test]
    fn average_is_zero_when_empty() {
        assert_eq!(AccuracyHistory::new().average(), 0.0);
    }

    #[test]
    fn average_covers_all_retained_entries() {
        let mut history = AccuracyHistory::new();
        history.record(0.2);
        history.record(0.4);
        history.record(0.6);
        assert!((history.average() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn stability_requires_ten_readings() {
        let mut history = AccuracyHistory::new();
        for _ in 0..9 {
            history.record(0.8);
        }
        assert!(history.stability().is_none());
        history.record(0.8);
        assert!(history.stability().is_some());
    }

    #[test]
    fn stability_stays_in_unit_range() {
        let mut history = AccuracyHistory::new();
        // Worst case: alternating extremes.
        for i in 0..40 {
            history.record(if i % 2 == 0 { 0.0 } else { 1.0 });
            if let Some(stability) = history.stability() {
                assert!((0.0..=1.0).contains(&stability));
            }
        }
        let noisy = history.stability().unwrap();

        let mut steady = AccuracyHistory::new();
        for _ in 0..20 {
            steady.record(0.9);
        }
        assert!(steady.stability().unwrap() > noisy);
        assert!((steady.stability().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tempo_log_skips_consecutive_repeats() {
        let mut log = TempoSessionLog::new();
        log.record(120);
        log.record(120);
        log.record(126);
        log.record(126);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn tempo_log_evicts_beyond_capacity() {
        let mut log = TempoSessionLog::new();
        for bpm in 40..140 {
            log.record(bpm);
        }
        assert_eq!(log.len(), 50);
    }

    #[test]
    fn rising_tempos_trend_increasing() {
        let mut log = TempoSessionLog::new();
        for bpm in [100, 108, 116, 124] {
            log.record(bpm);
        }
        assert_eq!(log.trend(), TempoTrend::Increasing);
        let suggestion = log.suggest_next(124).unwrap();
        assert!(suggestion > 124 && suggestion <= MAX_BPM);
    }

    #[test]
    fn falling_tempos_suggest_slowing_down() {
        let mut log = TempoSessionLog::new();
        for bpm in [140, 120, 100] {
            log.record(bpm);
        }
        assert_eq!(log.trend(), TempoTrend::Decreasing);
        let suggestion = log.suggest_next(100).unwrap();
        assert!(suggestion < 100 && suggestion >= MIN_BPM);
    }

    #[test]
    fn suggestions_respect_the_bpm_domain() {
        let mut log = TempoSessionLog::new();
        for bpm in [180, 190, 198] {
            log.record(bpm);
        }
        assert!(log.suggest_next(198).unwrap() <= MAX_BPM);

        let mut slow = TempoSessionLog::new();
        for bpm in [80, 70, 62] {
            slow.record(bpm);
        }
        assert!(slow.suggest_next(62).unwrap() >= MIN_BPM);
    }
}
