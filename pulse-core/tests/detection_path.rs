//! End-to-end checks of the analysis path: synthetic signal in,
//! note/accuracy metrics out, with no audio hardware involved.

use pulse_core::PitchReading;
use pulse_core::pitch::PitchDetector;
use pulse_core::session::{AccuracyHistory, accuracy_score};

const SAMPLE_RATE: u32 = 44100;
const BLOCK: usize = 2048;

fn sine_block(freq: f32, amplitude: f32) -> Vec<f32> {
    (0..BLOCK)
        .map(|i| {
            amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin()
        })
        .collect()
}

#[test]
fn concert_a_resolves_to_a4_with_high_accuracy() {
    let mut detector = PitchDetector::new();
    let frequency = detector
        .process(&sine_block(440.0, 0.5), SAMPLE_RATE)
        .expect("440 Hz tone must be detected");

    let reading = PitchReading::from_frequency(frequency);
    let note = reading.note.expect("note must be mapped");
    assert_eq!((note.name, note.octave), ("A", 4));
    assert!(note.cents.abs() < 15.0);
    assert!(reading.confidence > 0.5);

    let score = accuracy_score(frequency, 440.0);
    assert!(score > 0.8, "accuracy {score} too low for a clean tone");
}

#[test]
fn low_string_resolves_through_the_fallback_path() {
    // 82.4 Hz (low E) forces the autocorrelation fallback; the mapped
    // note must still come out as E2.
    let mut detector = PitchDetector::new();
    let frequency = detector
        .process(&sine_block(82.4, 0.5), SAMPLE_RATE)
        .expect("82.4 Hz tone must be detected");

    let note = PitchReading::from_frequency(frequency).note.unwrap();
    assert_eq!((note.name, note.octave), ("E", 2));
}

#[test]
fn a_practice_session_accumulates_stable_metrics() {
    let mut detector = PitchDetector::new();
    let mut history = AccuracyHistory::new();

    // Fifteen consecutive near-target frames.
    for _ in 0..15 {
        if let Some(frequency) = detector.process(&sine_block(441.0, 0.4), SAMPLE_RATE) {
            history.record(accuracy_score(frequency, 440.0));
        }
    }

    assert!(history.len() >= 10);
    assert!(history.average() > 0.7);
    let stability = history.stability().expect("ten readings recorded");
    assert!(
        (0.9..=1.0).contains(&stability),
        "steady tone should be highly stable, got {stability}"
    );
}

#[test]
fn silence_produces_the_sentinel_reading() {
    let mut detector = PitchDetector::new();
    let result = detector.process(&vec![0.0; BLOCK], SAMPLE_RATE);
    assert!(result.is_none());

    let reading = PitchReading::silence();
    assert_eq!(reading.frequency, 0.0);
    assert!(reading.note.is_none());
    assert_eq!(reading.confidence, 0.0);
}
