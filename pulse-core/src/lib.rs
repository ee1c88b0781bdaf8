// pulse-core/src/lib.rs

//! The core logic for the Pulse practice instrument.
//! This crate is responsible for metronome scheduling, tap-tempo
//! estimation, audio capture, and pitch detection. It is completely
//! headless and contains no UI code.

pub mod audio;
pub mod click;
pub mod engine;
pub mod fft;
pub mod note;
pub mod pitch;
pub mod session;
pub mod tap;
pub mod tempo;

use note::MappedNote;

/// Represents the result of a single pitch-analysis frame.
#[derive(Debug, Clone)]
pub struct PitchReading {
    /// The detected fundamental frequency in Hz. 0.0 means "no signal".
    pub frequency: f32,
    /// How close the detection sits to its nearest note (0.0 to 1.0).
    pub confidence: f32,
    /// The nearest equal-tempered note, if a pitch was detected.
    pub note: Option<MappedNote>,
}

impl PitchReading {
    /// The sentinel reading used while no reliable pitch is present.
    pub fn silence() -> Self {
        Self {
            frequency: 0.0,
            confidence: 0.0,
            note: None,
        }
    }

    /// Builds a reading from a detected frequency, deriving the nearest
    /// note and a cents-based confidence score.
    pub fn from_frequency(frequency: f32) -> Self {
        match note::map_frequency(frequency) {
            Some(mapped) => {
                let confidence = (1.0 - mapped.cents.abs() / 50.0).clamp(0.0, 1.0);
                Self {
                    frequency,
                    confidence,
                    note: Some(mapped),
                }
            }
            None => Self::silence(),
        }
    }
}
