//! # Note Mapping Module
//!
//! Equal-temperament conversions between frequencies and musical notes.
//! Maps a detected frequency to the nearest note, its octave, and the
//! deviation in cents, with A4 = 440 Hz as the reference.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Chromatic pitch classes, indexed by MIDI note number modulo 12.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI note number of A4 (440 Hz).
const MIDI_A4: f32 = 69.0;

/// The nearest equal-tempered note to a detected frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappedNote {
    /// Pitch class name ("C", "C#", ... "B").
    pub name: &'static str,
    /// Scientific octave number (A4 is octave 4).
    pub octave: i32,
    /// Deviation from the note center in cents, clamped to ±50.
    pub cents: f32,
}

impl MappedNote {
    /// Equal-temperament frequency of the note center in Hz.
    pub fn frequency(&self) -> f32 {
        let index = NOTE_NAMES.iter().position(|&n| n == self.name).unwrap_or(0) as i32;
        let midi = (self.octave + 1) * 12 + index;
        440.0 * 2.0_f32.powf((midi as f32 - MIDI_A4) / 12.0)
    }
}

impl std::fmt::Display for MappedNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.name, self.octave)
    }
}

/// Static map for note-name to frequency lookups ("A4" -> 440.0).
///
/// Covers C0 through B8, which comfortably spans the analysis band.
static NOTE_FREQUENCIES: Lazy<BTreeMap<String, f32>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    for octave in 0..=8 {
        for (index, name) in NOTE_NAMES.iter().enumerate() {
            let midi = (octave + 1) * 12 + index as i32;
            let frequency = 440.0 * 2.0_f32.powf((midi as f32 - MIDI_A4) / 12.0);
            map.insert(format!("{}{}", name, octave), frequency);
        }
    }
    map
});

/// Maps a frequency to the nearest equal-tempered note.
///
/// The exact (fractional) MIDI number is `12 * log2(f / 440) + 69`;
/// rounding gives the nearest note and the remainder becomes the cents
/// deviation (100 cents per semitone).
///
/// # Returns
/// * `Some(MappedNote)` for any positive frequency
/// * `None` for zero or negative input (the "no signal" sentinel)
pub fn map_frequency(frequency: f32) -> Option<MappedNote> {
    if frequency <= 0.0 {
        return None;
    }

    let exact_midi = 12.0 * (frequency / 440.0).log2() + MIDI_A4;
    let nearest = exact_midi.round();
    let cents = ((exact_midi - nearest) * 100.0).clamp(-50.0, 50.0);

    let midi = nearest as i32;
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;

    Some(MappedNote {
        name,
        octave,
        cents,
    })
}

/// Looks up the equal-temperament frequency for a note name like "A4".
///
/// Used by front ends to resolve a tuning target. Returns `None` for
/// names outside C0..B8 or with unrecognized spelling.
pub fn note_frequency(name: &str) -> Option<f32> {
    NOTE_FREQUENCIES.get(&name.to_uppercase()).copied()
}
