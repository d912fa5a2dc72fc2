//! Canned sound effects

use embedded_hal::digital::v2::OutputPin;

use super::speaker::{Melody, Note, Speaker, Tone};
use crate::error::Error;

const fn n(tone: Tone, length_ms: u32) -> Note {
    Note::new(tone, length_ms * 1000)
}

/// Ascending C-E-G arpeggio
static HIT: [Note; 3] = [n(Tone::C, 100), n(Tone::E, 100), n(Tone::G, 100)];

/// "Tulip" nursery melody
static TULIP: [Note; 49] = [
    n(Tone::C, 500),
    n(Tone::D, 500),
    n(Tone::E, 500),
    n(Tone::Rest, 500),
    n(Tone::C, 500),
    n(Tone::D, 500),
    n(Tone::E, 500),
    n(Tone::Rest, 500),
    //
    n(Tone::G, 500),
    n(Tone::E, 500),
    n(Tone::D, 500),
    n(Tone::C, 500),
    n(Tone::D, 500),
    n(Tone::E, 500),
    n(Tone::D, 500),
    n(Tone::Rest, 500),
    //
    n(Tone::C, 500),
    n(Tone::D, 500),
    n(Tone::E, 500),
    n(Tone::Rest, 500),
    n(Tone::C, 500),
    n(Tone::D, 500),
    n(Tone::E, 500),
    n(Tone::Rest, 500),
    //
    n(Tone::G, 500),
    n(Tone::E, 500),
    n(Tone::D, 500),
    n(Tone::C, 500),
    n(Tone::D, 500),
    n(Tone::E, 500),
    n(Tone::C, 500),
    n(Tone::Rest, 500),
    //
    n(Tone::G, 500),
    n(Tone::Rest, 1),
    n(Tone::G, 500),
    n(Tone::E, 500),
    n(Tone::G, 500),
    n(Tone::A, 500),
    n(Tone::Rest, 1),
    n(Tone::A, 500),
    n(Tone::G, 500),
    n(Tone::Rest, 500),
    //
    n(Tone::E, 500),
    n(Tone::Rest, 1),
    n(Tone::E, 500),
    n(Tone::D, 500),
    n(Tone::Rest, 1),
    n(Tone::D, 500),
    n(Tone::Ch, 1000),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SoundEffect {
    Hit,
    Tulip,
}

impl SoundEffect {
    pub fn melody(self) -> Melody {
        match self {
            SoundEffect::Hit => &HIT,
            SoundEffect::Tulip => &TULIP,
        }
    }

    /// Total playing time in microseconds
    pub fn duration_us(self) -> u32 {
        self.melody().iter().map(|note| note.length_us).sum()
    }

    /// Queue this effect on `speaker`
    pub fn play<P: OutputPin>(self, speaker: &mut Speaker<P>) -> Result<(), Error> {
        speaker.play(self.melody())
    }
}
