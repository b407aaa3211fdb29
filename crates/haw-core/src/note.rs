//! Pitches, musical durations and quantized note events

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HawError, Result};

/// Steps in one bar (16th-note grid)
pub const STEPS_PER_BAR: u8 = 16;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B"];

/// A note name plus octave, e.g. `C#4` or `Eb2`.
///
/// Two pitches are equal when they sound the same (`C#4 == Db4`); the
/// spelling the caller used is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch {
    midi: u8,
    name: String,
}

impl Pitch {
    /// Build a pitch from a MIDI note number using the default spelling
    pub fn from_midi(midi: u8) -> Self {
        let midi = midi.min(127);
        let octave = i16::from(midi / 12) - 1;
        let name = format!("{}{}", NOTE_NAMES[usize::from(midi % 12)], octave);
        Self { midi, name }
    }

    /// MIDI note number (0-127, 60 = C4)
    pub fn midi(&self) -> u8 {
        self.midi
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for Pitch {
    type Err = HawError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || HawError::InvalidPitch(s.to_string());
        let trimmed = s.trim();
        let mut chars = trimmed.chars();

        let letter = chars.next().ok_or_else(invalid)?.to_ascii_uppercase();
        let base: i16 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };

        let rest = chars.as_str();
        let (accidental, octave_str) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        let octave: i16 = octave_str.parse().map_err(|_| invalid())?;
        if !(-1..=9).contains(&octave) {
            return Err(invalid());
        }
        let midi = base + accidental + (octave + 1) * 12;
        if !(0..=127).contains(&midi) {
            return Err(invalid());
        }

        let accidental_str = match accidental {
            1 => "#",
            -1 => "b",
            _ => "",
        };

        Ok(Self {
            midi: midi as u8,
            name: format!("{letter}{accidental_str}{octave}"),
        })
    }
}

impl TryFrom<String> for Pitch {
    type Error = HawError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Pitch> for String {
    fn from(pitch: Pitch) -> Self {
        pitch.name
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for Pitch {
    fn eq(&self, other: &Self) -> bool {
        self.midi == other.midi
    }
}

impl Eq for Pitch {}

impl Hash for Pitch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.midi.hash(state);
    }
}

impl PartialOrd for Pitch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pitch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.midi.cmp(&other.midi)
    }
}

/// Musical note length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NoteDuration {
    #[default]
    #[serde(rename = "16n")]
    Sixteenth,
    #[serde(rename = "8n")]
    Eighth,
    #[serde(rename = "4n")]
    Quarter,
    #[serde(rename = "2n")]
    Half,
    #[serde(rename = "1m")]
    Bar,
}

impl NoteDuration {
    /// Length in 16th steps
    pub fn steps(&self) -> u8 {
        match self {
            Self::Sixteenth => 1,
            Self::Eighth => 2,
            Self::Quarter => 4,
            Self::Half => 8,
            Self::Bar => 16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sixteenth => "16n",
            Self::Eighth => "8n",
            Self::Quarter => "4n",
            Self::Half => "2n",
            Self::Bar => "1m",
        }
    }
}

impl FromStr for NoteDuration {
    type Err = HawError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "16n" => Ok(Self::Sixteenth),
            "8n" => Ok(Self::Eighth),
            "4n" => Ok(Self::Quarter),
            "2n" => Ok(Self::Half),
            "1m" => Ok(Self::Bar),
            other => Err(HawError::InvalidDuration(other.to_string())),
        }
    }
}

/// A quantized note inside a one-bar clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: Pitch,
    /// Velocity (0.0 to 1.0)
    pub velocity: f32,
    /// Grid position (0-15)
    pub step: u8,
    pub duration: NoteDuration,
}

impl NoteEvent {
    /// Create a note, clamping step and velocity into range
    pub fn new(pitch: Pitch, velocity: f32, step: u8, duration: NoteDuration) -> Self {
        Self {
            pitch,
            velocity: clamp_velocity(velocity),
            step: step.min(STEPS_PER_BAR - 1),
            duration,
        }
    }

    /// Same note with step and velocity forced back into range
    pub fn sanitized(mut self) -> Self {
        self.step = self.step.min(STEPS_PER_BAR - 1);
        self.velocity = clamp_velocity(self.velocity);
        self
    }
}

pub(crate) fn clamp_velocity(velocity: f32) -> f32 {
    if velocity.is_nan() {
        return 0.0;
    }
    velocity.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pitch() {
        let c4: Pitch = "C4".parse().unwrap();
        assert_eq!(c4.midi(), 60);
        assert_eq!(c4.name(), "C4");

        let eb4: Pitch = "Eb4".parse().unwrap();
        assert_eq!(eb4.midi(), 63);

        let low: Pitch = "C-1".parse().unwrap();
        assert_eq!(low.midi(), 0);

        assert_eq!("G9".parse::<Pitch>().unwrap().midi(), 127);
    }

    #[test]
    fn test_malformed_pitch_rejected() {
        assert!("H4".parse::<Pitch>().is_err());
        assert!("C".parse::<Pitch>().is_err());
        assert!("".parse::<Pitch>().is_err());
        assert!("G#9".parse::<Pitch>().is_err());
        assert!("C3000".parse::<Pitch>().is_err());
        assert!("C5461".parse::<Pitch>().is_err());
        assert!("C32767".parse::<Pitch>().is_err());
        assert!("C-32768".parse::<Pitch>().is_err());
        assert!("C10".parse::<Pitch>().is_err());
        assert!("C-2".parse::<Pitch>().is_err());
        assert_eq!("C-1".parse::<Pitch>().map(|p| p.midi()), Ok(0));
        assert_eq!("G9".parse::<Pitch>().map(|p| p.midi()), Ok(127));
        assert_eq!(
            "X1".parse::<Pitch>(),
            Err(HawError::InvalidPitch("X1".to_string()))
        );
    }

    #[test]
    fn test_enharmonic_equality() {
        let a: Pitch = "C#4".parse().unwrap();
        let b: Pitch = "Db4".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "C#4");
        assert_eq!(b.to_string(), "Db4");
    }

    #[test]
    fn test_from_midi_spelling() {
        assert_eq!(Pitch::from_midi(60).name(), "C4");
        assert_eq!(Pitch::from_midi(63).name(), "Eb4");
        assert_eq!(Pitch::from_midi(36).name(), "C2");
    }

    #[test]
    fn test_duration_steps() {
        assert_eq!("16n".parse::<NoteDuration>().unwrap().steps(), 1);
        assert_eq!("8n".parse::<NoteDuration>().unwrap().steps(), 2);
        assert_eq!(NoteDuration::Bar.steps(), 16);
        assert!("3n".parse::<NoteDuration>().is_err());
    }

    #[test]
    fn test_note_event_clamps() {
        let note = NoteEvent::new(Pitch::from_midi(60), 1.7, 40, NoteDuration::Eighth);
        assert_eq!(note.step, 15);
        assert_eq!(note.velocity, 1.0);
    }
}
