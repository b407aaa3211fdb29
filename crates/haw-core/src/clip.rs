//! One-bar quantized clips

use serde::{Deserialize, Serialize};

use crate::note::{NoteEvent, Pitch};

/// A loopable set of notes bound to exactly one bar.
///
/// At most one note exists per `(step, pitch)` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Clip name/label
    #[serde(default)]
    pub name: String,
    notes: Vec<NoteEvent>,
}

impl Clip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a clip from raw notes; a later duplicate replaces an earlier one
    pub fn from_notes(notes: impl IntoIterator<Item = NoteEvent>) -> Self {
        let mut clip = Self::new();
        clip.replace_notes(notes);
        clip
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// An empty clip schedules nothing
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn contains(&self, step: u8, pitch: &Pitch) -> bool {
        self.notes_at(step).any(|n| &n.pitch == pitch)
    }

    /// Insert a note, replacing any note at the same step and pitch
    pub fn insert(&mut self, note: NoteEvent) {
        let note = note.sanitized();
        match self.position(note.step, &note.pitch) {
            Some(idx) => self.notes[idx] = note,
            None => self.notes.push(note),
        }
    }

    /// Remove the note at `step`/`pitch`, if any
    pub fn remove(&mut self, step: u8, pitch: &Pitch) -> Option<NoteEvent> {
        let idx = self.position(step, pitch)?;
        Some(self.notes.remove(idx))
    }

    /// Replace the whole note list
    pub fn replace_notes(&mut self, notes: impl IntoIterator<Item = NoteEvent>) {
        self.notes.clear();
        for note in notes {
            self.insert(note);
        }
    }

    /// Overdub captured notes: existing notes are never overwritten.
    ///
    /// Returns how many notes were added.
    pub fn merge_overdub(&mut self, captured: impl IntoIterator<Item = NoteEvent>) -> usize {
        let mut added = 0;
        for note in captured {
            let note = note.sanitized();
            if self.contains(note.step, &note.pitch) {
                continue;
            }
            self.notes.push(note);
            added += 1;
        }
        added
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    /// Notes at a given step
    pub fn notes_at(&self, step: u8) -> impl Iterator<Item = &NoteEvent> {
        self.notes.iter().filter(move |n| n.step == step)
    }

    fn position(&self, step: u8, pitch: &Pitch) -> Option<usize> {
        self.notes.iter().position(|n| n.step == step && &n.pitch == pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteDuration;

    fn note(name: &str, step: u8, velocity: f32) -> NoteEvent {
        NoteEvent::new(name.parse().unwrap(), velocity, step, NoteDuration::Sixteenth)
    }

    #[test]
    fn test_later_write_replaces() {
        let clip = Clip::from_notes([note("C4", 0, 0.5), note("C4", 0, 0.9), note("G4", 4, 0.8)]);
        assert_eq!(clip.len(), 2);
        let c4: Pitch = "C4".parse().unwrap();
        assert_eq!(clip.notes_at(0).next().map(|n| n.velocity), Some(0.9));
        assert!(clip.contains(0, &c4));
    }

    #[test]
    fn test_overdub_keeps_existing() {
        let mut clip = Clip::from_notes([note("C4", 0, 0.5)]);
        let added = clip.merge_overdub([note("C4", 0, 1.0), note("Eb4", 0, 1.0), note("Eb4", 0, 0.2)]);
        assert_eq!(added, 1);
        assert_eq!(clip.len(), 2);
        assert_eq!(clip.notes_at(0).find(|n| n.pitch.name() == "C4").map(|n| n.velocity), Some(0.5));
        assert_eq!(clip.notes_at(0).find(|n| n.pitch.name() == "Eb4").map(|n| n.velocity), Some(1.0));
    }

    #[test]
    fn test_empty_and_remove() {
        let mut clip = Clip::new();
        assert!(clip.is_empty());
        clip.insert(note("A3", 7, 1.0));
        let a3: Pitch = "A3".parse().unwrap();
        assert!(clip.remove(7, &a3).is_some());
        assert!(clip.is_empty());
    }

    #[test]
    fn test_out_of_range_step_clamped() {
        let mut clip = Clip::new();
        clip.insert(NoteEvent {
            pitch: "C4".parse().unwrap(),
            velocity: 2.0,
            step: 99,
            duration: NoteDuration::Sixteenth,
        });
        assert_eq!(clip.notes()[0].step, 15);
        assert_eq!(clip.notes()[0].velocity, 1.0);
    }
}
