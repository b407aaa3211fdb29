//! Demo session loaded at startup

use std::sync::Arc;

use haw_core::{NoteDuration, NoteEvent, Pitch, Result, Track, TrackId, TrackKind};
use haw_services::VoiceBank;

use crate::tone::{ToneVoice, Waveform};

pub const LEAD: TrackId = TrackId(1);
pub const BASS: TrackId = TrackId(2);

fn note(pitch: &str, velocity: f32, step: u8, duration: NoteDuration) -> Result<NoteEvent> {
    Ok(NoteEvent::new(pitch.parse::<Pitch>()?, velocity, step, duration))
}

/// A lead and a bass track, each with its first slot playing
pub fn demo_tracks() -> Result<Vec<Track>> {
    let mut lead = Track::new(LEAD, TrackKind::Lead, "Glitch Poly");
    if let Some(clip) = lead.slot_mut(0) {
        clip.name = "Stabs".into();
        clip.replace_notes([
            note("C4", 1.0, 0, NoteDuration::Sixteenth)?,
            note("Eb4", 1.0, 0, NoteDuration::Sixteenth)?,
            note("G4", 1.0, 4, NoteDuration::Sixteenth)?,
        ]);
    }
    lead.set_playing_slot(Some(0));

    let mut bass = Track::new(BASS, TrackKind::Bass, "Sub Bass");
    if let Some(clip) = bass.slot_mut(0) {
        clip.name = "Root".into();
        clip.replace_notes([
            note("C2", 1.0, 0, NoteDuration::Eighth)?,
            note("C2", 0.8, 8, NoteDuration::Eighth)?,
        ]);
    }
    bass.set_playing_slot(Some(0));

    Ok(vec![lead, bass])
}

pub fn demo_voices(sample_rate: u32) -> VoiceBank {
    VoiceBank::new(
        Arc::new(ToneVoice::new("Glitch Poly", Waveform::Saw, sample_rate)),
        Arc::new(ToneVoice::new("Sub Bass", Waveform::Sine, sample_rate)),
        Arc::new(ToneVoice::new("Kit", Waveform::Square, sample_rate).percussive()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use haw_services::Voice;

    #[test]
    fn test_demo_tracks_are_armed() {
        let tracks = demo_tracks().unwrap();
        assert_eq!(tracks.len(), 2);

        let lead = &tracks[0];
        assert_eq!(lead.kind, TrackKind::Lead);
        let clip = lead.active_clip().unwrap();
        assert_eq!(clip.len(), 3);
        assert_eq!(clip.notes_at(0).count(), 2);

        let bass = &tracks[1];
        let clip = bass.active_clip().unwrap();
        assert_eq!(clip.notes_at(8).next().map(|n| n.velocity), Some(0.8));
    }

    #[test]
    fn test_demo_voices_are_distinct() {
        let bank = demo_voices(48000);
        assert_eq!(bank.distinct_kinds().count(), 3);
        assert_eq!(bank.get(TrackKind::Bass).name(), "Sub Bass");
    }
}
