//! Routes note events to the voice of a track's instrument kind

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use haw_core::{Pitch, TrackId, TrackKind};
use tracing::{debug, warn};

use crate::voice::{VoiceBank, VoiceTarget};

/// Maps tracks to instrument kinds and keeps the set of held notes per
/// target so every note it starts can be released later.
///
/// Locks guard only the bookkeeping; no lock is held while a voice is
/// called.
pub struct VoiceRouter {
    bank: VoiceBank,
    routes: RwLock<HashMap<TrackId, TrackKind>>,
    held: Mutex<HashMap<(VoiceTarget, TrackKind), Vec<Pitch>>>,
}

impl VoiceRouter {
    pub fn new(bank: VoiceBank) -> Self {
        Self {
            bank,
            routes: RwLock::new(HashMap::new()),
            held: Mutex::new(HashMap::new()),
        }
    }

    pub fn bank(&self) -> &VoiceBank {
        &self.bank
    }

    /// Route `track` to `kind`. A track switching kind has its notes
    /// released on the old voice first.
    ///
    /// Returns true when an existing route changed kind.
    pub fn register(&self, track: TrackId, kind: TrackKind) -> bool {
        let previous = match self.routes.write() {
            Ok(mut routes) => routes.insert(track, kind),
            Err(_) => return false,
        };
        let Some(old) = previous.filter(|old| *old != kind) else {
            return false;
        };
        debug!(track = track.0, from = old.name(), to = kind.name(), "Track instrument changed");
        self.release_held(VoiceTarget::Track(track), old);
        true
    }

    /// Forget `track`, releasing anything it still holds
    pub fn unregister(&self, track: TrackId) {
        self.release_track(track);
        if let Ok(mut routes) = self.routes.write() {
            routes.remove(&track);
        }
    }

    pub fn kind_of(&self, track: TrackId) -> Option<TrackKind> {
        self.routes.read().ok()?.get(&track).copied()
    }

    /// Start a clip note. Returns false when the track has no route.
    pub fn note_on(&self, track: TrackId, pitch: &Pitch, velocity: f32, offset: u32) -> bool {
        let Some(kind) = self.kind_of(track) else {
            warn!(track = track.0, "No instrument routed for track");
            return false;
        };
        self.start(VoiceTarget::Track(track), kind, pitch, velocity, offset);
        true
    }

    /// Stop a clip note. Returns false when the note was not held.
    pub fn note_off(&self, track: TrackId, pitch: &Pitch, offset: u32) -> bool {
        let Some(kind) = self.kind_of(track) else {
            return false;
        };
        self.finish(VoiceTarget::Track(track), kind, pitch, offset)
    }

    /// Start a live pad note on the voice of `kind`
    pub fn live_on(&self, kind: TrackKind, pitch: &Pitch, velocity: f32) {
        self.start(VoiceTarget::Live, kind, pitch, velocity, 0);
    }

    /// Stop a live pad note. Returns false when it was not held.
    pub fn live_off(&self, kind: TrackKind, pitch: &Pitch) -> bool {
        self.finish(VoiceTarget::Live, kind, pitch, 0)
    }

    /// Release every note `track` holds and return the released pitches
    pub fn release_track(&self, track: TrackId) -> Vec<Pitch> {
        let target = VoiceTarget::Track(track);
        let kinds: Vec<TrackKind> = match self.held.lock() {
            Ok(held) => held.keys().filter(|(t, _)| *t == target).map(|(_, k)| *k).collect(),
            Err(_) => return Vec::new(),
        };
        let mut released = Vec::new();
        for kind in kinds {
            released.extend(self.release_held(target, kind));
        }
        if let Some(kind) = self.kind_of(track) {
            self.bank.get(kind).all_notes_off(target);
        }
        released
    }

    /// Release the clip notes of every routed track
    pub fn release_all_tracks(&self) -> Vec<Pitch> {
        let tracks: Vec<TrackId> = match self.routes.read() {
            Ok(routes) => routes.keys().copied().collect(),
            Err(_) => return Vec::new(),
        };
        tracks.into_iter().flat_map(|t| self.release_track(t)).collect()
    }

    /// Pitches currently held for `track`
    pub fn held_notes(&self, track: TrackId) -> Vec<Pitch> {
        let target = VoiceTarget::Track(track);
        let Ok(held) = self.held.lock() else {
            return Vec::new();
        };
        held.iter()
            .filter(|((t, _), _)| *t == target)
            .flat_map(|(_, pitches)| pitches.iter().cloned())
            .collect()
    }

    pub fn set_instrument_param(&self, kind: TrackKind, name: &str, value: f32) {
        debug!(kind = kind.name(), name, value, "Instrument param");
        self.bank.get(kind).set_param(name, value);
    }

    /// Render `target` through the voice of `kind`
    pub fn render(&self, target: VoiceTarget, kind: TrackKind, out: &mut [f32]) {
        self.bank.get(kind).render(target, out);
    }

    fn start(&self, target: VoiceTarget, kind: TrackKind, pitch: &Pitch, velocity: f32, offset: u32) {
        if let Ok(mut held) = self.held.lock() {
            let notes = held.entry((target, kind)).or_default();
            if !notes.contains(pitch) {
                notes.push(pitch.clone());
            }
        }
        self.bank.get(kind).note_on(target, pitch, velocity, offset);
    }

    fn finish(&self, target: VoiceTarget, kind: TrackKind, pitch: &Pitch, offset: u32) -> bool {
        let was_held = match self.held.lock() {
            Ok(mut held) => match held.get_mut(&(target, kind)) {
                Some(notes) => {
                    let before = notes.len();
                    notes.retain(|p| p != pitch);
                    notes.len() != before
                }
                None => false,
            },
            Err(_) => false,
        };
        if was_held {
            self.bank.get(kind).note_off(target, pitch, offset);
        }
        was_held
    }

    fn release_held(&self, target: VoiceTarget, kind: TrackKind) -> Vec<Pitch> {
        let pitches = match self.held.lock() {
            Ok(mut held) => held.remove(&(target, kind)).unwrap_or_default(),
            Err(_) => return Vec::new(),
        };
        let voice = self.bank.get(kind);
        for pitch in &pitches {
            voice.note_off(target, pitch, 0);
        }
        pitches
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::voice::testing::{RecordingVoice, VoiceCall};

    fn pitch(name: &str) -> Pitch {
        name.parse().unwrap()
    }

    fn router() -> (VoiceRouter, Arc<RecordingVoice>, Arc<RecordingVoice>) {
        let lead = RecordingVoice::new(0.5);
        let bass = RecordingVoice::new(0.5);
        let drum = RecordingVoice::new(0.5);
        (VoiceRouter::new(VoiceBank::new(lead.clone(), bass.clone(), drum)), lead, bass)
    }

    #[test]
    fn test_routes_by_kind() {
        let (router, lead, bass) = router();
        router.register(TrackId(1), TrackKind::Lead);
        router.register(TrackId(2), TrackKind::Bass);
        assert!(router.note_on(TrackId(1), &pitch("C4"), 1.0, 0));
        assert!(router.note_on(TrackId(2), &pitch("C2"), 0.8, 12));
        assert_eq!(lead.held(VoiceTarget::Track(TrackId(1))), vec![60]);
        assert_eq!(bass.held(VoiceTarget::Track(TrackId(2))), vec![36]);
        assert!(!router.note_on(TrackId(9), &pitch("C4"), 1.0, 0));
    }

    #[test]
    fn test_release_track_leaves_others_sounding() {
        let (router, lead, _) = router();
        router.register(TrackId(1), TrackKind::Lead);
        router.register(TrackId(3), TrackKind::Lead);
        router.note_on(TrackId(1), &pitch("C4"), 1.0, 0);
        router.note_on(TrackId(1), &pitch("Eb4"), 1.0, 0);
        router.note_on(TrackId(3), &pitch("G4"), 1.0, 0);
        router.live_on(TrackKind::Lead, &pitch("A4"), 1.0);

        let released = router.release_track(TrackId(1));
        assert_eq!(released.len(), 2);
        assert!(router.held_notes(TrackId(1)).is_empty());
        assert_eq!(router.held_notes(TrackId(3)), vec![pitch("G4")]);
        assert_eq!(lead.held(VoiceTarget::Live), vec![69]);
        assert!(lead.calls().contains(&VoiceCall::AllOff(VoiceTarget::Track(TrackId(1)))));
    }

    #[test]
    fn test_note_off_only_for_held() {
        let (router, lead, _) = router();
        router.register(TrackId(1), TrackKind::Lead);
        assert!(!router.note_off(TrackId(1), &pitch("C4"), 0));
        router.note_on(TrackId(1), &pitch("C4"), 1.0, 0);
        assert!(router.note_off(TrackId(1), &pitch("C4"), 5));
        assert_eq!(
            lead.calls().last(),
            Some(&VoiceCall::Off { target: VoiceTarget::Track(TrackId(1)), midi: 60, offset: 5 })
        );
    }

    #[test]
    fn test_kind_change_releases_old_voice() {
        let (router, lead, bass) = router();
        assert!(!router.register(TrackId(1), TrackKind::Lead));
        router.note_on(TrackId(1), &pitch("C4"), 1.0, 0);
        assert!(!router.register(TrackId(1), TrackKind::Lead));
        assert!(router.register(TrackId(1), TrackKind::Bass));
        assert!(lead.held(VoiceTarget::Track(TrackId(1))).is_empty());
        router.note_on(TrackId(1), &pitch("C2"), 1.0, 0);
        assert_eq!(bass.held(VoiceTarget::Track(TrackId(1))), vec![36]);
    }

    #[test]
    fn test_instrument_params_reach_voice() {
        let (router, _, bass) = router();
        router.set_instrument_param(TrackKind::Bass, "cutoff", 0.3);
        assert_eq!(bass.calls(), vec![VoiceCall::Param("cutoff".into(), 0.3)]);
    }
}
