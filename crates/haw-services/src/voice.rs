//! Sound-generation seam
//!
//! Synthesis lives outside this crate. The engine only tells a voice which
//! notes start and stop, and at which frame of the next block.

use std::fmt;
use std::sync::Arc;

use haw_core::{Pitch, TrackId, TrackKind};

/// Who a note belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceTarget {
    /// Notes scheduled from a track's clip
    Track(TrackId),
    /// Notes played live on the pads, kept apart from clip playback
    Live,
}

/// Polyphonic sound source for one instrument kind
pub trait Voice: Send + Sync {
    /// Instrument display name
    fn name(&self) -> &str;
    /// Queue a note-on at `offset` frames into the next rendered block
    fn note_on(&self, target: VoiceTarget, pitch: &Pitch, velocity: f32, offset: u32);
    /// Queue a note-off at `offset` frames into the next rendered block
    fn note_off(&self, target: VoiceTarget, pitch: &Pitch, offset: u32);
    /// Silence every note of `target` immediately
    fn all_notes_off(&self, target: VoiceTarget);
    /// Set an instrument parameter by name
    fn set_param(&self, name: &str, value: f32);
    /// Render the next block for `target`, overwriting `out`
    fn render(&self, target: VoiceTarget, out: &mut [f32]);
}

/// One voice per instrument kind
#[derive(Clone)]
pub struct VoiceBank {
    lead: Arc<dyn Voice>,
    bass: Arc<dyn Voice>,
    drum: Arc<dyn Voice>,
}

impl VoiceBank {
    pub fn new(lead: Arc<dyn Voice>, bass: Arc<dyn Voice>, drum: Arc<dyn Voice>) -> Self {
        Self { lead, bass, drum }
    }

    /// Same voice for every kind
    pub fn shared(voice: Arc<dyn Voice>) -> Self {
        Self {
            lead: voice.clone(),
            bass: voice.clone(),
            drum: voice,
        }
    }

    pub fn get(&self, kind: TrackKind) -> &Arc<dyn Voice> {
        match kind {
            TrackKind::Lead => &self.lead,
            TrackKind::Bass => &self.bass,
            TrackKind::Drum => &self.drum,
        }
    }

    /// Kinds backed by distinct voices; a voice shared by several kinds
    /// appears once
    pub fn distinct_kinds(&self) -> impl Iterator<Item = TrackKind> + '_ {
        TrackKind::ALL
            .into_iter()
            .enumerate()
            .filter(move |(i, kind)| {
                !TrackKind::ALL[..*i]
                    .iter()
                    .any(|earlier| Arc::ptr_eq(self.get(*earlier), self.get(*kind)))
            })
            .map(|(_, kind)| kind)
    }
}

impl fmt::Debug for VoiceBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceBank")
            .field("lead", &self.lead.name())
            .field("bass", &self.bass.name())
            .field("drum", &self.drum.name())
            .finish()
    }
}


#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum VoiceCall {
        On { target: VoiceTarget, midi: u8, velocity: f32, offset: u32 },
        Off { target: VoiceTarget, midi: u8, offset: u32 },
        AllOff(VoiceTarget),
        Param(String, f32),
    }

    /// Records every call and renders a constant level while any note of
    /// the target is held
    pub struct RecordingVoice {
        pub level: f32,
        calls: Mutex<Vec<VoiceCall>>,
        held: Mutex<HashMap<VoiceTarget, Vec<u8>>>,
    }

    impl RecordingVoice {
        pub fn new(level: f32) -> Arc<Self> {
            Arc::new(Self {
                level,
                calls: Mutex::new(Vec::new()),
                held: Mutex::new(HashMap::new()),
            })
        }

        pub fn calls(&self) -> Vec<VoiceCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        pub fn held(&self, target: VoiceTarget) -> Vec<u8> {
            self.held.lock().unwrap().get(&target).cloned().unwrap_or_default()
        }
    }

    impl Voice for RecordingVoice {
        fn name(&self) -> &str {
            "Recording"
        }

        fn note_on(&self, target: VoiceTarget, pitch: &Pitch, velocity: f32, offset: u32) {
            self.calls.lock().unwrap().push(VoiceCall::On { target, midi: pitch.midi(), velocity, offset });
            self.held.lock().unwrap().entry(target).or_default().push(pitch.midi());
        }

        fn note_off(&self, target: VoiceTarget, pitch: &Pitch, offset: u32) {
            self.calls.lock().unwrap().push(VoiceCall::Off { target, midi: pitch.midi(), offset });
            if let Some(notes) = self.held.lock().unwrap().get_mut(&target) {
                notes.retain(|m| *m != pitch.midi());
            }
        }

        fn all_notes_off(&self, target: VoiceTarget) {
            self.calls.lock().unwrap().push(VoiceCall::AllOff(target));
            self.held.lock().unwrap().remove(&target);
        }

        fn set_param(&self, name: &str, value: f32) {
            self.calls.lock().unwrap().push(VoiceCall::Param(name.to_string(), value));
        }

        fn render(&self, target: VoiceTarget, out: &mut [f32]) {
            let sounding = !self.held(target).is_empty();
            out.fill(if sounding { self.level } else { 0.0 });
        }
    }
}
