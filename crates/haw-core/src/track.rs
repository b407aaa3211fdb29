//! Track representation

use serde::{Deserialize, Serialize};

use crate::clip::Clip;

/// Clip slots per track in the session grid
pub const CLIP_SLOTS: usize = 4;

/// Channel volume floor in dB
pub const MIN_VOLUME_DB: f32 = -60.0;
/// Channel volume ceiling in dB
pub const MAX_VOLUME_DB: f32 = 6.0;

/// Unique identifier for tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u64);

/// Which voice a track plays through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Lead,
    Bass,
    Drum,
}

impl TrackKind {
    pub const ALL: [TrackKind; 3] = [TrackKind::Lead, TrackKind::Bass, TrackKind::Drum];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Lead => "Lead",
            Self::Bass => "Bass",
            Self::Drum => "Drum",
        }
    }
}

/// Clamp a channel volume into the fader range
pub fn clamp_volume_db(db: f32) -> f32 {
    if db.is_nan() {
        return 0.0;
    }
    db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB)
}

/// Mixer settings of one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStripState {
    /// Volume in dB (-60 to +6)
    pub volume_db: f32,
    pub muted: bool,
    pub soloed: bool,
}

impl Default for ChannelStripState {
    fn default() -> Self {
        Self {
            volume_db: 0.0,
            muted: false,
            soloed: false,
        }
    }
}

impl ChannelStripState {
    /// Whether this channel is heard given the session-wide solo state.
    ///
    /// Solo wins over mute only in the sense that a soloed track still needs
    /// to be unmuted to sound; any solo silences every non-soloed track.
    pub fn is_audible(&self, any_soloed: bool) -> bool {
        !self.muted && (!any_soloed || self.soloed)
    }

    /// Fader position (0.0 to 1.0) for the current volume
    pub fn fader_position(&self) -> f32 {
        let range = MAX_VOLUME_DB - MIN_VOLUME_DB;
        ((clamp_volume_db(self.volume_db) - MIN_VOLUME_DB) / range).clamp(0.0, 1.0)
    }

    /// Volume in dB for a fader position (0.0 to 1.0)
    pub fn volume_for_fader(position: f32) -> f32 {
        let range = MAX_VOLUME_DB - MIN_VOLUME_DB;
        clamp_volume_db(position.clamp(0.0, 1.0) * range + MIN_VOLUME_DB)
    }
}

/// A track in the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub kind: TrackKind,
    pub name: String,
    /// Clip slots (session grid row)
    pub slots: Vec<Clip>,
    /// Slot currently playing, if any
    pub playing_slot: Option<usize>,
    #[serde(default)]
    pub strip: ChannelStripState,
}

impl Track {
    pub fn new(id: TrackId, kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            slots: vec![Clip::default(); CLIP_SLOTS],
            playing_slot: None,
            strip: ChannelStripState::default(),
        }
    }

    pub fn slot(&self, index: usize) -> Option<&Clip> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Clip> {
        self.slots.get_mut(index)
    }

    /// The clip that should be sounding, if any
    pub fn active_clip(&self) -> Option<&Clip> {
        self.slots.get(self.playing_slot?)
    }

    /// Mark a slot as playing (`None` stops the track).
    ///
    /// Out-of-range slots are ignored. Returns true if the selection changed.
    pub fn set_playing_slot(&mut self, slot: Option<usize>) -> bool {
        if let Some(idx) = slot {
            if idx >= self.slots.len() {
                return false;
            }
        }
        let changed = self.playing_slot != slot;
        self.playing_slot = slot;
        changed
    }

    /// Empty a slot, deactivating it if it was playing
    pub fn clear_slot(&mut self, index: usize) {
        let Some(clip) = self.slots.get_mut(index) else {
            return;
        };
        *clip = Clip::default();
        if self.playing_slot == Some(index) {
            self.playing_slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{NoteDuration, NoteEvent, Pitch};

    #[test]
    fn test_audibility_rule() {
        let plain = ChannelStripState::default();
        let muted = ChannelStripState { muted: true, ..Default::default() };
        let soloed = ChannelStripState { soloed: true, ..Default::default() };
        let soloed_muted = ChannelStripState { soloed: true, muted: true, ..Default::default() };

        assert!(plain.is_audible(false));
        assert!(!plain.is_audible(true));
        assert!(!muted.is_audible(false));
        assert!(soloed.is_audible(true));
        assert!(!soloed_muted.is_audible(true));
    }

    #[test]
    fn test_fader_mapping() {
        let strip = ChannelStripState { volume_db: -60.0, ..Default::default() };
        assert_eq!(strip.fader_position(), 0.0);
        let strip = ChannelStripState { volume_db: 6.0, ..Default::default() };
        assert_eq!(strip.fader_position(), 1.0);
        assert_eq!(ChannelStripState::volume_for_fader(0.0), -60.0);
        assert_eq!(ChannelStripState::volume_for_fader(1.0), 6.0);
        assert_eq!(clamp_volume_db(40.0), 6.0);
    }

    #[test]
    fn test_slots() {
        let mut track = Track::new(TrackId(1), TrackKind::Lead, "Glitch Poly");
        assert_eq!(track.slots.len(), CLIP_SLOTS);
        assert!(track.active_clip().is_none());

        track.slot_mut(1).unwrap().insert(NoteEvent::new(
            Pitch::from_midi(60),
            0.8,
            0,
            NoteDuration::Sixteenth,
        ));
        assert!(track.set_playing_slot(Some(1)));
        assert_eq!(track.active_clip().map(|c| c.len()), Some(1));
        assert!(!track.set_playing_slot(Some(9)));

        track.clear_slot(1);
        assert!(track.playing_slot.is_none());
        assert!(track.slot(1).unwrap().is_empty());
    }
}
