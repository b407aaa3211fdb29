//! Per-track loop scheduling of one-bar clips

use haw_core::{Clip, Pitch, StepWindow, TrackId, STEPS_PER_BAR};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteAction {
    On { velocity: f32 },
    Off,
}

impl NoteAction {
    pub fn is_on(&self) -> bool {
        matches!(self, Self::On { .. })
    }
}

/// A note start or stop resolved to a frame of the current block
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNote {
    pub track: TrackId,
    pub pitch: Pitch,
    pub action: NoteAction,
    /// Absolute step position since transport start
    pub position: f64,
    /// Frame offset inside the block
    pub offset: u32,
}

#[derive(Debug, Clone)]
struct PendingOff {
    pitch: Pitch,
    position: f64,
}

/// Repeats a clip every bar, aligned to the transport's bar grid.
///
/// Note-offs are tracked per scheduler so replacing or dropping it
/// discards every pending release along with it.
#[derive(Debug, Clone)]
pub struct ClipScheduler {
    track: TrackId,
    clip: Clip,
    pending: Vec<PendingOff>,
}

impl ClipScheduler {
    pub fn new(track: TrackId, clip: Clip) -> Self {
        Self {
            track,
            clip,
            pending: Vec::new(),
        }
    }

    pub fn clip(&self) -> &Clip {
        &self.clip
    }

    /// Note-offs still waiting for their position
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Append every note boundary falling inside `window`
    pub fn collect(&mut self, window: &StepWindow, out: &mut Vec<ScheduledNote>) {
        if window.is_empty() {
            return;
        }

        let bar_len = f64::from(STEPS_PER_BAR);
        let first_bar = (window.start / bar_len).floor() as i64;
        let last_bar = (window.end / bar_len).floor() as i64;
        for bar in first_bar..=last_bar {
            let bar_start = bar as f64 * bar_len;
            for note in self.clip.notes() {
                let position = bar_start + f64::from(note.step);
                if !window.contains(position) {
                    continue;
                }
                out.push(ScheduledNote {
                    track: self.track,
                    pitch: note.pitch.clone(),
                    action: NoteAction::On { velocity: note.velocity },
                    position,
                    offset: window.frame_offset(position),
                });
                self.pending.push(PendingOff {
                    pitch: note.pitch.clone(),
                    position: position + f64::from(note.duration.steps()),
                });
            }
        }

        let track = self.track;
        self.pending.retain(|off| {
            if off.position >= window.end {
                return true;
            }
            out.push(ScheduledNote {
                track,
                pitch: off.pitch.clone(),
                action: NoteAction::Off,
                position: off.position,
                offset: window.frame_offset(off.position),
            });
            false
        });
    }
}

/// Order a block's events by frame, releases before starts on the same frame
pub fn sort_for_dispatch(events: &mut [ScheduledNote]) {
    events.sort_by(|a, b| {
        a.offset
            .cmp(&b.offset)
            .then(a.action.is_on().cmp(&b.action.is_on()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use haw_core::{NoteDuration, NoteEvent};

    fn clip(notes: &[(&str, u8, NoteDuration)]) -> Clip {
        Clip::from_notes(
            notes
                .iter()
                .map(|(name, step, duration)| NoteEvent::new(name.parse().unwrap(), 1.0, *step, *duration)),
        )
    }

    fn window(start: f64, end: f64) -> StepWindow {
        StepWindow { start, end, frames: ((end - start) * 100.0).round() as u32 }
    }

    #[test]
    fn test_notes_fire_at_their_step() {
        let mut scheduler = ClipScheduler::new(TrackId(1), clip(&[("C4", 0, NoteDuration::Sixteenth), ("G4", 4, NoteDuration::Sixteenth)]));
        let mut out = Vec::new();
        scheduler.collect(&window(0.0, 2.0), &mut out);
        assert_eq!(out.len(), 2);
        assert!(out[0].action.is_on());
        assert_eq!(out[0].offset, 0);
        assert_eq!(out[1].action, NoteAction::Off);
        assert_eq!(out[1].position, 1.0);
        assert_eq!(out[1].offset, 100);

        out.clear();
        scheduler.collect(&window(3.5, 4.5), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].position, 4.0);
        assert_eq!(out[0].offset, 50);
    }

    #[test]
    fn test_loops_every_bar() {
        let mut scheduler = ClipScheduler::new(TrackId(1), clip(&[("C2", 8, NoteDuration::Eighth)]));
        let mut ons = Vec::new();
        let mut start = 0.0;
        while start < 64.0 {
            let mut out = Vec::new();
            scheduler.collect(&window(start, start + 0.75), &mut out);
            ons.extend(out.into_iter().filter(|n| n.action.is_on()).map(|n| n.position));
            start += 0.75;
        }
        assert_eq!(ons, vec![8.0, 24.0, 40.0, 56.0]);
    }

    #[test]
    fn test_note_off_crosses_bar_line() {
        let mut scheduler = ClipScheduler::new(TrackId(1), clip(&[("C3", 12, NoteDuration::Half)]));
        let mut out = Vec::new();
        scheduler.collect(&window(11.0, 13.0), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(scheduler.pending_len(), 1);
        out.clear();
        scheduler.collect(&window(19.0, 21.0), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].action, NoteAction::Off);
        assert_eq!(out[0].position, 20.0);
    }

    #[test]
    fn test_release_precedes_retrigger() {
        let mut scheduler = ClipScheduler::new(TrackId(1), clip(&[("C4", 0, NoteDuration::Bar)]));
        let mut out = Vec::new();
        scheduler.collect(&window(0.0, 1.0), &mut out);
        out.clear();
        scheduler.collect(&window(15.5, 16.5), &mut out);
        sort_for_dispatch(&mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].action, NoteAction::Off);
        assert!(out[1].action.is_on());
        assert_eq!(out[0].offset, out[1].offset);
    }

    #[test]
    fn test_empty_window_schedules_nothing() {
        let mut scheduler = ClipScheduler::new(TrackId(1), clip(&[("C4", 0, NoteDuration::Sixteenth)]));
        let mut out = Vec::new();
        scheduler.collect(&StepWindow { start: 0.0, end: 0.0, frames: 0 }, &mut out);
        assert!(out.is_empty());
    }
}
