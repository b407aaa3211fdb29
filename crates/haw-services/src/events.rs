//! Feedback from the audio thread to the UI
//!
//! Events travel over a bounded channel and are sent with `try_send`; a
//! full channel drops them. Callbacks only ever run on the thread that
//! pumps the channel.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use haw_core::{Pitch, TrackId};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Transport crossed into a new 16th step (0-15)
    Step(u8),
    /// Pitches currently sounding from clip playback
    ActiveNotes(Vec<Pitch>),
    TransportChanged { running: bool },
    TempoChanged(f64),
}

/// Non-blocking producer side of the feedback channel
pub struct EventSender {
    tx: Sender<EngineEvent>,
    dropped: AtomicU64,
}

impl EventSender {
    pub fn send(&self, event: EngineEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Events lost to a full or closed channel
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for EventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("queued", &self.tx.len())
            .field("dropped", &self.dropped())
            .finish()
    }
}

pub fn event_channel(capacity: usize) -> (EventSender, Receiver<EngineEvent>) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        EventSender {
            tx,
            dropped: AtomicU64::new(0),
        },
        rx,
    )
}

type StepCallback = Box<dyn FnMut(u8) + Send>;
type ActiveNotesCallback = Box<dyn FnMut(&[Pitch]) + Send>;

/// UI callbacks invoked while pumping events
#[derive(Default)]
pub struct EventCallbacks {
    step: Option<StepCallback>,
    active_notes: Option<ActiveNotesCallback>,
}

impl EventCallbacks {
    pub fn set_step(&mut self, callback: impl FnMut(u8) + Send + 'static) {
        self.step = Some(Box::new(callback));
    }

    pub fn set_active_notes(&mut self, callback: impl FnMut(&[Pitch]) + Send + 'static) {
        self.active_notes = Some(Box::new(callback));
    }

    pub fn dispatch(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::Step(step) => {
                if let Some(callback) = self.step.as_mut() {
                    callback(*step);
                }
            }
            EngineEvent::ActiveNotes(notes) => {
                if let Some(callback) = self.active_notes.as_mut() {
                    callback(notes);
                }
            }
            EngineEvent::TransportChanged { .. } | EngineEvent::TempoChanged(_) => {}
        }
    }
}

impl fmt::Debug for EventCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCallbacks")
            .field("step", &self.step.is_some())
            .field("active_notes", &self.active_notes.is_some())
            .finish()
    }
}

/// Clip notes currently sounding, per track
#[derive(Debug, Clone, Default)]
pub struct ActiveNotes {
    notes: BTreeSet<(TrackId, Pitch)>,
}

impl ActiveNotes {
    /// Returns true if the note was not already sounding
    pub fn add(&mut self, track: TrackId, pitch: &Pitch) -> bool {
        self.notes.insert((track, pitch.clone()))
    }

    /// Returns true if the note was sounding
    pub fn remove(&mut self, track: TrackId, pitch: &Pitch) -> bool {
        self.notes.remove(&(track, pitch.clone()))
    }

    /// Forget every note of `track`; true if any were sounding
    pub fn remove_track(&mut self, track: TrackId) -> bool {
        let before = self.notes.len();
        self.notes.retain(|(t, _)| *t != track);
        self.notes.len() != before
    }

    pub fn clear(&mut self) -> bool {
        let had_notes = !self.notes.is_empty();
        self.notes.clear();
        had_notes
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Distinct sounding pitches, lowest first
    pub fn snapshot(&self) -> Vec<Pitch> {
        let pitches: BTreeSet<&Pitch> = self.notes.iter().map(|(_, p)| p).collect();
        pitches.into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_full_channel_drops() {
        let (tx, rx) = event_channel(2);
        tx.send(EngineEvent::Step(0));
        tx.send(EngineEvent::Step(1));
        tx.send(EngineEvent::Step(2));
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![EngineEvent::Step(0), EngineEvent::Step(1)]);
    }

    #[test]
    fn test_callbacks_dispatch() {
        let steps = Arc::new(Mutex::new(Vec::new()));
        let notes = Arc::new(Mutex::new(Vec::new()));
        let mut callbacks = EventCallbacks::default();
        let sink = steps.clone();
        callbacks.set_step(move |step| sink.lock().unwrap().push(step));
        let sink = notes.clone();
        callbacks.set_active_notes(move |pitches| sink.lock().unwrap().push(pitches.len()));

        callbacks.dispatch(&EngineEvent::Step(3));
        callbacks.dispatch(&EngineEvent::ActiveNotes(vec![Pitch::from_midi(60)]));
        callbacks.dispatch(&EngineEvent::TempoChanged(100.0));
        assert_eq!(*steps.lock().unwrap(), vec![3]);
        assert_eq!(*notes.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_active_notes_per_track() {
        let mut active = ActiveNotes::default();
        let c4 = Pitch::from_midi(60);
        assert!(active.add(TrackId(1), &c4));
        assert!(!active.add(TrackId(1), &c4));
        active.add(TrackId(2), &c4);
        active.add(TrackId(2), &Pitch::from_midi(36));
        assert_eq!(active.snapshot(), vec![Pitch::from_midi(36), c4.clone()]);

        assert!(active.remove(TrackId(1), &c4));
        assert!(!active.remove(TrackId(1), &c4));
        assert!(active.remove_track(TrackId(2)));
        assert!(active.is_empty());
    }
}
