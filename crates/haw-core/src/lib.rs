//! haw-core: Domain types for the haw performance workstation

pub mod capture;
mod clip;
mod error;
pub mod mixer;
pub mod note;
pub mod tempo;
mod track;
pub mod transport;

pub use capture::{CaptureBuffer, CaptureEntry, CAPTURE_RETENTION_SECS};
pub use clip::Clip;
pub use error::{HawError, Result};
pub use mixer::{DynamicsParams, MacroState, MasterBusState, SaturationParams};
pub use note::{NoteDuration, NoteEvent, Pitch, STEPS_PER_BAR};
pub use tempo::{quantize_last_bar, quantize_wrapped, TempoEstimate, TempoEstimator};
pub use track::{
    clamp_volume_db, ChannelStripState, Track, TrackId, TrackKind, CLIP_SLOTS, MAX_VOLUME_DB,
    MIN_VOLUME_DB,
};
pub use transport::{ClockSource, StepWindow, TransportState, DEFAULT_BPM};
