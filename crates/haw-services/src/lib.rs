//! haw-services: Transport engine, voice routing, mixing and effects

pub mod audio_effects;
pub mod channel_strip;
pub mod clock;
pub mod config;
pub mod engine;
pub mod events;
pub mod parameters;
pub mod renderer;
pub mod scheduler;
pub mod voice;
pub mod voice_router;

pub use audio_effects::{AudioEffect, EffectChain, EffectParam};
pub use channel_strip::{ChannelStrip, PeakMeter, StripProcessor, METER_FLOOR_DB};
pub use clock::{ManualClock, SessionClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use engine::{CaptureResult, EngineState, TransportEngine};
pub use events::{EngineEvent, EventCallbacks};
pub use renderer::AudioRenderer;
pub use scheduler::{ClipScheduler, NoteAction, ScheduledNote};
pub use voice::{Voice, VoiceBank, VoiceTarget};
pub use voice_router::VoiceRouter;
