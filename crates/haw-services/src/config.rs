//! Engine configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

use haw_core::{CAPTURE_RETENTION_SECS, DEFAULT_BPM};

use crate::parameters::ms_to_frames;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Sample rate must be positive")]
    ZeroSampleRate,
    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: f32 },
    #[error("{0} must be at least 1")]
    ZeroCapacity(&'static str),
}

/// Tunables for the transport and audio renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub default_bpm: f64,
    /// Channel strip volume/mute/solo smoothing
    pub volume_ramp_ms: f32,
    /// Macro and master FX smoothing
    pub macro_ramp_ms: f32,
    pub capture_retention_secs: f64,
    /// Bound on queued feedback events before new ones are dropped
    pub event_capacity: usize,
    /// Meter fall rate
    pub meter_release_db_per_sec: f32,
    pub limiter_ceiling_db: f32,
    /// Longest block rendered in one pass; larger buffers are split
    pub max_block_frames: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            default_bpm: DEFAULT_BPM,
            volume_ramp_ms: 20.0,
            macro_ramp_ms: 100.0,
            capture_retention_secs: CAPTURE_RETENTION_SECS,
            event_capacity: 256,
            meter_release_db_per_sec: 30.0,
            limiter_ceiling_db: -1.0,
            max_block_frames: 4096,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        for (name, value) in [
            ("volume_ramp_ms", self.volume_ramp_ms),
            ("macro_ramp_ms", self.macro_ramp_ms),
            ("meter_release_db_per_sec", self.meter_release_db_per_sec),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }
        if self.capture_retention_secs.is_nan() || self.capture_retention_secs < 0.0 {
            return Err(ConfigError::Negative {
                name: "capture_retention_secs",
                value: self.capture_retention_secs as f32,
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("event_capacity"));
        }
        if self.max_block_frames == 0 {
            return Err(ConfigError::ZeroCapacity("max_block_frames"));
        }
        Ok(())
    }

    pub fn volume_ramp_frames(&self) -> u32 {
        ms_to_frames(self.volume_ramp_ms, self.sample_rate)
    }

    pub fn macro_ramp_frames(&self) -> u32 {
        ms_to_frames(self.macro_ramp_ms, self.sample_rate)
    }

    /// Meter fall in dB for one frame
    pub fn meter_release_per_frame(&self) -> f32 {
        self.meter_release_db_per_sec / self.sample_rate.max(1) as f32
    }
}
