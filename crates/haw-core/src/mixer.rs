//! Master bus and macro parameter sets
//!
//! Every field is a normalized control in [0, 1] unless noted. The mapping
//! functions turn them into the physical values the DSP stages use.

use serde::{Deserialize, Serialize};

use crate::track::clamp_volume_db;

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

fn bipolar_db(value: f32, range_db: f32) -> f32 {
    (unit(value) * 2.0 - 1.0) * range_db
}

/// "Punch glue" compressor controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicsParams {
    pub low_gain: f32,
    pub mid_gain: f32,
    pub high_gain: f32,
    pub compressor_hi_pass: f32,
    pub release: f32,
    pub threshold: f32,
    pub output_gain: f32,
    pub dry_wet: f32,
}

impl Default for DynamicsParams {
    fn default() -> Self {
        Self {
            low_gain: 0.5,
            mid_gain: 0.5,
            high_gain: 0.5,
            compressor_hi_pass: 0.5,
            release: 0.5,
            threshold: 0.5,
            output_gain: 0.5,
            dry_wet: 0.0,
        }
    }
}

impl DynamicsParams {
    /// 0 -> -60 dB, 1 -> 0 dB
    pub fn threshold_db(&self) -> f32 {
        -60.0 + unit(self.threshold) * 60.0
    }

    /// 0 -> 1:1, 1 -> 21:1
    pub fn ratio(&self) -> f32 {
        1.0 + unit(self.high_gain) * 20.0
    }

    pub fn low_gain_db(&self) -> f32 {
        bipolar_db(self.low_gain, 12.0)
    }

    pub fn mid_gain_db(&self) -> f32 {
        bipolar_db(self.mid_gain, 12.0)
    }

    /// Detector high-pass, 20 Hz to 500 Hz
    pub fn hi_pass_hz(&self) -> f32 {
        20.0 * 25f32.powf(unit(self.compressor_hi_pass))
    }

    /// 10 ms to 1000 ms
    pub fn release_ms(&self) -> f32 {
        10.0 * 100f32.powf(unit(self.release))
    }

    pub fn output_gain_db(&self) -> f32 {
        bipolar_db(self.output_gain, 12.0)
    }

    pub fn wet(&self) -> f32 {
        unit(self.dry_wet)
    }
}

/// "Analog clip" saturation controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaturationParams {
    pub drive: f32,
    pub clip_amount: f32,
    pub color_low: f32,
    pub color_freq: f32,
    pub color_width: f32,
    pub color_hi: f32,
    pub output: f32,
    pub dry_wet: f32,
}

impl Default for SaturationParams {
    fn default() -> Self {
        Self {
            drive: 0.0,
            clip_amount: 0.0,
            color_low: 0.5,
            color_freq: 0.5,
            color_width: 0.5,
            color_hi: 0.5,
            output: 0.5,
            dry_wet: 0.0,
        }
    }
}

impl SaturationParams {
    /// Pre-gain into the waveshaper
    pub fn drive_gain(&self) -> f32 {
        1.0 + unit(self.drive) * 24.0
    }

    /// Hard clip ceiling, 1.0 down to 0.25
    pub fn clip_ceiling(&self) -> f32 {
        1.0 - unit(self.clip_amount) * 0.75
    }

    /// Color split frequency, 200 Hz to 8 kHz
    pub fn color_freq_hz(&self) -> f32 {
        200.0 * 40f32.powf(unit(self.color_freq))
    }

    pub fn color_q(&self) -> f32 {
        0.5 + unit(self.color_width) * 3.5
    }

    pub fn color_low_db(&self) -> f32 {
        bipolar_db(self.color_low, 12.0)
    }

    pub fn color_hi_db(&self) -> f32 {
        bipolar_db(self.color_hi, 12.0)
    }

    pub fn output_db(&self) -> f32 {
        bipolar_db(self.output, 12.0)
    }

    pub fn wet(&self) -> f32 {
        unit(self.dry_wet)
    }
}

/// Full master bus settings
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterBusState {
    /// Master volume in dB (-60 to +6)
    pub volume_db: f32,
    pub dynamics: DynamicsParams,
    pub saturation: SaturationParams,
}

impl MasterBusState {
    pub fn clamped_volume_db(&self) -> f32 {
        clamp_volume_db(self.volume_db)
    }
}

/// Performance macro knobs feeding the shared sends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroState {
    pub filter: f32,
    pub reso: f32,
    pub space: f32,
    pub heat: f32,
}

impl Default for MacroState {
    fn default() -> Self {
        Self {
            filter: 0.8,
            reso: 0.1,
            space: 0.2,
            heat: 0.0,
        }
    }
}

/// Filter cutoff: 100 Hz at 0, 10 kHz at 1 (exponential)
pub fn filter_cutoff_hz(value: f32) -> f32 {
    100.0 * 100f32.powf(unit(value))
}

/// Filter resonance as Q, linear up to 15
pub fn filter_q(value: f32) -> f32 {
    (unit(value) * 15.0).max(0.1)
}

/// Space send wet mix (linear)
pub fn space_wet(value: f32) -> f32 {
    unit(value)
}

/// Space decay time in seconds, 1 s to 11 s
pub fn space_decay_secs(value: f32) -> f32 {
    1.0 + unit(value) * 10.0
}

/// Heat drive amount
pub fn heat_drive(value: f32) -> f32 {
    unit(value)
}

/// Heat wet mix, half the drive
pub fn heat_wet(value: f32) -> f32 {
    unit(value) * 0.5
}
