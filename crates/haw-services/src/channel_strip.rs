//! Per-track gain staging and metering

use std::sync::atomic::{AtomicBool, Ordering};

use fundsp::hacker::{amp_db, db_amp};
use haw_core::{clamp_volume_db, ChannelStripState};

use crate::parameters::{AtomicF32, LinearRamp};

/// Lowest level a meter reports
pub const METER_FLOOR_DB: f32 = -100.0;

/// Strip controls and meter shared between control and audio threads
#[derive(Debug)]
pub struct ChannelStrip {
    volume_db: AtomicF32,
    muted: AtomicBool,
    soloed: AtomicBool,
    meter_db: AtomicF32,
}

impl ChannelStrip {
    pub fn new(state: ChannelStripState) -> Self {
        Self {
            volume_db: AtomicF32::new(clamp_volume_db(state.volume_db)),
            muted: AtomicBool::new(state.muted),
            soloed: AtomicBool::new(state.soloed),
            meter_db: AtomicF32::new(METER_FLOOR_DB),
        }
    }

    pub fn set_volume_db(&self, db: f32) {
        self.volume_db.set(clamp_volume_db(db));
    }

    pub fn volume_db(&self) -> f32 {
        self.volume_db.get()
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_soloed(&self, soloed: bool) {
        self.soloed.store(soloed, Ordering::Relaxed);
    }

    pub fn is_soloed(&self) -> bool {
        self.soloed.load(Ordering::Relaxed)
    }

    pub fn apply(&self, state: &ChannelStripState) {
        self.set_volume_db(state.volume_db);
        self.set_muted(state.muted);
        self.set_soloed(state.soloed);
    }

    pub fn state(&self) -> ChannelStripState {
        ChannelStripState {
            volume_db: self.volume_db(),
            muted: self.is_muted(),
            soloed: self.is_soloed(),
        }
    }

    /// Post-fader level in dB, never below the meter floor
    pub fn meter_db(&self) -> f32 {
        self.meter_db.get()
    }

    fn store_meter(&self, db: f32) {
        self.meter_db.set(db);
    }
}

impl Default for ChannelStrip {
    fn default() -> Self {
        Self::new(ChannelStripState::default())
    }
}

/// Peak meter with a constant dB/frame fall
#[derive(Debug, Clone)]
pub struct PeakMeter {
    level_db: f32,
    release_per_frame: f32,
}

impl PeakMeter {
    pub fn new(release_per_frame: f32) -> Self {
        Self {
            level_db: METER_FLOOR_DB,
            release_per_frame,
        }
    }

    pub fn process(&mut self, samples: &[f32]) -> f32 {
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let block_db = amp_db(peak).max(METER_FLOOR_DB);
        let fallen = self.level_db - self.release_per_frame * samples.len() as f32;
        self.level_db = block_db.max(fallen).max(METER_FLOOR_DB);
        self.level_db
    }
}

/// Audio-thread half of a strip: ramps gain towards the shared controls
#[derive(Debug, Clone)]
pub struct StripProcessor {
    gain: LinearRamp,
    meter: PeakMeter,
    primed: bool,
}

impl StripProcessor {
    pub fn new(ramp_frames: u32, meter_release_per_frame: f32) -> Self {
        Self {
            gain: LinearRamp::new(0.0, ramp_frames),
            meter: PeakMeter::new(meter_release_per_frame),
            primed: false,
        }
    }

    pub fn gain(&self) -> &LinearRamp {
        &self.gain
    }

    /// Linear gain the strip is heading towards
    pub fn target_gain(strip: &ChannelStrip, any_soloed: bool) -> f32 {
        if strip.state().is_audible(any_soloed) {
            db_amp(strip.volume_db())
        } else {
            0.0
        }
    }

    /// Apply the ramped fader gain without metering
    pub fn apply_gain(&mut self, strip: &ChannelStrip, any_soloed: bool, samples: &mut [f32]) {
        let target = Self::target_gain(strip, any_soloed);
        if self.primed {
            self.gain.set_target(target);
        } else {
            // First block takes the current state as-is
            self.gain.reset(target);
            self.primed = true;
        }
        for sample in samples.iter_mut() {
            *sample *= self.gain.next_value();
        }
    }

    /// Meter `samples` and publish the level on `strip`
    pub fn meter(&mut self, strip: &ChannelStrip, samples: &[f32]) {
        strip.store_meter(self.meter.process(samples));
    }

    pub fn process(&mut self, strip: &ChannelStrip, any_soloed: bool, samples: &mut [f32]) {
        self.apply_gain(strip, any_soloed, samples);
        self.meter(strip, samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_clamped_on_set() {
        let strip = ChannelStrip::default();
        strip.set_volume_db(42.0);
        assert_eq!(strip.volume_db(), 6.0);
        strip.set_volume_db(-200.0);
        assert_eq!(strip.volume_db(), -60.0);
    }

    #[test]
    fn test_volume_change_ramps() {
        let strip = ChannelStrip::default();
        let mut processor = StripProcessor::new(960, 0.0);
        let mut block = vec![1.0f32; 64];
        processor.process(&strip, false, &mut block);
        assert!(block.iter().all(|s| *s == 1.0));

        strip.set_volume_db(-60.0);
        let mut block = vec![1.0f32; 480];
        processor.process(&strip, false, &mut block);
        assert!(block[0] > 0.99);
        assert!(block[479] > 0.4 && block[479] < 0.6);
        assert!(processor.gain().is_ramping());

        let mut block = vec![1.0f32; 480];
        processor.process(&strip, false, &mut block);
        assert!((block[479] - 0.001).abs() < 1e-4);
        assert!(!processor.gain().is_ramping());
    }

    #[test]
    fn test_mute_ramps_to_silence() {
        let strip = ChannelStrip::default();
        let mut processor = StripProcessor::new(960, 0.0);
        let mut block = vec![1.0f32; 16];
        processor.process(&strip, false, &mut block);

        strip.set_muted(true);
        let mut block = vec![1.0f32; 960];
        processor.process(&strip, false, &mut block);
        assert!(block[0] > 0.99);
        assert_eq!(block[959], 0.0);
    }

    #[test]
    fn test_solo_silences_others() {
        let soloed = ChannelStrip::new(ChannelStripState { soloed: true, ..Default::default() });
        let other = ChannelStrip::default();
        assert_eq!(StripProcessor::target_gain(&soloed, true), 1.0);
        assert_eq!(StripProcessor::target_gain(&other, true), 0.0);
        assert_eq!(StripProcessor::target_gain(&other, false), 1.0);
    }

    #[test]
    fn test_meter_floor_and_release() {
        let mut meter = PeakMeter::new(0.001);
        assert_eq!(meter.process(&[0.0; 128]), METER_FLOOR_DB);
        let level = meter.process(&[0.5; 16]);
        assert!((level - (-6.0206)).abs() < 0.01);
        let fallen = meter.process(&[0.0; 1000]);
        assert!((fallen - (level - 1.0)).abs() < 1e-3);
    }

    #[test]
    fn test_meter_published_on_strip() {
        let strip = ChannelStrip::default();
        let mut processor = StripProcessor::new(0, 30.0 / 48000.0);
        let mut block = vec![0.25f32; 256];
        processor.process(&strip, false, &mut block);
        assert!((strip.meter_db() - (-12.04)).abs() < 0.01);
    }
}
