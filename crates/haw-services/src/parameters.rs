//! Lock-free parameters and click-free ramps

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// f32 shared between control and audio threads without locks
#[derive(Debug)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// f64 shared between threads without locks
#[derive(Debug)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Frames covered by `ms` at `sample_rate`
pub fn ms_to_frames(ms: f32, sample_rate: u32) -> u32 {
    (ms.max(0.0) * 0.001 * sample_rate as f32).round() as u32
}

/// Linear ramp towards a target over a fixed number of frames.
///
/// Every target change goes through the ramp; a zero-length ramp is the
/// only way to jump.
#[derive(Debug, Clone)]
pub struct LinearRamp {
    current: f32,
    target: f32,
    increment: f32,
    remaining: u32,
    ramp_frames: u32,
}

impl LinearRamp {
    pub fn new(value: f32, ramp_frames: u32) -> Self {
        Self {
            current: value,
            target: value,
            increment: 0.0,
            remaining: 0,
            ramp_frames,
        }
    }

    pub fn ramp_frames(&self) -> u32 {
        self.ramp_frames
    }

    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }

    /// Start ramping to `target` from wherever the ramp currently is
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if self.ramp_frames == 0 {
            self.current = target;
            self.remaining = 0;
            return;
        }
        self.increment = (target - self.current) / self.ramp_frames as f32;
        self.remaining = self.ramp_frames;
    }

    /// Jump without ramping (initialization only)
    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.remaining = 0;
    }

    /// Per-sample step
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.increment
            };
        }
        self.current
    }

    /// Advance a whole block at once (control-rate parameters)
    pub fn advance(&mut self, frames: u32) -> f32 {
        if self.remaining == 0 {
            return self.current;
        }
        if frames >= self.remaining {
            self.remaining = 0;
            self.current = self.target;
        } else {
            self.remaining -= frames;
            self.current += self.increment * frames as f32;
        }
        self.current
    }
}
