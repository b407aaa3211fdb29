//! Transport state and the musical clock

use serde::{Deserialize, Serialize};

use crate::note::STEPS_PER_BAR;

pub const DEFAULT_BPM: f64 = 120.0;
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;

/// Clamp a tempo into the supported range
pub fn clamp_bpm(bpm: f64) -> f64 {
    if !bpm.is_finite() {
        return DEFAULT_BPM;
    }
    bpm.clamp(MIN_BPM, MAX_BPM)
}

/// Seconds per 16th step at `bpm`
pub fn step_duration_secs(bpm: f64) -> f64 {
    60.0 / bpm / 4.0
}

/// Seconds per 4/4 bar at `bpm`
pub fn bar_duration_secs(bpm: f64) -> f64 {
    240.0 / bpm
}

/// Transport playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Stopped,
    Running,
}

/// Span of musical time covered by one render block, in absolute steps
/// since the transport started
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepWindow {
    pub start: f64,
    pub end: f64,
    pub frames: u32,
}

impl StepWindow {
    pub fn is_empty(&self) -> bool {
        self.frames == 0 || self.end <= self.start
    }

    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position < self.end
    }

    /// Frame offset inside the block for a step position
    pub fn frame_offset(&self, position: f64) -> u32 {
        if self.is_empty() || position <= self.start {
            return 0;
        }
        // First frame at or after `position`
        let exact = (position - self.start) / (self.end - self.start) * self.frames as f64;
        let nearest = exact.round();
        let offset = if (exact - nearest).abs() < 1e-6 { nearest } else { exact.ceil() };
        (offset as u32).min(self.frames.saturating_sub(1))
    }

    /// Integer step boundaries falling inside this window
    pub fn step_boundaries(&self) -> impl Iterator<Item = u64> {
        let first = self.start.max(0.0).ceil() as u64;
        let end = self.end;
        (first..).take_while(move |s| (*s as f64) < end)
    }
}

/// Monotonic musical clock driven by tempo.
///
/// Position is derived from frames elapsed since the last tempo anchor, so
/// a restart always resynchronizes at step 0.
#[derive(Debug, Clone)]
pub struct ClockSource {
    state: TransportState,
    sample_rate: u32,
    bpm: f64,
    /// Step position when the current tempo took effect
    anchor_steps: f64,
    frames_since_anchor: u64,
}

impl ClockSource {
    pub fn new(sample_rate: u32, bpm: f64) -> Self {
        Self {
            state: TransportState::Stopped,
            sample_rate: sample_rate.max(1),
            bpm: clamp_bpm(bpm),
            anchor_steps: 0.0,
            frames_since_anchor: 0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TransportState::Running
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Start from step 0. Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.state = TransportState::Running;
        self.anchor_steps = 0.0;
        self.frames_since_anchor = 0;
        true
    }

    /// Halt advancement. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = TransportState::Stopped;
        true
    }

    /// Toggle and return the resulting running state
    pub fn toggle(&mut self) -> bool {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
        self.is_running()
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Change tempo, keeping the current musical position. Returns the
    /// applied (clamped) tempo.
    pub fn set_bpm(&mut self, bpm: f64) -> f64 {
        self.anchor_steps = self.position_steps();
        self.frames_since_anchor = 0;
        self.bpm = clamp_bpm(bpm);
        self.bpm
    }

    pub fn steps_per_frame(&self) -> f64 {
        self.bpm / 60.0 * 4.0 / self.sample_rate as f64
    }

    pub fn step_duration_secs(&self) -> f64 {
        step_duration_secs(self.bpm)
    }

    pub fn bar_duration_secs(&self) -> f64 {
        bar_duration_secs(self.bpm)
    }

    /// Absolute position in steps since start
    pub fn position_steps(&self) -> f64 {
        let sixteenths = self.frames_since_anchor as f64 * self.bpm * 4.0;
        self.anchor_steps + sixteenths / (60.0 * self.sample_rate as f64)
    }

    /// Current 16th step inside the bar (floor of the position)
    pub fn current_step(&self) -> u8 {
        (self.position_steps().floor() as u64 % u64::from(STEPS_PER_BAR)) as u8
    }

    /// Advance by one render block and return the window it covered.
    ///
    /// A stopped clock does not move and yields an empty window.
    pub fn advance(&mut self, frames: u32) -> StepWindow {
        let start = self.position_steps();
        if !self.is_running() {
            return StepWindow { start, end: start, frames: 0 };
        }
        self.frames_since_anchor += u64::from(frames);
        StepWindow {
            start,
            end: self.position_steps(),
            frames,
        }
    }
}

impl Default for ClockSource {
    fn default() -> Self {
        Self::new(48000, DEFAULT_BPM)
    }
}
