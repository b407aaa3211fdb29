//! Rolling buffer of raw live note attacks

use std::collections::VecDeque;

use crate::note::{clamp_velocity, Pitch};

/// Default retention of the capture buffer in seconds
pub const CAPTURE_RETENTION_SECS: f64 = 30.0;

/// One unquantized note attack
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEntry {
    pub pitch: Pitch,
    pub velocity: f32,
    /// Session wall-clock time in seconds
    pub timestamp: f64,
}

/// Time-ordered record of live input with bounded duration.
///
/// Entries older than the retention window are purged on every append.
#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    entries: VecDeque<CaptureEntry>,
    retention_secs: f64,
}

impl CaptureBuffer {
    pub fn new(retention_secs: f64) -> Self {
        Self {
            entries: VecDeque::new(),
            retention_secs: retention_secs.max(0.0),
        }
    }

    pub fn retention_secs(&self) -> f64 {
        self.retention_secs
    }

    /// Record an attack at `timestamp`, then drop anything that fell out of
    /// the retention window relative to it
    pub fn record(&mut self, pitch: Pitch, velocity: f32, timestamp: f64) {
        self.entries.push_back(CaptureEntry {
            pitch,
            velocity: clamp_velocity(velocity),
            timestamp,
        });
        self.purge(timestamp);
    }

    fn purge(&mut self, now: f64) {
        while let Some(front) = self.entries.front() {
            if now - front.timestamp < self.retention_secs {
                break;
            }
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CaptureEntry> {
        self.entries.iter()
    }

    /// Take every entry and leave the buffer empty
    pub fn drain(&mut self) -> Vec<CaptureEntry> {
        std::mem::take(&mut self.entries).into()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new(CAPTURE_RETENTION_SECS)
    }
}
