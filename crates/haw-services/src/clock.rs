//! Session wall clock used to timestamp live input

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic seconds since the session began
pub trait SessionClock: Send + Sync {
    fn now_secs(&self) -> f64;
}

/// Real time, measured from construction
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock for SystemClock {
    fn now_secs(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock moved by hand, for offline rendering and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    secs_bits: AtomicU64,
}

impl ManualClock {
    pub fn new(secs: f64) -> Self {
        Self {
            secs_bits: AtomicU64::new(secs.to_bits()),
        }
    }

    pub fn set(&self, secs: f64) {
        self.secs_bits.store(secs.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.now_secs() + secs);
    }
}

impl SessionClock for ManualClock {
    fn now_secs(&self) -> f64 {
        f64::from_bits(self.secs_bits.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1.5);
        clock.advance(0.25);
        assert_eq!(clock.now_secs(), 1.75);
        clock.set(0.0);
        assert_eq!(clock.now_secs(), 0.0);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_secs();
        let b = clock.now_secs();
        assert!(b >= a);
    }
}
