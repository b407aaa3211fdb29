//! Tempo estimation and grid quantization of captured performances

use serde::{Deserialize, Serialize};

use crate::capture::CaptureEntry;
use crate::note::{NoteDuration, NoteEvent, STEPS_PER_BAR};
use crate::transport::{bar_duration_secs, step_duration_secs, DEFAULT_BPM};

/// Result of a tempo inference; recomputed on every capture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    pub bpm: f64,
    pub bars_spanned: u32,
}

/// Infers a plausible tempo from how long a phrase took to play
#[derive(Debug, Clone)]
pub struct TempoEstimator {
    /// Bar counts tried, in preference order for ties
    pub bar_candidates: Vec<u32>,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Tempo the estimate is biased towards
    pub target_bpm: f64,
}

impl Default for TempoEstimator {
    fn default() -> Self {
        Self {
            bar_candidates: vec![1, 2, 4],
            min_bpm: 70.0,
            max_bpm: 160.0,
            target_bpm: 120.0,
        }
    }
}

impl TempoEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimate tempo for a phrase lasting `duration_secs`.
    ///
    /// Returns `None` for a zero, negative or non-finite duration. When no
    /// candidate lands in range the estimate falls back to 120 BPM, 1 bar.
    pub fn estimate(&self, duration_secs: f64) -> Option<TempoEstimate> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return None;
        }

        let mut best: Option<TempoEstimate> = None;
        for &bars in &self.bar_candidates {
            let bpm = f64::from(bars) * 240.0 / duration_secs;
            if bpm < self.min_bpm || bpm > self.max_bpm {
                continue;
            }
            let closer = best.is_none_or(|b| {
                (bpm - self.target_bpm).abs() < (b.bpm - self.target_bpm).abs()
            });
            if closer {
                best = Some(TempoEstimate { bpm, bars_spanned: bars });
            }
        }

        Some(best.unwrap_or(TempoEstimate {
            bpm: DEFAULT_BPM,
            bars_spanned: 1,
        }))
    }
}

fn to_note(entry: &CaptureEntry, step: u8) -> NoteEvent {
    NoteEvent::new(entry.pitch.clone(), entry.velocity, step, NoteDuration::Sixteenth)
}

/// Quantize every entry relative to `origin`, wrapping into a single bar.
///
/// Positions round to the nearest step and fold modulo 16, so a 2- or
/// 4-bar phrase collapses onto one bar.
pub fn quantize_wrapped(entries: &[CaptureEntry], origin: f64, bpm: f64) -> Vec<NoteEvent> {
    let step_secs = step_duration_secs(bpm);
    entries
        .iter()
        .map(|entry| {
            let raw = ((entry.timestamp - origin) / step_secs).round() as i64;
            let step = raw.rem_euclid(i64::from(STEPS_PER_BAR)) as u8;
            to_note(entry, step)
        })
        .collect()
}

/// Quantize the entries that fall in the bar ending at `now`.
///
/// Positions round to the nearest step and clamp to 0-15.
pub fn quantize_last_bar(entries: &[CaptureEntry], now: f64, bpm: f64) -> Vec<NoteEvent> {
    let step_secs = step_duration_secs(bpm);
    let window_start = now - bar_duration_secs(bpm);
    entries
        .iter()
        .filter(|entry| entry.timestamp >= window_start && entry.timestamp <= now)
        .map(|entry| {
            let raw = ((entry.timestamp - window_start) / step_secs).round();
            let step = raw.clamp(0.0, f64::from(STEPS_PER_BAR - 1)) as u8;
            to_note(entry, step)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Pitch;

    fn entry(midi: u8, timestamp: f64) -> CaptureEntry {
        CaptureEntry {
            pitch: Pitch::from_midi(midi),
            velocity: 1.0,
            timestamp,
        }
    }

    #[test]
    fn test_two_seconds_is_one_bar_at_120() {
        let estimate = TempoEstimator::new().estimate(2.0).unwrap();
        assert_eq!(estimate.bpm, 120.0);
        assert_eq!(estimate.bars_spanned, 1);
    }

    #[test]
    fn test_prefers_closest_to_target() {
        // 1 bar -> 60 (rejected), 2 bars -> 120, 4 bars -> 240 (rejected)
        let estimate = TempoEstimator::new().estimate(4.0).unwrap();
        assert_eq!(estimate.bars_spanned, 2);
        assert_eq!(estimate.bpm, 120.0);

        // 1 bar -> 80, 2 bars -> 160: 160 is 40 away, 80 is 40 away -> first wins
        let estimate = TempoEstimator::new().estimate(3.0).unwrap();
        assert_eq!(estimate.bars_spanned, 1);
        assert_eq!(estimate.bpm, 80.0);

        // 1 bar -> 96, 2 bars -> 192 (rejected)
        let estimate = TempoEstimator::new().estimate(2.5).unwrap();
        assert_eq!(estimate.bars_spanned, 1);
        assert!((estimate.bpm - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_when_nothing_fits() {
        // 1 bar -> 24, 2 -> 48, 4 -> 96 (accepted)
        let estimate = TempoEstimator::new().estimate(10.0).unwrap();
        assert_eq!(estimate.bars_spanned, 4);

        // 1 bar -> 2.4, 4 -> 9.6: nothing in range
        let estimate = TempoEstimator::new().estimate(100.0).unwrap();
        assert_eq!(estimate, TempoEstimate { bpm: 120.0, bars_spanned: 1 });
    }

    #[test]
    fn test_degenerate_duration() {
        let estimator = TempoEstimator::new();
        assert!(estimator.estimate(0.0).is_none());
        assert!(estimator.estimate(-1.0).is_none());
        assert!(estimator.estimate(f64::NAN).is_none());
    }

    #[test]
    fn test_aligned_input_quantizes_exactly() {
        // 120 BPM: steps are 0.125s apart
        let entries: Vec<_> = (0..16).map(|i| entry(60 + i as u8, 5.0 + i as f64 * 0.125)).collect();
        let notes = quantize_wrapped(&entries, 5.0, 120.0);
        for (i, note) in notes.iter().enumerate() {
            assert_eq!(note.step as usize, i);
        }
    }

    #[test]
    fn test_wrapping_into_one_bar() {
        // Step 18 of a 2-bar phrase lands on step 2
        let entries = vec![entry(60, 0.0), entry(62, 18.0 * 0.125)];
        let notes = quantize_wrapped(&entries, 0.0, 120.0);
        assert_eq!(notes[0].step, 0);
        assert_eq!(notes[1].step, 2);
    }

    #[test]
    fn test_rounding_not_flooring() {
        // 0.1s is 0.8 of a step at 120 BPM -> rounds up to step 1
        let notes = quantize_wrapped(&[entry(60, 0.0), entry(62, 0.1)], 0.0, 120.0);
        assert_eq!(notes[1].step, 1);
    }

    #[test]
    fn test_last_bar_window() {
        // Bar is 2s at 120 BPM; now = 10 -> window starts at 8
        let entries = vec![entry(60, 7.0), entry(62, 8.0), entry(64, 9.0), entry(65, 9.99)];
        let notes = quantize_last_bar(&entries, 10.0, 120.0);
        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].step, 0);
        assert_eq!(notes[1].step, 8);
        // 1.99s rounds to 16 -> clamped
        assert_eq!(notes[2].step, 15);
    }
}
