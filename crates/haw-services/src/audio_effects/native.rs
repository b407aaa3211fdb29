//! Native audio effects using fundsp

use std::fmt;

use fundsp::hacker::*;

use haw_core::{DynamicsParams, SaturationParams};

use super::{AudioEffect, EffectParam};
use crate::parameters::LinearRamp;

/// Crossover between the low and mid bands of the dynamics stage
const CROSSOVER_HZ: f32 = 250.0;
/// Fixed compressor attack
const DYNAMICS_ATTACK_MS: f32 = 5.0;
/// Quietest level the envelope follower reports
const DETECTOR_FLOOR: f32 = 1e-6;

#[inline]
fn blend(dry: f32, wet: f32, mix: f32) -> f32 {
    dry * (1.0 - mix) + wet * mix
}

/// One-pole smoothing coefficient for a time constant
fn smoothing_coef(time_ms: f32, sample_rate: f32) -> f32 {
    let frames = (time_ms * 0.001 * sample_rate).max(1.0);
    (-1.0 / frames).exp()
}

/// Resonant low-pass on the shared send
pub struct ToneFilterEffect {
    cutoff: LinearRamp,
    q: LinearRamp,
    filter: An<FixedSvf<f64, LowpassMode<f64>>>,
    dirty: bool,
}

impl ToneFilterEffect {
    pub fn new(cutoff_hz: f32, q: f32, sample_rate: f32, ramp_frames: u32) -> Self {
        let mut filter = lowpass_hz(cutoff_hz, q);
        filter.set_sample_rate(sample_rate as f64);
        Self {
            cutoff: LinearRamp::new(cutoff_hz, ramp_frames),
            q: LinearRamp::new(q, ramp_frames),
            filter,
            dirty: false,
        }
    }
}

impl fmt::Debug for ToneFilterEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToneFilterEffect")
            .field("cutoff_hz", &self.cutoff.target())
            .field("q", &self.q.target())
            .finish()
    }
}

impl AudioEffect for ToneFilterEffect {
    fn name(&self) -> &str { "Filter" }

    fn process(&mut self, samples: &mut [f32]) {
        if self.dirty || self.is_ramping() {
            let frames = samples.len() as u32;
            let cutoff = self.cutoff.advance(frames);
            let q = self.q.advance(frames);
            self.filter.set(Setting::center_q(cutoff, q));
            self.dirty = false;
        }
        for sample in samples.iter_mut() {
            let input = Frame::from([*sample]);
            let output = self.filter.tick(&input);
            *sample = output[0];
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "cutoff" => self.cutoff.set_target(value.clamp(20.0, 20_000.0)),
            "q" => self.q.set_target(value.clamp(0.1, 15.0)),
            _ => return,
        }
        self.dirty = true;
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("cutoff", self.cutoff.target(), 100.0, 10_000.0, "Hz"),
            EffectParam::new("q", self.q.target(), 0.1, 15.0, ""),
        ]
    }

    fn is_ramping(&self) -> bool { self.cutoff.is_ramping() || self.q.is_ramping() }
}

/// Soft waveshaping distortion on the shared send
#[derive(Debug)]
pub struct HeatEffect {
    drive: LinearRamp,
    mix: LinearRamp,
}

impl HeatEffect {
    pub fn new(drive: f32, mix: f32, ramp_frames: u32) -> Self {
        Self {
            drive: LinearRamp::new(drive.clamp(0.0, 1.0), ramp_frames),
            mix: LinearRamp::new(mix.clamp(0.0, 1.0), ramp_frames),
        }
    }
}

impl AudioEffect for HeatEffect {
    fn name(&self) -> &str { "Heat" }

    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let gain = 1.0 + self.drive.next_value() * 20.0;
            let mix = self.mix.next_value();
            let shaped = (*sample * gain).tanh();
            *sample = blend(*sample, shaped, mix);
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "drive" => self.drive.set_target(value.clamp(0.0, 1.0)),
            "mix" => self.mix.set_target(value.clamp(0.0, 1.0)),
            _ => {}
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("drive", self.drive.target(), 0.0, 1.0, ""),
            EffectParam::new("mix", self.mix.target(), 0.0, 1.0, ""),
        ]
    }

    fn is_ramping(&self) -> bool { self.drive.is_ramping() || self.mix.is_ramping() }
}

/// Comb-bank reverb on the shared send
pub struct SpaceEffect {
    decay: LinearRamp,
    mix: LinearRamp,
    delays: Vec<Vec<f32>>,
    positions: Vec<usize>,
    feedback: Vec<f32>,
    sample_rate: f32,
    dirty: bool,
}

impl SpaceEffect {
    /// Base comb delay in milliseconds
    const BASE_DELAY_MS: f32 = 35.0;

    pub fn new(decay_secs: f32, mix: f32, sample_rate: f32, ramp_frames: u32) -> Self {
        let mut effect = Self {
            decay: LinearRamp::new(decay_secs.clamp(0.1, 20.0), ramp_frames),
            mix: LinearRamp::new(mix.clamp(0.0, 1.0), ramp_frames),
            delays: Vec::new(),
            positions: Vec::new(),
            feedback: Vec::new(),
            sample_rate,
            dirty: true,
        };
        effect.rebuild_delays();
        effect
    }

    fn rebuild_delays(&mut self) {
        let delay_times_ms = [1.0, 1.13, 1.27, 1.41].map(|ratio| Self::BASE_DELAY_MS * ratio);
        self.delays = delay_times_ms
            .iter()
            .map(|&ms| {
                let samples = (ms * self.sample_rate / 1000.0) as usize;
                vec![0.0; Ord::max(samples, 1)]
            })
            .collect();
        self.positions = vec![0; self.delays.len()];
        self.feedback = vec![0.0; self.delays.len()];
        self.dirty = true;
    }

    /// Comb feedback so each line decays 60 dB in `decay_secs`
    fn update_feedback(&mut self, decay_secs: f32) {
        let decay_secs = decay_secs.max(0.05);
        for (feedback, line) in self.feedback.iter_mut().zip(&self.delays) {
            let line_secs = line.len() as f32 / self.sample_rate;
            *feedback = 0.001f32.powf(line_secs / decay_secs);
        }
    }
}

impl fmt::Debug for SpaceEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpaceEffect")
            .field("decay_secs", &self.decay.target())
            .field("mix", &self.mix.target())
            .finish()
    }
}

impl AudioEffect for SpaceEffect {
    fn name(&self) -> &str { "Space" }

    fn process(&mut self, samples: &mut [f32]) {
        if self.dirty || self.decay.is_ramping() {
            let decay = self.decay.advance(samples.len() as u32);
            self.update_feedback(decay);
            self.dirty = false;
        }

        let lines = self.delays.len() as f32;
        for sample in samples.iter_mut() {
            let dry = *sample;
            let mut wet = 0.0;

            for (i, delay_buf) in self.delays.iter_mut().enumerate() {
                let pos = self.positions[i];
                let delayed = delay_buf[pos];
                wet += delayed;
                delay_buf[pos] = dry + delayed * self.feedback[i];
                self.positions[i] = (pos + 1) % delay_buf.len();
            }

            *sample = blend(dry, wet / lines, self.mix.next_value());
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "decay" => self.decay.set_target(value.clamp(0.1, 20.0)),
            "mix" => self.mix.set_target(value.clamp(0.0, 1.0)),
            _ => {}
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("decay", self.decay.target(), 1.0, 11.0, "s"),
            EffectParam::new("mix", self.mix.target(), 0.0, 1.0, ""),
        ]
    }

    fn is_ramping(&self) -> bool { self.decay.is_ramping() || self.mix.is_ramping() }
}

/// Master "analog clip" stage: color tilt, tanh drive and a hard ceiling
pub struct SaturationEffect {
    drive: LinearRamp,
    ceiling: LinearRamp,
    color_freq: LinearRamp,
    color_q: LinearRamp,
    low_gain: LinearRamp,
    hi_gain: LinearRamp,
    output: LinearRamp,
    mix: LinearRamp,
    params: SaturationParams,
    color: An<FixedSvf<f64, LowpassMode<f64>>>,
    dirty: bool,
}

impl SaturationEffect {
    pub fn new(params: SaturationParams, sample_rate: f32, ramp_frames: u32) -> Self {
        let mut color = lowpass_hz(params.color_freq_hz(), params.color_q());
        color.set_sample_rate(sample_rate as f64);
        Self {
            drive: LinearRamp::new(params.drive_gain(), ramp_frames),
            ceiling: LinearRamp::new(params.clip_ceiling(), ramp_frames),
            color_freq: LinearRamp::new(params.color_freq_hz(), ramp_frames),
            color_q: LinearRamp::new(params.color_q(), ramp_frames),
            low_gain: LinearRamp::new(db_amp(params.color_low_db()), ramp_frames),
            hi_gain: LinearRamp::new(db_amp(params.color_hi_db()), ramp_frames),
            output: LinearRamp::new(db_amp(params.output_db()), ramp_frames),
            mix: LinearRamp::new(params.wet(), ramp_frames),
            params,
            color,
            dirty: false,
        }
    }

    /// Ramp every control towards a new parameter set
    pub fn apply(&mut self, params: &SaturationParams) {
        self.params = *params;
        self.set_param("drive", params.drive_gain());
        self.set_param("ceiling", params.clip_ceiling());
        self.set_param("color_freq", params.color_freq_hz());
        self.set_param("color_q", params.color_q());
        self.set_param("color_low", params.color_low_db());
        self.set_param("color_hi", params.color_hi_db());
        self.set_param("output", params.output_db());
        self.set_param("mix", params.wet());
    }

    pub fn params(&self) -> &SaturationParams {
        &self.params
    }
}

impl fmt::Debug for SaturationEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaturationEffect")
            .field("params", &self.params)
            .finish()
    }
}

impl AudioEffect for SaturationEffect {
    fn name(&self) -> &str { "Saturation" }

    fn process(&mut self, samples: &mut [f32]) {
        if self.dirty || self.color_freq.is_ramping() || self.color_q.is_ramping() {
            let frames = samples.len() as u32;
            let freq = self.color_freq.advance(frames);
            let q = self.color_q.advance(frames);
            self.color.set(Setting::center_q(freq, q));
            self.dirty = false;
        }

        for sample in samples.iter_mut() {
            let dry = *sample;
            let low = self.color.tick(&Frame::from([dry]))[0];
            let high = dry - low;
            let colored = low * self.low_gain.next_value() + high * self.hi_gain.next_value();

            let ceiling = self.ceiling.next_value();
            let shaped = (colored * self.drive.next_value()).tanh().clamp(-ceiling, ceiling);
            let wet = shaped * self.output.next_value();
            *sample = blend(dry, wet, self.mix.next_value());
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "drive" => self.drive.set_target(value.max(1.0)),
            "ceiling" => self.ceiling.set_target(value.clamp(0.05, 1.0)),
            "color_freq" => {
                self.color_freq.set_target(value.clamp(20.0, 20_000.0));
                self.dirty = true;
            }
            "color_q" => {
                self.color_q.set_target(value.clamp(0.1, 10.0));
                self.dirty = true;
            }
            "color_low" => self.low_gain.set_target(db_amp(value)),
            "color_hi" => self.hi_gain.set_target(db_amp(value)),
            "output" => self.output.set_target(db_amp(value)),
            "mix" => self.mix.set_target(value.clamp(0.0, 1.0)),
            _ => {}
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        let p = &self.params;
        vec![
            EffectParam::new("drive", p.drive_gain(), 1.0, 25.0, "x"),
            EffectParam::new("ceiling", p.clip_ceiling(), 0.25, 1.0, ""),
            EffectParam::new("color_freq", p.color_freq_hz(), 200.0, 8000.0, "Hz"),
            EffectParam::new("color_q", p.color_q(), 0.5, 4.0, ""),
            EffectParam::new("color_low", p.color_low_db(), -12.0, 12.0, "dB"),
            EffectParam::new("color_hi", p.color_hi_db(), -12.0, 12.0, "dB"),
            EffectParam::new("output", p.output_db(), -12.0, 12.0, "dB"),
            EffectParam::new("mix", p.wet(), 0.0, 1.0, ""),
        ]
    }

    fn is_ramping(&self) -> bool {
        [
            &self.drive,
            &self.ceiling,
            &self.color_freq,
            &self.color_q,
            &self.low_gain,
            &self.hi_gain,
            &self.output,
            &self.mix,
        ]
        .iter()
        .any(|r| r.is_ramping())
    }
}

/// Master "punch glue" stage: two-band tilt into a feed-forward compressor
pub struct DynamicsEffect {
    threshold_db: LinearRamp,
    ratio: LinearRamp,
    low_gain: LinearRamp,
    mid_gain: LinearRamp,
    hi_pass: LinearRamp,
    release_ms: LinearRamp,
    output: LinearRamp,
    mix: LinearRamp,
    params: DynamicsParams,
    crossover: An<FixedSvf<f64, LowpassMode<f64>>>,
    detector: An<FixedSvf<f64, HighpassMode<f64>>>,
    envelope: f32,
    attack_coef: f32,
    release_coef: f32,
    sample_rate: f32,
}

impl DynamicsEffect {
    pub fn new(params: DynamicsParams, sample_rate: f32, ramp_frames: u32) -> Self {
        let mut crossover = lowpass_hz(CROSSOVER_HZ, 0.707);
        crossover.set_sample_rate(sample_rate as f64);
        let mut detector = highpass_hz(params.hi_pass_hz(), 0.707);
        detector.set_sample_rate(sample_rate as f64);
        Self {
            threshold_db: LinearRamp::new(params.threshold_db(), ramp_frames),
            ratio: LinearRamp::new(params.ratio(), ramp_frames),
            low_gain: LinearRamp::new(db_amp(params.low_gain_db()), ramp_frames),
            mid_gain: LinearRamp::new(db_amp(params.mid_gain_db()), ramp_frames),
            hi_pass: LinearRamp::new(params.hi_pass_hz(), ramp_frames),
            release_ms: LinearRamp::new(params.release_ms(), ramp_frames),
            output: LinearRamp::new(db_amp(params.output_gain_db()), ramp_frames),
            mix: LinearRamp::new(params.wet(), ramp_frames),
            params,
            crossover,
            detector,
            envelope: 0.0,
            attack_coef: smoothing_coef(DYNAMICS_ATTACK_MS, sample_rate),
            release_coef: smoothing_coef(params.release_ms(), sample_rate),
            sample_rate,
        }
    }

    /// Ramp every control towards a new parameter set
    pub fn apply(&mut self, params: &DynamicsParams) {
        self.params = *params;
        self.set_param("threshold", params.threshold_db());
        self.set_param("ratio", params.ratio());
        self.set_param("low_gain", params.low_gain_db());
        self.set_param("mid_gain", params.mid_gain_db());
        self.set_param("hi_pass", params.hi_pass_hz());
        self.set_param("release", params.release_ms());
        self.set_param("output", params.output_gain_db());
        self.set_param("mix", params.wet());
    }

    pub fn params(&self) -> &DynamicsParams {
        &self.params
    }

    /// Current envelope follower level in dB
    pub fn envelope_db(&self) -> f32 {
        amp_db(self.envelope.max(DETECTOR_FLOOR))
    }
}

impl fmt::Debug for DynamicsEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicsEffect")
            .field("params", &self.params)
            .field("envelope", &self.envelope)
            .finish()
    }
}

impl AudioEffect for DynamicsEffect {
    fn name(&self) -> &str { "Dynamics" }

    fn process(&mut self, samples: &mut [f32]) {
        let frames = samples.len() as u32;
        if self.hi_pass.is_ramping() {
            let hz = self.hi_pass.advance(frames);
            self.detector.set(Setting::center(hz));
        }
        if self.release_ms.is_ramping() {
            let ms = self.release_ms.advance(frames);
            self.release_coef = smoothing_coef(ms, self.sample_rate);
        }

        for sample in samples.iter_mut() {
            let dry = *sample;
            let low = self.crossover.tick(&Frame::from([dry]))[0];
            let mid = dry - low;
            let shaped = low * self.low_gain.next_value() + mid * self.mid_gain.next_value();

            let level = self.detector.tick(&Frame::from([shaped]))[0].abs();
            let coef = if level > self.envelope { self.attack_coef } else { self.release_coef };
            self.envelope = level + coef * (self.envelope - level);

            let threshold = self.threshold_db.next_value();
            let ratio = self.ratio.next_value().max(1.0);
            let over = amp_db(self.envelope.max(DETECTOR_FLOOR)) - threshold;
            let gain = if over > 0.0 { db_amp(-over * (1.0 - 1.0 / ratio)) } else { 1.0 };

            let wet = shaped * gain * self.output.next_value();
            *sample = blend(dry, wet, self.mix.next_value());
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "threshold" => self.threshold_db.set_target(value.clamp(-60.0, 0.0)),
            "ratio" => self.ratio.set_target(value.clamp(1.0, 40.0)),
            "low_gain" => self.low_gain.set_target(db_amp(value)),
            "mid_gain" => self.mid_gain.set_target(db_amp(value)),
            "hi_pass" => self.hi_pass.set_target(value.clamp(10.0, 2000.0)),
            "release" => self.release_ms.set_target(value.clamp(1.0, 2000.0)),
            "output" => self.output.set_target(db_amp(value)),
            "mix" => self.mix.set_target(value.clamp(0.0, 1.0)),
            _ => {}
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        let p = &self.params;
        vec![
            EffectParam::new("threshold", p.threshold_db(), -60.0, 0.0, "dB"),
            EffectParam::new("ratio", p.ratio(), 1.0, 21.0, ":1"),
            EffectParam::new("low_gain", p.low_gain_db(), -12.0, 12.0, "dB"),
            EffectParam::new("mid_gain", p.mid_gain_db(), -12.0, 12.0, "dB"),
            EffectParam::new("hi_pass", p.hi_pass_hz(), 20.0, 500.0, "Hz"),
            EffectParam::new("release", p.release_ms(), 10.0, 1000.0, "ms"),
            EffectParam::new("output", p.output_gain_db(), -12.0, 12.0, "dB"),
            EffectParam::new("mix", p.wet(), 0.0, 1.0, ""),
        ]
    }

    fn is_ramping(&self) -> bool {
        [
            &self.threshold_db,
            &self.ratio,
            &self.low_gain,
            &self.mid_gain,
            &self.hi_pass,
            &self.release_ms,
            &self.output,
            &self.mix,
        ]
        .iter()
        .any(|r| r.is_ramping())
    }
}

/// Output safety limiter using the fundsp limiter
pub struct LimiterEffect {
    ceiling: LinearRamp,
    ceiling_db: f32,
    limiter: An<Limiter<U1>>,
}

impl LimiterEffect {
    const ATTACK_S: f32 = 0.002;
    const RELEASE_S: f32 = 0.1;

    pub fn new(ceiling_db: f32, sample_rate: f32, ramp_frames: u32) -> Self {
        let mut limiter = limiter(Self::ATTACK_S, Self::RELEASE_S);
        limiter.set_sample_rate(sample_rate as f64);
        Self {
            ceiling: LinearRamp::new(db_amp(ceiling_db), ramp_frames),
            ceiling_db,
            limiter,
        }
    }
}

impl fmt::Debug for LimiterEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimiterEffect")
            .field("ceiling_db", &self.ceiling_db)
            .finish()
    }
}

impl AudioEffect for LimiterEffect {
    fn name(&self) -> &str { "Limiter" }

    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let ceiling = self.ceiling.next_value();
            let scaled = *sample / ceiling;
            let output = self.limiter.tick(&Frame::from([scaled]));
            *sample = output[0] * ceiling;
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        if name != "ceiling" {
            return;
        }
        self.ceiling_db = value.clamp(-24.0, 0.0);
        self.ceiling.set_target(db_amp(self.ceiling_db));
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![EffectParam::new("ceiling", self.ceiling_db, -24.0, 0.0, "dB")]
    }

    fn is_ramping(&self) -> bool { self.ceiling.is_ramping() }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    fn sine(len: usize, freq: f32, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amp * (std::f32::consts::TAU * freq * i as f32 / SR).sin())
            .collect()
    }

    #[test]
    fn test_default_master_stages_are_transparent() {
        let mut saturation = SaturationEffect::new(SaturationParams::default(), SR, 960);
        let mut dynamics = DynamicsEffect::new(DynamicsParams::default(), SR, 960);
        let input = sine(4800, 440.0, 0.5);
        let mut samples = input.clone();
        saturation.process(&mut samples);
        dynamics.process(&mut samples);
        for (a, b) in input.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_saturation_param_change_ramps() {
        let mut saturation = SaturationEffect::new(SaturationParams::default(), SR, 960);
        saturation.apply(&SaturationParams { drive: 1.0, dry_wet: 1.0, ..Default::default() });
        assert!(saturation.is_ramping());

        let mut samples = vec![0.5f32; 959];
        saturation.process(&mut samples);
        assert!(saturation.is_ramping());
        let mut tail = vec![0.5f32; 1];
        saturation.process(&mut tail);
        assert!(!saturation.is_ramping());
        // First output is still almost entirely dry
        assert!((samples[0] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_saturation_clip_ceiling() {
        let params = SaturationParams { drive: 1.0, clip_amount: 1.0, dry_wet: 1.0, ..Default::default() };
        let mut saturation = SaturationEffect::new(params, SR, 0);
        let mut samples = sine(4800, 220.0, 0.9);
        saturation.process(&mut samples);
        assert!(peak(&samples[480..]) <= 0.25 + 1e-4);
    }

    #[test]
    fn test_dynamics_reduces_loud_signal() {
        let params = DynamicsParams {
            threshold: 0.0,
            high_gain: 1.0,
            compressor_hi_pass: 0.0,
            dry_wet: 1.0,
            ..Default::default()
        };
        let mut dynamics = DynamicsEffect::new(params, SR, 0);
        let mut samples = sine(9600, 1000.0, 0.9);
        dynamics.process(&mut samples);
        assert!(peak(&samples[4800..]) < 0.5);
        assert!(dynamics.envelope_db() > -10.0);
    }

    #[test]
    fn test_filter_darkens_high_content() {
        let mut filter = ToneFilterEffect::new(200.0, 0.707, SR, 0);
        let mut samples = sine(4800, 8000.0, 0.5);
        filter.process(&mut samples);
        assert!(peak(&samples[480..]) < 0.05);
    }

    #[test]
    fn test_filter_cutoff_ramp() {
        let mut filter = ToneFilterEffect::new(1000.0, 1.0, SR, 4800);
        filter.set_param("cutoff", 5000.0);
        assert!(filter.is_ramping());
        let mut block = vec![0.0f32; 2400];
        filter.process(&mut block);
        assert!(filter.is_ramping());
        filter.process(&mut block);
        assert!(!filter.is_ramping());
    }

    #[test]
    fn test_space_tail_outlasts_input() {
        let mut space = SpaceEffect::new(1.0, 0.0, SR, 0);
        space.set_param("mix", 1.0);
        space.set_param("decay", 3.0);
        let mut impulse = vec![0.0f32; 24000];
        impulse[0] = 1.0;
        space.process(&mut impulse);
        assert!(peak(&impulse[12000..]) > 0.0);
    }

    #[test]
    fn test_space_dry_when_mix_zero() {
        let mut space = SpaceEffect::new(1.0, 0.0, SR, 0);
        let mut samples = sine(2400, 300.0, 0.3);
        let input = samples.clone();
        space.process(&mut samples);
        assert_eq!(samples, input);
    }

    #[test]
    fn test_limiter_holds_ceiling() {
        let mut limiter = LimiterEffect::new(-6.0, SR, 0);
        let mut samples = sine(48000, 100.0, 2.0);
        limiter.process(&mut samples);
        assert!(peak(&samples[24000..]) <= db_amp(-6.0) * 1.05);
    }
}
