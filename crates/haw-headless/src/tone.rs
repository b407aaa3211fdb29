//! Small built-in oscillator voice for offline renders

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::sync::Mutex;

use haw_core::Pitch;
use haw_services::{Voice, VoiceTarget};

const MAX_VOICES: usize = 16;
const SILENCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
}

impl Waveform {
    fn sample(self, phase: f64) -> f64 {
        match self {
            Self::Sine => (phase * TAU).sin(),
            Self::Saw => 2.0 * phase - 1.0,
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ToneParams {
    level: f32,
    /// Seconds
    attack: f32,
    /// Seconds to fall 60 dB
    release: f32,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            level: 0.3,
            attack: 0.005,
            release: 0.25,
        }
    }
}

#[derive(Debug, Clone)]
struct Osc {
    midi: u8,
    freq: f64,
    phase: f64,
    env: f64,
    velocity: f32,
    gate: bool,
    age: usize,
}

impl Osc {
    fn new(midi: u8, velocity: f32) -> Self {
        Self {
            midi,
            freq: 440.0 * 2f64.powf((midi as f64 - 69.0) / 12.0),
            phase: 0.0,
            env: 0.0,
            velocity,
            gate: true,
            age: 0,
        }
    }

    fn is_finished(&self) -> bool {
        !self.gate && self.env < SILENCE
    }
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    On { midi: u8, velocity: f32, offset: u32 },
    Off { midi: u8, offset: u32 },
}

impl Pending {
    fn offset(&self) -> u32 {
        match *self {
            Self::On { offset, .. } | Self::Off { offset, .. } => offset,
        }
    }
}

#[derive(Debug, Default)]
struct TargetState {
    oscs: Vec<Osc>,
    pending: Vec<Pending>,
}

impl TargetState {
    fn start(&mut self, midi: u8, velocity: f32) {
        if let Some(osc) = self.oscs.iter_mut().find(|o| o.midi == midi) {
            osc.gate = true;
            osc.velocity = velocity;
            osc.age = 0;
            return;
        }
        if self.oscs.len() >= MAX_VOICES {
            // Steal the oldest
            if let Some(idx) = self
                .oscs
                .iter()
                .enumerate()
                .max_by_key(|(_, o)| o.age)
                .map(|(i, _)| i)
            {
                self.oscs.swap_remove(idx);
            }
        }
        self.oscs.push(Osc::new(midi, velocity));
    }

    fn release(&mut self, midi: u8) {
        for osc in self.oscs.iter_mut().filter(|o| o.midi == midi) {
            osc.gate = false;
        }
    }
}

/// Polyphonic oscillator keeping clip and live notes apart
pub struct ToneVoice {
    name: String,
    waveform: Waveform,
    one_shot: bool,
    sample_rate: f64,
    params: Mutex<ToneParams>,
    targets: Mutex<HashMap<VoiceTarget, TargetState>>,
}

impl std::fmt::Debug for ToneVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToneVoice")
            .field("name", &self.name)
            .field("waveform", &self.waveform)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl ToneVoice {
    pub fn new(name: impl Into<String>, waveform: Waveform, sample_rate: u32) -> Self {
        Self {
            name: name.into(),
            waveform,
            one_shot: false,
            sample_rate: sample_rate.max(1) as f64,
            params: Mutex::new(ToneParams::default()),
            targets: Mutex::new(HashMap::new()),
        }
    }

    /// Notes decay on their own after the attack and ignore note-offs
    pub fn percussive(mut self) -> Self {
        self.one_shot = true;
        if let Ok(params) = self.params.get_mut() {
            params.release = 0.15;
        }
        self
    }

    fn queue(&self, target: VoiceTarget, event: Pending) {
        if let Ok(mut targets) = self.targets.lock() {
            targets.entry(target).or_default().pending.push(event);
        }
    }
}

impl Voice for ToneVoice {
    fn name(&self) -> &str {
        &self.name
    }

    fn note_on(&self, target: VoiceTarget, pitch: &Pitch, velocity: f32, offset: u32) {
        self.queue(
            target,
            Pending::On {
                midi: pitch.midi(),
                velocity: velocity.clamp(0.0, 1.0),
                offset,
            },
        );
    }

    fn note_off(&self, target: VoiceTarget, pitch: &Pitch, offset: u32) {
        if self.one_shot {
            return;
        }
        self.queue(target, Pending::Off { midi: pitch.midi(), offset });
    }

    fn all_notes_off(&self, target: VoiceTarget) {
        if let Ok(mut targets) = self.targets.lock() {
            targets.remove(&target);
        }
    }

    fn set_param(&self, name: &str, value: f32) {
        let Ok(mut params) = self.params.lock() else { return };
        match name {
            "level" => params.level = value.clamp(0.0, 1.0),
            "attack" => params.attack = value.max(0.0),
            "release" => params.release = value.max(0.001),
            _ => {}
        }
    }

    fn render(&self, target: VoiceTarget, out: &mut [f32]) {
        out.fill(0.0);
        let params = match self.params.lock() {
            Ok(params) => *params,
            Err(_) => return,
        };
        let Ok(mut targets) = self.targets.lock() else { return };
        let Some(state) = targets.get_mut(&target) else { return };

        let dt = 1.0 / self.sample_rate;
        let attack_step = if params.attack > 0.0 {
            dt / params.attack as f64
        } else {
            1.0
        };
        // -60 dB over the release time
        let release_coef = SILENCE.powf(dt / params.release.max(0.001) as f64);

        state.pending.sort_by_key(Pending::offset);
        let frames = out.len();
        let mut next = 0;

        for (frame_idx, sample) in out.iter_mut().enumerate() {
            while let Some(&event) = state.pending.get(next) {
                if event.offset() as usize > frame_idx {
                    break;
                }
                match event {
                    Pending::On { midi, velocity, .. } => state.start(midi, velocity),
                    Pending::Off { midi, .. } => state.release(midi),
                }
                next += 1;
            }

            let mut mix = 0.0f64;
            for osc in &mut state.oscs {
                if osc.gate {
                    osc.env = (osc.env + attack_step).min(1.0);
                    if self.one_shot && osc.env >= 1.0 {
                        osc.gate = false;
                    }
                } else {
                    osc.env *= release_coef;
                }
                mix += self.waveform.sample(osc.phase) * osc.env * osc.velocity as f64;
                osc.phase = (osc.phase + osc.freq * dt).fract();
                osc.age += 1;
            }
            *sample = (mix * params.level as f64) as f32;
        }

        state.pending.drain(..next);
        for event in &mut state.pending {
            match event {
                Pending::On { offset, .. } | Pending::Off { offset, .. } => {
                    *offset = offset.saturating_sub(frames as u32);
                }
            }
        }
        state.oscs.retain(|o| !o.is_finished());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haw_core::TrackId;

    fn peak(buf: &[f32]) -> f32 {
        buf.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn test_silent_without_notes() {
        let voice = ToneVoice::new("Test", Waveform::Saw, 48000);
        let mut out = vec![1.0; 64];
        voice.render(VoiceTarget::Live, &mut out);
        assert_eq!(peak(&out), 0.0);
    }

    #[test]
    fn test_note_starts_at_offset() {
        let voice = ToneVoice::new("Test", Waveform::Square, 48000);
        let c4: Pitch = "C4".parse().unwrap();
        voice.note_on(VoiceTarget::Live, &c4, 1.0, 100);
        let mut out = vec![0.0; 256];
        voice.render(VoiceTarget::Live, &mut out);
        assert_eq!(peak(&out[..100]), 0.0);
        assert!(peak(&out[100..]) > 0.0);
    }

    #[test]
    fn test_offset_beyond_block_carries_over() {
        let voice = ToneVoice::new("Test", Waveform::Square, 48000);
        let c4: Pitch = "C4".parse().unwrap();
        voice.note_on(VoiceTarget::Live, &c4, 1.0, 300);
        let mut out = vec![0.0; 256];
        voice.render(VoiceTarget::Live, &mut out);
        assert_eq!(peak(&out), 0.0);
        voice.render(VoiceTarget::Live, &mut out);
        assert_eq!(peak(&out[..44]), 0.0);
        assert!(peak(&out[44..]) > 0.0);
    }

    #[test]
    fn test_release_fades_out() {
        let voice = ToneVoice::new("Test", Waveform::Sine, 48000);
        voice.set_param("release", 0.01);
        let a4: Pitch = "A4".parse().unwrap();
        let target = VoiceTarget::Track(TrackId(1));
        voice.note_on(target, &a4, 1.0, 0);
        let mut out = vec![0.0; 4800];
        voice.render(target, &mut out);
        assert!(peak(&out) > 0.1);

        voice.note_off(target, &a4, 0);
        voice.render(target, &mut out);
        voice.render(target, &mut out);
        assert_eq!(peak(&out), 0.0);
    }

    #[test]
    fn test_targets_are_independent() {
        let voice = ToneVoice::new("Test", Waveform::Saw, 48000);
        let c2: Pitch = "C2".parse().unwrap();
        let track = VoiceTarget::Track(TrackId(2));
        voice.note_on(track, &c2, 1.0, 0);

        let mut out = vec![0.0; 512];
        voice.render(VoiceTarget::Live, &mut out);
        assert_eq!(peak(&out), 0.0);
        voice.render(track, &mut out);
        assert!(peak(&out) > 0.0);

        voice.all_notes_off(track);
        voice.render(track, &mut out);
        assert_eq!(peak(&out), 0.0);
    }

    #[test]
    fn test_percussive_ignores_note_off() {
        let voice = ToneVoice::new("Kit", Waveform::Sine, 48000).percussive();
        let c1: Pitch = "C1".parse().unwrap();
        voice.note_on(VoiceTarget::Live, &c1, 1.0, 0);
        voice.note_off(VoiceTarget::Live, &c1, 0);
        let mut out = vec![0.0; 2048];
        voice.render(VoiceTarget::Live, &mut out);
        assert!(peak(&out) > 0.1);
    }
}
