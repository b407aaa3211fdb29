//! Audio-thread half of the engine

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use haw_core::mixer::{filter_cutoff_hz, filter_q, heat_drive, heat_wet, space_decay_secs, space_wet};
use haw_core::{MacroState, MasterBusState, TrackId};
use tracing::trace;

use crate::audio_effects::{
    AudioEffect, DynamicsEffect, EffectChain, HeatEffect, LimiterEffect, SaturationEffect,
    SpaceEffect, ToneFilterEffect,
};
use crate::channel_strip::{ChannelStrip, StripProcessor};
use crate::engine::EngineState;
use crate::events::EngineEvent;
use crate::scheduler::{sort_for_dispatch, NoteAction, ScheduledNote};
use crate::voice::VoiceTarget;

/// Renders the session into mono blocks.
///
/// Signal flow: track voices through their strips, live pads, the shared
/// filter/heat/space sends, saturation, dynamics, master fader, limiter.
/// The master meter taps the limiter output.
pub struct AudioRenderer {
    state: Arc<EngineState>,
    processors: HashMap<TrackId, StripProcessor>,
    master_strip: StripProcessor,
    sends: EffectChain,
    saturation: SaturationEffect,
    dynamics: DynamicsEffect,
    limiter: LimiterEffect,
    macros: MacroState,
    fx_generation: u64,
    strips: Vec<(TrackId, Arc<ChannelStrip>)>,
    scratch: Vec<f32>,
    notes: Vec<ScheduledNote>,
}

impl AudioRenderer {
    pub(crate) fn new(state: Arc<EngineState>) -> Self {
        let config = &state.config;
        let sample_rate = config.sample_rate as f32;
        let macro_frames = config.macro_ramp_frames();
        let macros = state.macros.snapshot();
        let fx = MasterBusState::default();

        let mut sends = EffectChain::new();
        sends.add(Box::new(ToneFilterEffect::new(
            filter_cutoff_hz(macros.filter),
            filter_q(macros.reso),
            sample_rate,
            macro_frames,
        )));
        sends.add(Box::new(HeatEffect::new(heat_drive(macros.heat), heat_wet(macros.heat), macro_frames)));
        sends.add(Box::new(SpaceEffect::new(
            space_decay_secs(macros.space),
            space_wet(macros.space),
            sample_rate,
            macro_frames,
        )));

        Self {
            processors: HashMap::new(),
            master_strip: StripProcessor::new(config.volume_ramp_frames(), config.meter_release_per_frame()),
            sends,
            saturation: SaturationEffect::new(fx.saturation, sample_rate, macro_frames),
            dynamics: DynamicsEffect::new(fx.dynamics, sample_rate, macro_frames),
            limiter: LimiterEffect::new(config.limiter_ceiling_db, sample_rate, macro_frames),
            macros,
            fx_generation: 0,
            strips: Vec::new(),
            scratch: vec![0.0; config.max_block_frames],
            notes: Vec::new(),
            state,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.state.config.sample_rate
    }

    /// Fill `out` with the next frames of the session (audio thread)
    pub fn render(&mut self, out: &mut [f32]) {
        let max_block = self.scratch.len();
        for block in out.chunks_mut(max_block) {
            self.render_block(block);
        }
    }

    fn render_block(&mut self, out: &mut [f32]) {
        let frames = out.len();
        out.fill(0.0);
        self.refresh_controls();
        self.sequence(frames as u32);
        self.mix_tracks(out);
        self.mix_live(out);

        self.sends.process(out);
        self.saturation.process(out);
        self.dynamics.process(out);
        self.master_strip.apply_gain(&self.state.master, false, out);
        self.limiter.process(out);
        self.master_strip.meter(&self.state.master, out);
    }

    /// Pick up macro and master FX changes
    fn refresh_controls(&mut self) {
        let macros = self.state.macros.snapshot();
        if macros != self.macros {
            self.macros = macros;
            self.push_macros(macros);
        }

        let generation = self.state.master_fx_generation.load(Ordering::Acquire);
        if generation == self.fx_generation {
            return;
        }
        // Never wait on the control thread; retry next block
        if let Ok(fx) = self.state.master_fx.try_lock() {
            self.saturation.apply(&fx.saturation);
            self.dynamics.apply(&fx.dynamics);
            self.fx_generation = generation;
        }
    }

    fn push_macros(&mut self, macros: MacroState) {
        let sends = &mut self.sends;
        sends.set_param("Filter", "cutoff", filter_cutoff_hz(macros.filter));
        sends.set_param("Filter", "q", filter_q(macros.reso));
        sends.set_param("Heat", "drive", heat_drive(macros.heat));
        sends.set_param("Heat", "mix", heat_wet(macros.heat));
        sends.set_param("Space", "mix", space_wet(macros.space));
        sends.set_param("Space", "decay", space_decay_secs(macros.space));
    }

    /// Advance the clock and dispatch this block's note boundaries
    fn sequence(&mut self, frames: u32) {
        let state = &*self.state;
        let Ok(mut guard) = state.sequencer.lock() else {
            return;
        };
        let seq = &mut *guard;
        let window = seq.clock.advance(frames);
        if window.is_empty() {
            return;
        }

        if seq.last_step.is_none() {
            let step = (window.start.floor() as u64 % 16) as u8;
            seq.last_step = Some(step);
            state.events.send(EngineEvent::Step(step));
        }
        for boundary in window.step_boundaries() {
            let step = (boundary % 16) as u8;
            if seq.last_step != Some(step) {
                seq.last_step = Some(step);
                state.events.send(EngineEvent::Step(step));
            }
        }

        self.notes.clear();
        for scheduler in seq.schedulers.values_mut() {
            scheduler.collect(&window, &mut self.notes);
        }
        if self.notes.is_empty() {
            return;
        }
        sort_for_dispatch(&mut self.notes);

        let mut changed = false;
        for note in &self.notes {
            match note.action {
                NoteAction::On { velocity } => {
                    if state.router.note_on(note.track, &note.pitch, velocity, note.offset) {
                        changed |= seq.active.add(note.track, &note.pitch);
                    }
                }
                NoteAction::Off => {
                    if state.router.note_off(note.track, &note.pitch, note.offset) {
                        changed |= seq.active.remove(note.track, &note.pitch);
                    }
                }
            }
        }
        trace!(start = window.start, end = window.end, notes = self.notes.len(), "Dispatched block");
        if changed {
            state.events.send(EngineEvent::ActiveNotes(seq.active.snapshot()));
        }
    }

    fn mix_tracks(&mut self, out: &mut [f32]) {
        let state = &*self.state;
        self.strips.clear();
        if let Ok(strips) = state.strips.read() {
            self.strips.extend(strips.iter().map(|(id, strip)| (*id, strip.clone())));
        }
        let any_soloed = self.strips.iter().any(|(_, strip)| strip.is_soloed());

        let ramp_frames = state.config.volume_ramp_frames();
        let release = state.config.meter_release_per_frame();
        let scratch = &mut self.scratch[..out.len()];
        for (id, strip) in &self.strips {
            let Some(kind) = state.router.kind_of(*id) else {
                continue;
            };
            state.router.render(VoiceTarget::Track(*id), kind, scratch);
            let processor = self
                .processors
                .entry(*id)
                .or_insert_with(|| StripProcessor::new(ramp_frames, release));
            processor.process(strip, any_soloed, scratch);
            for (sample, voice) in out.iter_mut().zip(scratch.iter()) {
                *sample += *voice;
            }
        }

        let strips = &self.strips;
        self.processors.retain(|id, _| strips.iter().any(|(s, _)| s == id));
    }

    /// Live pads bypass the track strips
    fn mix_live(&mut self, out: &mut [f32]) {
        let state = &*self.state;
        let scratch = &mut self.scratch[..out.len()];
        for kind in state.router.bank().distinct_kinds() {
            state.router.render(VoiceTarget::Live, kind, scratch);
            for (sample, voice) in out.iter_mut().zip(scratch.iter()) {
                *sample += *voice;
            }
        }
    }

    pub fn is_master_ramping(&self) -> bool {
        self.saturation.is_ramping() || self.dynamics.is_ramping() || self.sends.is_ramping()
    }
}
