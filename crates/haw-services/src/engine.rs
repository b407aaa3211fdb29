//! Transport engine: clip playback, live input and capture
//!
//! The control half (`TransportEngine`) and the audio half
//! (`AudioRenderer`) share one `EngineState`. Strip controls and meters are
//! atomics; the clock, clip table and active-note set sit behind one
//! sequencer mutex that the renderer holds only while it collects and
//! dispatches a block's notes.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crossbeam_channel::Receiver;
use haw_core::{
    quantize_last_bar, quantize_wrapped, CaptureBuffer, ChannelStripState, Clip, ClockSource,
    MacroState, MasterBusState, NoteEvent, Pitch, TempoEstimate, TempoEstimator, Track, TrackId,
    TrackKind,
};
use tracing::{debug, info, warn};

use crate::channel_strip::{ChannelStrip, METER_FLOOR_DB};
use crate::clock::{SessionClock, SystemClock};
use crate::config::{ConfigError, EngineConfig};
use crate::events::{event_channel, ActiveNotes, EngineEvent, EventCallbacks, EventSender};
use crate::parameters::{AtomicF32, AtomicF64};
use crate::renderer::AudioRenderer;
use crate::scheduler::ClipScheduler;
use crate::voice::VoiceBank;
use crate::voice_router::VoiceRouter;

/// Clock, clip table and active notes, locked together
#[derive(Debug)]
pub(crate) struct Sequencer {
    pub(crate) clock: ClockSource,
    pub(crate) schedulers: HashMap<TrackId, ClipScheduler>,
    pub(crate) active: ActiveNotes,
    /// Last step reported; `None` right after start
    pub(crate) last_step: Option<u8>,
}

/// Macro knob values, read by the renderer every block
#[derive(Debug)]
pub(crate) struct MacroControls {
    filter: AtomicF32,
    reso: AtomicF32,
    space: AtomicF32,
    heat: AtomicF32,
}

impl MacroControls {
    fn new(state: MacroState) -> Self {
        Self {
            filter: AtomicF32::new(state.filter),
            reso: AtomicF32::new(state.reso),
            space: AtomicF32::new(state.space),
            heat: AtomicF32::new(state.heat),
        }
    }

    pub(crate) fn snapshot(&self) -> MacroState {
        MacroState {
            filter: self.filter.get(),
            reso: self.reso.get(),
            space: self.space.get(),
            heat: self.heat.get(),
        }
    }
}

fn unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Engine state shared between the control and audio threads
pub struct EngineState {
    pub(crate) config: EngineConfig,
    running: AtomicBool,
    bpm: AtomicF64,
    pub(crate) sequencer: Mutex<Sequencer>,
    pub(crate) router: VoiceRouter,
    pub(crate) strips: RwLock<BTreeMap<TrackId, Arc<ChannelStrip>>>,
    pub(crate) master: ChannelStrip,
    pub(crate) master_fx: Mutex<MasterBusState>,
    pub(crate) master_fx_generation: AtomicU64,
    pub(crate) macros: MacroControls,
    capture: Mutex<CaptureBuffer>,
    estimator: TempoEstimator,
    clock: Arc<dyn SessionClock>,
    pub(crate) events: EventSender,
}

impl EngineState {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Silence a track's clip notes; caller holds the sequencer lock
    fn silence_track(&self, seq: &mut Sequencer, track: TrackId) {
        if let Some(scheduler) = seq.schedulers.get_mut(&track) {
            scheduler.clear_pending();
        }
        let released = self.router.release_track(track);
        let changed = seq.active.remove_track(track);
        if changed || !released.is_empty() {
            self.events.send(EngineEvent::ActiveNotes(seq.active.snapshot()));
        }
    }
}

/// Result of analyzing a free-form performance
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub notes: Vec<NoteEvent>,
    /// Tempo the notes were quantized at (now the transport tempo)
    pub bpm: f64,
    /// `None` when nothing was captured or the timing was degenerate
    pub estimate: Option<TempoEstimate>,
}

/// Control side of the engine, owned by the UI thread
pub struct TransportEngine {
    state: Arc<EngineState>,
    events: Receiver<EngineEvent>,
    callbacks: Mutex<EventCallbacks>,
}

impl TransportEngine {
    /// Build an engine timestamping live input with the system clock
    pub fn new(config: EngineConfig, voices: VoiceBank) -> Result<(Self, AudioRenderer), ConfigError> {
        Self::with_clock(config, voices, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(
        config: EngineConfig,
        voices: VoiceBank,
        clock: Arc<dyn SessionClock>,
    ) -> Result<(Self, AudioRenderer), ConfigError> {
        config.validate()?;
        let (sender, receiver) = event_channel(config.event_capacity);
        let sequencer = Sequencer {
            clock: ClockSource::new(config.sample_rate, config.default_bpm),
            schedulers: HashMap::new(),
            active: ActiveNotes::default(),
            last_step: None,
        };
        let bpm = sequencer.clock.bpm();
        let state = Arc::new(EngineState {
            running: AtomicBool::new(false),
            bpm: AtomicF64::new(bpm),
            sequencer: Mutex::new(sequencer),
            router: VoiceRouter::new(voices),
            strips: RwLock::new(BTreeMap::new()),
            master: ChannelStrip::default(),
            master_fx: Mutex::new(MasterBusState::default()),
            master_fx_generation: AtomicU64::new(0),
            macros: MacroControls::new(MacroState::default()),
            capture: Mutex::new(CaptureBuffer::new(config.capture_retention_secs)),
            estimator: TempoEstimator::default(),
            clock,
            events: sender,
            config,
        });
        info!(
            sample_rate = state.config.sample_rate,
            bpm,
            voices = ?state.router.bank(),
            "Engine created"
        );

        let renderer = AudioRenderer::new(state.clone());
        let engine = Self {
            state,
            events: receiver,
            callbacks: Mutex::new(EventCallbacks::default()),
        };
        Ok((engine, renderer))
    }

    /// Get shared state
    pub fn state(&self) -> Arc<EngineState> {
        self.state.clone()
    }

    // --- Transport ---

    /// Start playback from step 0
    pub fn start(&self) {
        let Ok(mut seq) = self.state.sequencer.lock() else {
            return;
        };
        if !seq.clock.start() {
            return;
        }
        seq.last_step = None;
        for scheduler in seq.schedulers.values_mut() {
            scheduler.clear_pending();
        }
        self.state.running.store(true, Ordering::SeqCst);
        let bpm = seq.clock.bpm();
        drop(seq);

        self.state.events.send(EngineEvent::TransportChanged { running: true });
        info!(bpm, "Transport started");
    }

    /// Stop playback and release every clip note synchronously
    pub fn stop(&self) {
        let Ok(mut seq) = self.state.sequencer.lock() else {
            return;
        };
        if !seq.clock.stop() {
            return;
        }
        self.state.running.store(false, Ordering::SeqCst);
        for scheduler in seq.schedulers.values_mut() {
            scheduler.clear_pending();
        }
        let released = self.state.router.release_all_tracks();
        let had_notes = seq.active.clear();
        seq.last_step = None;
        drop(seq);

        if had_notes || !released.is_empty() {
            self.state.events.send(EngineEvent::ActiveNotes(Vec::new()));
        }
        self.state.events.send(EngineEvent::TransportChanged { running: false });
        info!(released = released.len(), "Transport stopped");
    }

    /// Toggle playback and return whether the transport is now running
    pub fn toggle(&self) -> bool {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
        self.is_running()
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Change tempo; the current musical position is kept
    pub fn set_bpm(&self, bpm: f64) -> f64 {
        let Ok(mut seq) = self.state.sequencer.lock() else {
            return self.bpm();
        };
        let applied = seq.clock.set_bpm(bpm);
        drop(seq);

        self.state.bpm.set(applied);
        self.state.events.send(EngineEvent::TempoChanged(applied));
        info!(requested = bpm, bpm = applied, "Tempo changed");
        applied
    }

    pub fn bpm(&self) -> f64 {
        self.state.bpm.get()
    }

    /// Step inside the bar, `None` while stopped
    pub fn current_step(&self) -> Option<u8> {
        let seq = self.state.sequencer.lock().ok()?;
        seq.clock.is_running().then(|| seq.clock.current_step())
    }

    // --- Tracks and clips ---

    /// Route a track to an instrument kind and give it a channel strip
    pub fn register_track(&self, track: TrackId, kind: TrackKind) {
        if self.state.router.register(track, kind) {
            // Sounding notes went with the old voice
            if let Ok(mut seq) = self.state.sequencer.lock() {
                self.state.silence_track(&mut seq, track);
            }
        }
        if let Ok(mut strips) = self.state.strips.write() {
            strips.entry(track).or_insert_with(|| Arc::new(ChannelStrip::default()));
        }
        debug!(track = track.0, kind = kind.name(), "Track registered");
    }

    /// Remove a track, silencing it first
    pub fn unregister_track(&self, track: TrackId) {
        self.stop_track(track);
        self.state.router.unregister(track);
        if let Ok(mut strips) = self.state.strips.write() {
            strips.remove(&track);
        }
        debug!(track = track.0, "Track unregistered");
    }

    /// Bring the engine in line with a track: route, strip and active clip
    pub fn sync_track(&self, track: &Track) {
        self.register_track(track.id, track.kind);
        if let Some(strip) = self.strip(track.id) {
            strip.apply(&track.strip);
        }
        match track.active_clip() {
            Some(clip) if !clip.is_empty() => self.set_clip(track.id, clip.notes().to_vec()),
            _ => self.stop_track(track.id),
        }
    }

    /// Loop `notes` on `track`, replacing its current clip.
    ///
    /// Notes still sounding from the old clip are released before the new
    /// clip can start one. An empty clip stops the track.
    pub fn set_clip(&self, track: TrackId, notes: impl IntoIterator<Item = NoteEvent>) {
        let clip = Clip::from_notes(notes);
        if clip.is_empty() {
            self.stop_track(track);
            return;
        }
        if self.state.router.kind_of(track).is_none() {
            warn!(track = track.0, "Clip set on unregistered track");
            return;
        }

        let Ok(mut seq) = self.state.sequencer.lock() else {
            return;
        };
        if seq.schedulers.get(&track).is_some_and(|s| s.clip() == &clip) {
            return;
        }
        self.state.silence_track(&mut seq, track);
        let notes = clip.len();
        seq.schedulers.insert(track, ClipScheduler::new(track, clip));
        drop(seq);
        debug!(track = track.0, notes, "Clip armed");
    }

    /// Stop a track's clip and silence it immediately
    pub fn stop_track(&self, track: TrackId) {
        let Ok(mut seq) = self.state.sequencer.lock() else {
            return;
        };
        self.state.silence_track(&mut seq, track);
        if seq.schedulers.remove(&track).is_some() {
            debug!(track = track.0, "Track stopped");
        }
    }

    /// Clip currently looping on `track`
    pub fn clip(&self, track: TrackId) -> Option<Clip> {
        let seq = self.state.sequencer.lock().ok()?;
        seq.schedulers.get(&track).map(|s| s.clip().clone())
    }

    /// Clip pitches currently held by `track`'s voice
    pub fn held_notes(&self, track: TrackId) -> Vec<Pitch> {
        self.state.router.held_notes(track)
    }

    // --- Live input and capture ---

    /// Play a live note at full velocity and record it for capture
    pub fn trigger_attack(&self, pitch: &Pitch, kind: TrackKind) {
        self.trigger_attack_with_velocity(pitch, kind, 1.0);
    }

    pub fn trigger_attack_with_velocity(&self, pitch: &Pitch, kind: TrackKind, velocity: f32) {
        let velocity = unit(velocity);
        self.state.router.live_on(kind, pitch, velocity);
        let now = self.state.clock.now_secs();
        if let Ok(mut capture) = self.state.capture.lock() {
            capture.record(pitch.clone(), velocity, now);
        }
    }

    pub fn trigger_release(&self, pitch: &Pitch, kind: TrackKind) {
        self.state.router.live_off(kind, pitch);
    }

    /// Entries waiting in the capture buffer
    pub fn captured_len(&self) -> usize {
        self.state.capture.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_capture(&self) {
        if let Ok(mut capture) = self.state.capture.lock() {
            capture.clear();
        }
    }

    /// Turn the free-form capture buffer into a one-bar clip.
    ///
    /// While stopped the tempo is inferred from the phrase length and
    /// applied to the transport. While running the current tempo is kept.
    /// The buffer is always left empty.
    pub fn analyze_tempo_and_capture(&self) -> CaptureResult {
        let now = self.state.clock.now_secs();
        let entries = match self.state.capture.lock() {
            Ok(mut capture) => capture.drain(),
            Err(_) => Vec::new(),
        };
        let neutral = CaptureResult {
            notes: Vec::new(),
            bpm: self.bpm(),
            estimate: None,
        };

        let Some(origin) = entries.iter().map(|e| e.timestamp).reduce(f64::min) else {
            debug!("Capture requested with empty buffer");
            return neutral;
        };

        let estimate = if self.is_running() {
            TempoEstimate {
                bpm: self.bpm(),
                bars_spanned: 1,
            }
        } else {
            let Some(estimate) = self.state.estimator.estimate(now - origin) else {
                warn!(entries = entries.len(), "Capture span too short to estimate tempo");
                return neutral;
            };
            TempoEstimate {
                bpm: self.set_bpm(estimate.bpm),
                ..estimate
            }
        };

        let notes = Clip::from_notes(quantize_wrapped(&entries, origin, estimate.bpm))
            .notes()
            .to_vec();
        info!(
            captured = entries.len(),
            notes = notes.len(),
            bpm = estimate.bpm,
            bars = estimate.bars_spanned,
            "Performance captured"
        );
        CaptureResult {
            notes,
            bpm: estimate.bpm,
            estimate: Some(estimate),
        }
    }

    /// Quantize the bar just played at the current tempo, for overdubbing.
    ///
    /// The buffer is left empty.
    pub fn capture_performance(&self) -> Vec<NoteEvent> {
        let now = self.state.clock.now_secs();
        let entries = match self.state.capture.lock() {
            Ok(mut capture) => capture.drain(),
            Err(_) => return Vec::new(),
        };
        if entries.is_empty() {
            return Vec::new();
        }
        let mut clip = Clip::new();
        clip.merge_overdub(quantize_last_bar(&entries, now, self.bpm()));
        debug!(captured = entries.len(), notes = clip.len(), "Overdub captured");
        clip.notes().to_vec()
    }

    /// Capture the last bar and merge it into `clip` without overwriting.
    ///
    /// Returns how many notes were added.
    pub fn overdub(&self, clip: &mut Clip) -> usize {
        clip.merge_overdub(self.capture_performance())
    }

    // --- Mixer ---

    fn strip(&self, track: TrackId) -> Option<Arc<ChannelStrip>> {
        let strip = self.state.strips.read().ok()?.get(&track).cloned();
        if strip.is_none() {
            debug!(track = track.0, "No channel strip for track");
        }
        strip
    }

    pub fn set_track_volume(&self, track: TrackId, db: f32) {
        if let Some(strip) = self.strip(track) {
            strip.set_volume_db(db);
        }
    }

    pub fn set_track_mute(&self, track: TrackId, muted: bool) {
        if let Some(strip) = self.strip(track) {
            strip.set_muted(muted);
        }
    }

    pub fn set_track_solo(&self, track: TrackId, soloed: bool) {
        if let Some(strip) = self.strip(track) {
            strip.set_soloed(soloed);
        }
    }

    pub fn track_strip(&self, track: TrackId) -> Option<ChannelStripState> {
        self.strip(track).map(|s| s.state())
    }

    pub fn set_master_volume(&self, db: f32) {
        self.state.master.set_volume_db(db);
    }

    pub fn master_volume_db(&self) -> f32 {
        self.state.master.volume_db()
    }

    /// Replace the master bus settings; the renderer ramps to them
    pub fn update_master_fx(&self, fx: MasterBusState) {
        self.state.master.set_volume_db(fx.volume_db);
        if let Ok(mut current) = self.state.master_fx.lock() {
            *current = fx;
            self.state.master_fx_generation.fetch_add(1, Ordering::Release);
        }
        debug!(volume_db = fx.volume_db, "Master FX updated");
    }

    pub fn master_fx(&self) -> MasterBusState {
        self.state.master_fx.lock().map(|fx| *fx).unwrap_or_default()
    }

    // --- Meters ---

    /// Post-fader peak in dB for each track; unknown tracks read the floor
    pub fn get_meter_values(&self, tracks: &[TrackId]) -> HashMap<TrackId, f32> {
        let mut values = HashMap::with_capacity(tracks.len());
        self.fill_meter_values(tracks, &mut values);
        values
    }

    /// Like `get_meter_values`, reusing `out`
    pub fn fill_meter_values(&self, tracks: &[TrackId], out: &mut HashMap<TrackId, f32>) {
        out.clear();
        let Ok(strips) = self.state.strips.read() else {
            return;
        };
        for id in tracks {
            let db = strips.get(id).map_or(METER_FLOOR_DB, |s| s.meter_db());
            out.insert(*id, db);
        }
    }

    /// Master output level after the limiter
    pub fn master_meter_db(&self) -> f32 {
        self.state.master.meter_db()
    }

    // --- Macros and instruments ---

    pub fn set_filter_frequency(&self, value: f32) {
        self.state.macros.filter.set(unit(value));
    }

    pub fn set_filter_resonance(&self, value: f32) {
        self.state.macros.reso.set(unit(value));
    }

    pub fn set_space(&self, value: f32) {
        self.state.macros.space.set(unit(value));
    }

    pub fn set_heat(&self, value: f32) {
        self.state.macros.heat.set(unit(value));
    }

    pub fn apply_macros(&self, macros: MacroState) {
        self.set_filter_frequency(macros.filter);
        self.set_filter_resonance(macros.reso);
        self.set_space(macros.space);
        self.set_heat(macros.heat);
    }

    pub fn macros(&self) -> MacroState {
        self.state.macros.snapshot()
    }

    pub fn set_instrument_param(&self, kind: TrackKind, name: &str, value: f32) {
        self.state.router.set_instrument_param(kind, name, value);
    }

    // --- Feedback ---

    /// Raw feedback stream, for consumers that poll events themselves
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.events.clone()
    }

    pub fn set_step_callback(&self, callback: impl FnMut(u8) + Send + 'static) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.set_step(callback);
        }
    }

    pub fn set_active_notes_callback(&self, callback: impl FnMut(&[Pitch]) + Send + 'static) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.set_active_notes(callback);
        }
    }

    /// Deliver queued feedback to the callbacks; returns the events handled.
    ///
    /// Call from the UI thread.
    pub fn pump_events(&self) -> usize {
        let Ok(mut callbacks) = self.callbacks.lock() else {
            return 0;
        };
        let mut handled = 0;
        for event in self.events.try_iter() {
            callbacks.dispatch(&event);
            handled += 1;
        }
        handled
    }

    /// Feedback events lost to a full channel
    pub fn dropped_events(&self) -> u64 {
        self.state.events.dropped()
    }
}

impl Drop for TransportEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
