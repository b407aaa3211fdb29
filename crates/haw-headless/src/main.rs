//! haw: offline render of the demo session

mod config;
mod session;
mod tone;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use haw_core::{Pitch, TrackKind};
use haw_services::{AudioRenderer, ManualClock, TransportEngine};

use config::{load_config, load_config_from};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("haw=debug".parse()?)
            .add_directive("haw_services=info".parse()?))
        .init();

    let config = match std::env::args_os().nth(1) {
        Some(path) => load_config_from(Path::new(&path))?,
        None => load_config(),
    };
    info!(
        sample_rate = config.engine.sample_rate,
        bars = config.render.bars,
        "Starting haw"
    );

    let clock = Arc::new(ManualClock::new(0.0));
    let voices = session::demo_voices(config.engine.sample_rate);
    let (engine, mut renderer) =
        TransportEngine::with_clock(config.engine.clone(), voices, clock.clone())
            .context("invalid engine config")?;

    engine.apply_macros(config.macros);
    for track in session::demo_tracks()? {
        engine.sync_track(&track);
    }
    engine.set_step_callback(|step| debug!(step, "Step"));
    engine.set_active_notes_callback(|notes| {
        let names: Vec<&str> = notes.iter().map(Pitch::name).collect();
        debug!(?names, "Active notes");
    });

    let mut host = Host {
        engine: &engine,
        renderer: &mut renderer,
        clock: &clock,
        block: vec![0.0; config.render.block_frames],
        recorded: config.render.wav_path.is_some().then(Vec::new),
        peak: 0.0,
    };

    engine.start();
    let bar_secs = 60.0 / engine.bpm() * 4.0;
    host.render_secs(bar_secs * config.render.bars as f64);
    engine.stop();

    let meters = engine.get_meter_values(&[session::LEAD, session::BASS]);
    info!(
        lead_db = meters.get(&session::LEAD).copied(),
        bass_db = meters.get(&session::BASS).copied(),
        master_db = engine.master_meter_db(),
        peak = host.peak,
        dropped = engine.dropped_events(),
        "Render finished"
    );

    host.perform_capture()?;

    if let (Some(path), Some(samples)) = (&config.render.wav_path, &host.recorded) {
        write_wav(path, samples, config.engine.sample_rate)?;
        info!(path = %path.display(), frames = samples.len(), "Wrote mix");
    }

    Ok(())
}

struct Host<'a> {
    engine: &'a TransportEngine,
    renderer: &'a mut AudioRenderer,
    clock: &'a ManualClock,
    block: Vec<f32>,
    recorded: Option<Vec<f32>>,
    peak: f32,
}

impl Host<'_> {
    /// Pull audio like a device callback would, moving the clock along
    fn render_secs(&mut self, secs: f64) {
        let sample_rate = self.renderer.sample_rate() as f64;
        let mut remaining = (secs * sample_rate).round() as usize;
        while remaining > 0 {
            let frames = remaining.min(self.block.len());
            let out = &mut self.block[..frames];
            self.renderer.render(out);
            self.clock.advance(frames as f64 / sample_rate);
            self.engine.pump_events();

            self.peak = out.iter().fold(self.peak, |m, s| m.max(s.abs()));
            if let Some(recorded) = &mut self.recorded {
                recorded.extend_from_slice(out);
            }
            remaining -= frames;
        }
    }

    /// Play a phrase on the pads, then turn it into a clip
    fn perform_capture(&mut self) -> Result<()> {
        let phrase: Vec<Pitch> = ["C4", "Eb4", "G4", "Bb4", "C5", "Bb4", "G4", "Eb4"]
            .iter()
            .map(|name| name.parse())
            .collect::<haw_core::Result<_>>()?;

        self.engine.clear_capture();
        // Eight even notes over two seconds
        let gap = 2.0 / phrase.len() as f64;
        for pitch in &phrase {
            self.engine.trigger_attack(pitch, TrackKind::Lead);
            self.render_secs(gap * 0.5);
            self.engine.trigger_release(pitch, TrackKind::Lead);
            self.render_secs(gap * 0.5);
        }

        let captured = self.engine.analyze_tempo_and_capture();
        info!(
            notes = captured.notes.len(),
            bpm = captured.bpm,
            bars = captured.estimate.map(|e| e.bars_spanned),
            "Pad phrase captured"
        );
        Ok(())
    }
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
