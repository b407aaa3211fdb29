use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use haw_core::MacroState;
use haw_services::EngineConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeadlessConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub macros: MacroState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Bars of the demo session to render
    pub bars: u32,
    /// Frames handed to the renderer per callback
    pub block_frames: usize,
    /// Where to write the rendered mix; nothing is written when unset
    pub wav_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            bars: 4,
            block_frames: 512,
            wav_path: None,
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("haw")
        .join("config.toml")
}

/// Load the user config, falling back to defaults when it is missing or bad
pub fn load_config() -> HeadlessConfig {
    let path = config_path();
    std::fs::read_to_string(&path)
        .ok()
        .and_then(|s| toml::from_str(&s).ok())
        .unwrap_or_default()
}

/// Load a config the user named explicitly; here a bad file is an error
pub fn load_config_from(path: &Path) -> Result<HeadlessConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn parse_config(text: &str) -> Result<HeadlessConfig> {
    let config: HeadlessConfig = toml::from_str(text)?;
    anyhow::ensure!(config.render.block_frames > 0, "render.block_frames must be at least 1");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.render.bars, 4);
        assert!(config.render.wav_path.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = parse_config(
            r#"
            [engine]
            sample_rate = 44100
            default_bpm = 96.0

            [render]
            bars = 2
            wav_path = "out.wav"

            [macros]
            filter = 0.5
            reso = 0.2
            space = 0.0
            heat = 0.3
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.sample_rate, 44100);
        assert_eq!(config.engine.default_bpm, 96.0);
        assert_eq!(config.engine.volume_ramp_ms, 20.0);
        assert_eq!(config.render.bars, 2);
        assert_eq!(config.render.block_frames, 512);
        assert_eq!(config.render.wav_path, Some(PathBuf::from("out.wav")));
        assert_eq!(config.macros.heat, 0.3);
    }

    #[test]
    fn test_zero_block_rejected() {
        assert!(parse_config("[render]\nblock_frames = 0").is_err());
    }
}
