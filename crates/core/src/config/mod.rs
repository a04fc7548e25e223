use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the player.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub player: PlayerConfig,
    pub visualizer: VisualizerConfig,
    pub startup: StartupConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Keys that are absent keep their
    /// default values.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let config = serde_json::from_slice(&bytes)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Returns the configuration from `path` when given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Playback engine and cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Maximum primed audio handles kept by the preload cache.
    pub audio_cache_capacity: usize,
    /// Maximum decoded cover images kept after startup.
    pub image_cache_capacity: usize,
    /// FFT size requested for the analyser tap.
    pub fft_size: usize,
    /// Temporal smoothing applied by the analyser between reads.
    pub smoothing: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            audio_cache_capacity: 3,
            image_cache_capacity: 64,
            fft_size: 512,
            smoothing: 0.8,
        }
    }
}

/// Pulse-line rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Samples per waveform frame.
    pub sample_count: usize,
    /// Frames retained in the history.
    pub history_capacity: usize,
    /// Frames drawn per tick, newest first.
    pub rendered_frames: usize,
    /// Points across the idle pulse.
    pub idle_points: usize,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            sample_count: 32,
            history_capacity: 100,
            rendered_frames: 5,
            idle_points: 50,
        }
    }
}

/// Startup gate behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Per-asset limit while loading the manifest and covers. `None` waits
    /// indefinitely.
    pub asset_timeout_ms: Option<u64>,
}
