//! User-facing engine settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{AudioConfig, BufferPreset};
use crate::engine::{DEFAULT_IDLE_TIMEOUT, DEFAULT_VOLUME};

/// Settings a front end persists between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Frames per hardware block
    pub buffer_size: BufferPreset,
    /// Output device UID (None = follow the system default)
    pub device: Option<String>,
    /// Master volume, 0.0 - 1.0
    pub volume: f32,
    /// Seconds without sound before the stream closes (0 = never)
    pub idle_timeout_secs: u64,
    /// Random detune range in semitones
    pub pitch_variation: f32,
    /// Sound pack directory
    pub sound_pack: Option<PathBuf>,
    /// Log trigger-to-render latency
    pub measure_latency: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            buffer_size: BufferPreset::default(),
            device: None,
            volume: DEFAULT_VOLUME,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
            pitch_variation: 0.0,
            sound_pack: None,
            measure_latency: false,
        }
    }
}

impl EngineSettings {
    pub fn buffer_frames(&self) -> u32 {
        self.buffer_size.as_frames()
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Stream config these settings describe
    pub fn audio_config(&self) -> AudioConfig {
        AudioConfig::new(self.buffer_frames(), self.device.as_deref())
    }
}
