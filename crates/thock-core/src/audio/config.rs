//! Audio backend configuration
//!
//! Defines the stream geometry (buffer size and pool depth) and device
//! selection. A configuration is never mutated on a running stream: changing
//! it means tearing the driver down and starting it again.

use serde::{Deserialize, Serialize};

/// Smallest buffer the driver will request from a device (frames)
pub const MIN_BUFFER_SIZE: u32 = 32;

/// Largest buffer the driver will request from a device (frames)
pub const MAX_BUFFER_SIZE: u32 = 4096;

/// Default buffer size when no preference is specified (frames)
/// 256 frames @ 44.1kHz = ~5.8ms, low enough for keystroke feedback
pub const DEFAULT_BUFFER_SIZE: u32 = 256;

/// Number of blocks in the driver's buffer pool
pub const DEFAULT_BUFFER_COUNT: usize = 3;

/// Latency presets offered to the user
///
/// These translate to approximately:
/// - 64 frames @ 44.1kHz = ~1.5ms
/// - 128 frames @ 44.1kHz = ~2.9ms
/// - 256 frames @ 44.1kHz = ~5.8ms
/// - 512 frames @ 44.1kHz = ~11.6ms (safe on most systems)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPreset {
    Lowest,
    Low,
    #[default]
    Balanced,
    Safe,
    /// A specific buffer size in frames (clamped by the driver)
    Custom(u32),
}

impl BufferPreset {
    /// Buffer size in frames
    pub fn as_frames(&self) -> u32 {
        match self {
            BufferPreset::Lowest => 64,
            BufferPreset::Low => 128,
            BufferPreset::Balanced => DEFAULT_BUFFER_SIZE,
            BufferPreset::Safe => 512,
            BufferPreset::Custom(frames) => *frames,
        }
    }

    /// Calculate latency in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.as_frames() as f32 / sample_rate as f32) * 1000.0
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, CoreAudio, ...).
/// The string form `"[HOST] name"` doubles as the device UID handed around by
/// collaborators; a bare `"name"` searches every host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "ALSA", "CoreAudio")
    /// If None, every available host is searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Parse a device UID as produced by [`DeviceId::display_label`]
    pub fn parse(uid: &str) -> Self {
        let uid = uid.trim();
        if let Some(rest) = uid.strip_prefix('[') {
            if let Some((host, name)) = rest.split_once(']') {
                let name = name.trim();
                if !host.is_empty() && !name.is_empty() {
                    return Self::with_host(name, host);
                }
            }
        }
        Self::new(uid)
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for one run of the hardware stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output device (None = follow the system default)
    pub device: Option<DeviceId>,

    /// Frames rendered per block
    pub buffer_frames: u32,

    /// Blocks in the driver's pool
    pub buffer_count: usize,

    /// Preferred sample rate (None = device default)
    pub sample_rate: Option<u32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            buffer_frames: DEFAULT_BUFFER_SIZE,
            buffer_count: DEFAULT_BUFFER_COUNT,
            sample_rate: None,
        }
    }
}

impl AudioConfig {
    /// Config with a fixed buffer size on the given device UID
    pub fn new(buffer_frames: u32, device_uid: Option<&str>) -> Self {
        Self {
            device: device_uid.map(DeviceId::parse),
            ..Default::default()
        }
        .with_buffer_frames(buffer_frames)
    }

    /// Set the output device
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Set the buffer size in frames, clamped to the supported range
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_frames = frames.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE);
        self
    }

    /// Set the preferred sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Whether the stream follows the system default output device
    pub fn follows_system_default(&self) -> bool {
        self.device.is_none()
    }
}
