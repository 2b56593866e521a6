//! Sound pack fixtures for integration tests

#![allow(dead_code)]

use std::path::Path;
use std::time::{Duration, Instant};

use thock_core::audio::{NullDriver, NullProbe};
use thock_core::engine::AudioEngine;

pub const SAMPLE_RATE: u32 = 44100;

/// Stereo test signal: left ramps up, right is constant
pub fn ramp(frames: usize) -> Vec<[f32; 2]> {
    (0..frames)
        .map(|i| [i as f32 / frames as f32 - 0.5, 0.25])
        .collect()
}

pub fn constant(frames: usize, value: f32) -> Vec<[f32; 2]> {
    vec![[value, value]; frames]
}

/// Write a 32-bit float stereo WAV so decoding is lossless
pub fn write_wav(path: &Path, frames: &[[f32; 2]]) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for [left, right] in frames {
        writer.write_sample(*left).unwrap();
        writer.write_sample(*right).unwrap();
    }
    writer.finalize().unwrap();
}

/// Engine on a manually driven null device
pub fn manual_engine() -> (AudioEngine, NullProbe) {
    let driver = NullDriver::manual();
    let probe = driver.probe();
    (AudioEngine::new(Box::new(driver)).unwrap(), probe)
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
