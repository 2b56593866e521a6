//! CPAL audio backend implementation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  start/stop   ┌──────────────────────┐
//! │  Control thread  │──────────────►│  audio-stream thread │  owns cpal::Stream
//! │   (CpalDriver)   │◄──StreamInfo──│  (parks until stop)  │
//! └──────────────────┘               └──────────┬───────────┘
//!                                               │ platform callback
//!                                    ┌──────────▼───────────┐
//!                                    │   BufferPool.fill()  │  pre-allocated blocks
//!                                    │   RenderSource       │  (mixer)
//!                                    └──────────────────────┘
//! ```
//!
//! `cpal::Stream` is not `Send` on every platform, so it lives on its own
//! thread for its entire life and the driver only talks to that thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{
    BufferSize as CpalBufferSize, FromSample, SampleFormat, SizedSample, Stream, StreamConfig,
    StreamError, SupportedBufferSize,
};
use crossbeam::channel::{self, Sender};

use super::config::AudioConfig;
use super::device::{find_device_by_id, get_cpal_default_device};
use super::driver::{BufferPool, OutputDriver, RenderSource, StreamInfo};
use super::error::{AudioError, AudioResult};
use crate::types::{Sample, CHANNELS, FALLBACK_SAMPLE_RATE};

struct StreamThread {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
    /// Set by the stream's error callback; the stream is dead from then on
    failed: Arc<AtomicBool>,
}

/// Output driver backed by a cpal stream
#[derive(Default)]
pub struct CpalDriver {
    stream_thread: Option<StreamThread>,
}

impl CpalDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputDriver for CpalDriver {
    fn start(
        &mut self,
        config: &AudioConfig,
        source: Box<dyn RenderSource>,
    ) -> AudioResult<StreamInfo> {
        self.stop();

        let (ready_tx, ready_rx) = channel::bounded::<AudioResult<StreamInfo>>(1);
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let config = config.clone();
        let failed = Arc::new(AtomicBool::new(false));
        let stream_failed = Arc::clone(&failed);

        let handle = thread::Builder::new()
            .name("audio-stream".to_string())
            .spawn(move || match open_stream(&config, source, stream_failed) {
                Ok((stream, info)) => {
                    let _ = ready_tx.send(Ok(info));
                    // Park until stop() or the driver is dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                    log::info!("Audio stream closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(info)) => {
                self.stream_thread = Some(StreamThread {
                    stop_tx,
                    handle,
                    failed,
                });
                Ok(info)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::StreamThreadLost)
            }
        }
    }

    fn stop(&mut self) {
        if let Some(thread) = self.stream_thread.take() {
            let _ = thread.stop_tx.send(());
            let _ = thread.handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.stream_thread
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished() && !t.failed.load(Ordering::SeqCst))
    }
}

impl Drop for CpalDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Resolve the device, negotiate the format and start playing
fn open_stream(
    config: &AudioConfig,
    source: Box<dyn RenderSource>,
    failed: Arc<AtomicBool>,
) -> AudioResult<(Stream, StreamInfo)> {
    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => get_cpal_default_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (supported_config, buffer_frames) = get_output_config(&device, config)?;
    let sample_rate = supported_config.sample_rate().0;
    let sample_format = supported_config.sample_format();

    let stream_config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_frames),
    };

    let pool = BufferPool::new(buffer_frames, config.buffer_count)?;

    let info = StreamInfo {
        device_name,
        sample_rate,
        channels: stream_config.channels,
        buffer_frames,
        buffer_count: pool.len(),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {:?}, {} frames x {} buffers (~{:.1}ms per buffer)",
        info.channels,
        sample_rate,
        sample_format,
        buffer_frames,
        info.buffer_count,
        info.latency_ms()
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_output_stream::<f32>(&device, &stream_config, pool, source, failed)?,
        SampleFormat::I16 => build_output_stream::<i16>(&device, &stream_config, pool, source, failed)?,
        SampleFormat::U16 => build_output_stream::<u16>(&device, &stream_config, pool, source, failed)?,
        other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");
    Ok((stream, info))
}

/// Get the best output configuration for a device
///
/// Returns (SupportedStreamConfig, buffer_size_in_frames). The sample rate
/// is the requested one if the device supports it, otherwise the device's
/// own default; the engine never resamples to match.
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported_configs.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let device_rate = device
        .default_output_config()
        .map(|c| c.sample_rate().0)
        .unwrap_or(FALLBACK_SAMPLE_RATE);
    let target_sample_rate = config.sample_rate.unwrap_or(device_rate);

    let supports_rate = |c: &cpal::SupportedStreamConfigRange| {
        target_sample_rate >= c.min_sample_rate().0 && target_sample_rate <= c.max_sample_rate().0
    };
    let format_rank = |format: SampleFormat| match format {
        SampleFormat::F32 => 0,
        SampleFormat::I16 => 1,
        SampleFormat::U16 => 2,
        _ => 3,
    };

    let best_config = supported_configs
        .iter()
        .filter(|c| c.channels() as usize >= CHANNELS && supports_rate(c))
        .min_by_key(|c| format_rank(c.sample_format()))
        .or_else(|| {
            // Mono devices are folded down
            supported_configs
                .iter()
                .filter(|c| supports_rate(c))
                .min_by_key(|c| format_rank(c.sample_format()))
        })
        .or_else(|| supported_configs.first())
        .ok_or_else(|| {
            AudioError::ConfigError("No suitable output configuration found".to_string())
        })?;

    let sample_rate = if supports_rate(best_config) {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best_config.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    let buffer_frames = match best_config.buffer_size() {
        SupportedBufferSize::Range { min, max } => {
            let clamped = config.buffer_frames.clamp(*min, *max);
            if clamped != config.buffer_frames {
                log::warn!(
                    "Buffer size {} outside device range {}..={}, using {}",
                    config.buffer_frames,
                    min,
                    max,
                    clamped
                );
            }
            clamped
        }
        SupportedBufferSize::Unknown => config.buffer_frames,
    };

    Ok((best_config.clone().with_sample_rate(sample_rate), buffer_frames))
}

/// Record a stream error; the driver reports itself stopped from then on
///
/// cpal gives no way to tell a recoverable backend error from a dead
/// stream, so every error counts and the next `play()` reopens the device.
fn mark_failed(failed: &AtomicBool, err: &StreamError) {
    if !failed.swap(true, Ordering::SeqCst) {
        if let StreamError::DeviceNotAvailable = err {
            log::warn!("Audio device went away, stream will be reopened on next use");
        }
    }
}

/// Build the output stream for device sample type `T`
///
/// The callback renders stereo blocks from the pool and spreads them over
/// the device's channel layout: extra channels get silence, mono devices get
/// the average of left and right.
fn build_output_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut pool: BufferPool,
    mut source: Box<dyn RenderSource>,
    failed: Arc<AtomicBool>,
) -> AudioResult<Stream>
where
    T: SizedSample + FromSample<Sample>,
{
    let channels = config.channels as usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                pool.fill(frames, source.as_mut(), |offset, block| {
                    let out = &mut data[offset * channels..];
                    for (frame, src) in out.chunks_mut(channels).zip(block.chunks_exact(CHANNELS)) {
                        if channels == 1 {
                            frame[0] = T::from_sample((src[0] + src[1]) * 0.5);
                            continue;
                        }
                        frame[0] = T::from_sample(src[0]);
                        frame[1] = T::from_sample(src[1]);
                        for ch in frame.iter_mut().skip(CHANNELS) {
                            *ch = T::EQUILIBRIUM;
                        }
                    }
                });
                // Partial trailing frame (never expected from a sane host)
                for sample in data.iter_mut().skip(frames * channels) {
                    *sample = T::EQUILIBRIUM;
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
                mark_failed(&failed, &err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_marks_failed_once() {
        let failed = AtomicBool::new(false);
        mark_failed(&failed, &StreamError::DeviceNotAvailable);
        assert!(failed.load(Ordering::SeqCst));
        mark_failed(
            &failed,
            &StreamError::BackendSpecific {
                err: cpal::BackendSpecificError {
                    description: "xrun".to_string(),
                },
            },
        );
        assert!(failed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stopped_driver_is_not_running() {
        let mut driver = CpalDriver::new();
        assert!(!driver.is_running());
        driver.stop();
        assert!(!driver.is_running());
    }
}
