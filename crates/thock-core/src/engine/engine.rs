//! The audio engine facade
//!
//! [`AudioEngine`] ties the sound library, the mixer, the hardware driver and
//! the idle timer together and owns the stream lifecycle:
//!
//! ```text
//!            play()                      idle timer, no voices
//! NotReady ─────────► Running ◄────────────────────────────────┐
//!    ▲  configure()     │  │ ─────────────────────────────► Stopped
//!    └── start failed ──┘  └─ reconfigure: stop → rebuild → start
//! ```
//!
//! Lock order is always engine state, then mixer. Because `play()` holds the
//! state lock while it enqueues, the idle timer's "no voices, so stop" check
//! cannot interleave with a new voice arriving.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use rand::Rng;
use thiserror::Error;

use super::events::EngineEvent;
use super::idle::IdleTimer;
use super::latency::{latency_channel, LatencySample, LatencyTracker};
use super::library::{LoadError, SoundLibrary};
use super::mixer::Mixer;
use super::resample::MAX_PITCH_SEMITONES;
use super::voice::VoiceHandle;
use crate::audio::{AudioConfig, AudioError, CpalDriver, OutputDriver, RenderSource, StreamInfo};
use crate::types::Sample;

/// Default idle timeout before the stream is stopped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by the engine facade
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Audio engine has not been configured")]
    NotConfigured,

    #[error("Failed to spawn engine thread: {0}")]
    Thread(#[source] std::io::Error),
}

/// Stream lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not configured yet, or the last start failed; triggers are dropped
    /// until a start succeeds
    NotReady,
    /// Configured, stream closed to save power
    Stopped,
    /// Stream open and rendering
    Running,
}

struct EngineState {
    driver: Box<dyn OutputDriver>,
    config: Option<AudioConfig>,
    lifecycle: LifecycleState,
    stream: Option<StreamInfo>,
    idle_timeout: Duration,
}

struct EngineInner {
    state: Mutex<EngineState>,
    mixer: Arc<Mixer>,
    library: SoundLibrary,
    idle: IdleTimer,
    latency: Mutex<LatencyTracker>,
    measure_latency: AtomicBool,
}

/// Render source handed to the driver: the mixer plus optional instrumentation
struct MixerSource {
    mixer: Arc<Mixer>,
    latency: Option<rtrb::Producer<LatencySample>>,
}

impl RenderSource for MixerSource {
    fn render(&mut self, out: &mut [Sample]) {
        match &mut self.latency {
            Some(producer) => {
                let now = Instant::now();
                self.mixer.render_block_with(out, |voice| {
                    let _ = producer.push(LatencySample {
                        voice_id: voice.id(),
                        enqueued_at: voice.enqueued_at(),
                        started_at: now,
                    });
                });
            }
            None => self.mixer.render_block(out),
        }
    }
}

/// Handle to the audio engine
///
/// Cheap to clone; every clone drives the same engine.
#[derive(Clone)]
pub struct AudioEngine {
    inner: Arc<EngineInner>,
}

impl AudioEngine {
    /// Create an engine on top of `driver`
    ///
    /// Nothing is opened until [`AudioEngine::configure`] is called.
    pub fn new(driver: Box<dyn OutputDriver>) -> Result<Self, EngineError> {
        let (idle, worker) = IdleTimer::new();
        let inner = Arc::new(EngineInner {
            state: Mutex::new(EngineState {
                driver,
                config: None,
                lifecycle: LifecycleState::NotReady,
                stream: None,
                idle_timeout: DEFAULT_IDLE_TIMEOUT,
            }),
            mixer: Arc::new(Mixer::new()),
            library: SoundLibrary::new(),
            idle,
            latency: Mutex::new(LatencyTracker::new()),
            measure_latency: AtomicBool::new(false),
        });

        let weak: Weak<EngineInner> = Arc::downgrade(&inner);
        worker
            .spawn(move |generation| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_idle_fire(generation);
                }
            })
            .map_err(EngineError::Thread)?;

        Ok(Self { inner })
    }

    /// Create an engine that plays through cpal
    pub fn with_cpal() -> Result<Self, EngineError> {
        Self::new(Box::new(CpalDriver::new()))
    }

    /// Set buffer size and output device, rebuilding and starting the stream
    pub fn configure(
        &self,
        buffer_frames: u32,
        device_uid: Option<String>,
    ) -> Result<(), EngineError> {
        let mut config = AudioConfig::new(buffer_frames, device_uid.as_deref());
        if let Some(previous) = self.config() {
            config.sample_rate = previous.sample_rate;
        }
        self.reconfigure(config)
    }

    /// Tear the stream down and start it again with `config`
    ///
    /// In-flight voices are dropped.
    pub fn reconfigure(&self, config: AudioConfig) -> Result<(), EngineError> {
        let mut state = self.inner.lock_state();
        self.inner.idle.cancel();
        state.driver.stop();
        state.stream = None;
        state.lifecycle = LifecycleState::Stopped;
        self.inner.mixer.clear();

        log::info!(
            "Reconfiguring audio: {} frames, device {}",
            config.buffer_frames,
            config
                .device
                .as_ref()
                .map(|d| d.display_label())
                .unwrap_or_else(|| "system default".to_string())
        );
        state.config = Some(config);

        self.inner.start_locked(&mut state)?;
        self.inner.idle.arm(state.idle_timeout);
        Ok(())
    }

    /// Play `sound_name` detuned by a random offset in `±pitch_variation` semitones
    pub fn play(&self, sound_name: &str, pitch_variation: f32) -> Option<VoiceHandle> {
        self.play_with_pitch(sound_name, random_pitch_offset(pitch_variation))
    }

    /// Play `sound_name` at a fixed pitch offset in semitones
    ///
    /// Returns None (and plays nothing) when the sound is unknown or the
    /// stream cannot be started.
    pub fn play_with_pitch(&self, sound_name: &str, semitones: f32) -> Option<VoiceHandle> {
        let Some(sound) = self.inner.library.get(sound_name) else {
            log::debug!("Sound not found: {}", sound_name);
            return None;
        };

        let mut state = self.inner.lock_state();
        self.inner.reap_failed_stream(&mut state);
        if state.lifecycle != LifecycleState::Running {
            if state.config.is_none() {
                log::debug!("Audio engine not configured, dropping {}", sound_name);
                return None;
            }
            if self.inner.start_locked(&mut state).is_err() {
                log::debug!("Audio engine not ready, dropping {}", sound_name);
                return None;
            }
        }

        let handle = self.inner.mixer.enqueue(sound, semitones);
        self.inner.idle.arm(state.idle_timeout);
        log::debug!("Play {} (voice {}, {:+.2} st)", sound_name, handle.id(), semitones);
        Some(handle)
    }

    /// Set master volume (clamped to [0, 1])
    pub fn set_volume(&self, volume: f32) {
        self.inner.mixer.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.inner.mixer.volume()
    }

    /// Replace the sound library with the sounds in `dir`
    ///
    /// Voices already playing finish with the sounds they started with.
    pub fn load_sound_pack(&self, dir: &Path) -> Result<usize, LoadError> {
        self.inner.library.load(dir)
    }

    pub fn library(&self) -> &SoundLibrary {
        &self.inner.library
    }

    /// Change the idle timeout (zero disables auto-stop)
    pub fn set_idle_timeout(&self, timeout: Duration) {
        let mut state = self.inner.lock_state();
        state.idle_timeout = timeout;
        if state.lifecycle == LifecycleState::Running {
            self.inner.idle.arm(timeout);
        } else {
            self.inner.idle.cancel();
        }
        log::info!("Idle timeout set to {:?}", timeout);
    }

    pub fn idle_timeout(&self) -> Duration {
        self.inner.lock_state().idle_timeout
    }

    /// React to a change pushed by a collaborator
    pub fn notify(&self, event: EngineEvent) {
        log::debug!("Engine event: {:?}", event);
        let Some(config) = self.config() else {
            if let EngineEvent::IdleTimeoutChanged(timeout) = event {
                self.set_idle_timeout(timeout);
            } else {
                log::debug!("Ignoring {:?}: engine not configured", event);
            }
            return;
        };

        let result = match event {
            EngineEvent::DeviceChanged(uid) => self.configure(config.buffer_frames, uid),
            EngineEvent::BufferSizeChanged(frames) => {
                let uid = config.device.as_ref().map(|d| d.display_label());
                self.configure(frames, uid)
            }
            EngineEvent::IdleTimeoutChanged(timeout) => {
                self.set_idle_timeout(timeout);
                Ok(())
            }
            EngineEvent::SystemDefaultDeviceChanged => {
                if config.follows_system_default() {
                    self.reconfigure(config)
                } else {
                    Ok(())
                }
            }
        };

        if let Err(e) = result {
            log::warn!("Failed to apply audio change: {}", e);
        }
    }

    /// Apply every event arriving on `events` from an `engine-events` thread
    ///
    /// The thread ends when all senders are dropped.
    pub fn spawn_event_listener(
        &self,
        events: Receiver<EngineEvent>,
    ) -> Result<JoinHandle<()>, EngineError> {
        let engine = self.clone();
        thread::Builder::new()
            .name("engine-events".to_string())
            .spawn(move || {
                for event in events {
                    engine.notify(event);
                }
            })
            .map_err(EngineError::Thread)
    }

    /// Stop the stream now (it restarts on the next `play()`)
    pub fn stop(&self) {
        let mut state = self.inner.lock_state();
        self.inner.idle.cancel();
        self.inner.stop_locked(&mut state);
    }

    /// Stop the stream and the idle timer thread
    pub fn shutdown(&self) {
        self.stop();
        self.inner.idle.shutdown();
        log::info!("Audio engine shut down");
    }

    pub fn state(&self) -> LifecycleState {
        let mut state = self.inner.lock_state();
        self.inner.reap_failed_stream(&mut state);
        state.lifecycle
    }

    pub fn active_voices(&self) -> usize {
        self.inner.mixer.active_voices()
    }

    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.inner.lock_state().stream.clone()
    }

    pub fn config(&self) -> Option<AudioConfig> {
        self.inner.lock_state().config.clone()
    }

    /// Record trigger-to-render latency from the next stream start on
    pub fn set_latency_measurement(&self, enabled: bool) {
        self.inner.measure_latency.store(enabled, Ordering::SeqCst);
    }

    /// Log pending latency samples, returning how many were processed
    pub fn drain_latency(&self) -> usize {
        self.inner.lock_latency().drain()
    }

    /// Mean trigger-to-first-block latency seen so far
    pub fn average_latency_ms(&self) -> Option<f64> {
        self.inner.lock_latency().average_ms()
    }
}

impl EngineInner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_latency(&self) -> MutexGuard<'_, LatencyTracker> {
        self.latency.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open the stream with the stored config
    fn start_locked(&self, state: &mut EngineState) -> Result<(), EngineError> {
        let config = state.config.clone().ok_or(EngineError::NotConfigured)?;

        let (producer, consumer) = if self.measure_latency.load(Ordering::SeqCst) {
            let (producer, consumer) = latency_channel();
            (Some(producer), Some(consumer))
        } else {
            (None, None)
        };
        let source = MixerSource {
            mixer: Arc::clone(&self.mixer),
            latency: producer,
        };

        match state.driver.start(&config, Box::new(source)) {
            Ok(info) => {
                let mut latency = self.lock_latency();
                match consumer {
                    Some(consumer) => latency.attach(consumer, info.latency_ms()),
                    None => latency.detach(),
                }
                drop(latency);

                log::info!(
                    "Audio stream running on {} ({}Hz, ~{:.1}ms per buffer)",
                    info.device_name,
                    info.sample_rate,
                    info.latency_ms()
                );
                state.stream = Some(info);
                state.lifecycle = LifecycleState::Running;
                Ok(())
            }
            Err(e) => {
                // Logged once per transition into not-ready
                if state.lifecycle != LifecycleState::NotReady {
                    log::error!("Audio engine not ready: {}", e);
                } else {
                    log::debug!("Audio stream start failed again: {}", e);
                }
                state.stream = None;
                state.lifecycle = LifecycleState::NotReady;
                Err(e.into())
            }
        }
    }

    fn stop_locked(&self, state: &mut EngineState) {
        state.driver.stop();
        state.stream = None;
        if state.lifecycle == LifecycleState::Running {
            state.lifecycle = LifecycleState::Stopped;
            log::info!("Audio stream stopped");
        }
    }

    /// Move to not-ready when the driver lost its stream behind our back
    ///
    /// Voices queued since then were never rendered and are dropped.
    fn reap_failed_stream(&self, state: &mut EngineState) {
        if state.lifecycle != LifecycleState::Running || state.driver.is_running() {
            return;
        }
        log::error!("Audio engine not ready: output stream failed");
        self.idle.cancel();
        state.driver.stop();
        state.stream = None;
        state.lifecycle = LifecycleState::NotReady;
        self.mixer.clear();
    }

    fn on_idle_fire(&self, generation: u64) {
        let mut state = self.lock_state();
        if !self.idle.is_current(generation) {
            return;
        }
        self.reap_failed_stream(&mut state);
        if state.lifecycle != LifecycleState::Running {
            return;
        }
        // play() enqueues under the state lock we hold, so this check and the
        // stop below are atomic with respect to new voices
        if !self.mixer.is_idle() {
            log::debug!("Idle timer fired with {} voices playing", self.mixer.active_voices());
            return;
        }
        log::info!("No sound for {:?}, stopping audio stream", state.idle_timeout);
        self.stop_locked(&mut state);
    }
}

/// Uniform random offset in `[-range, +range]` semitones
fn random_pitch_offset(range: f32) -> f32 {
    let range = range.abs();
    if !range.is_finite() || range == 0.0 {
        return 0.0;
    }
    let range = range.min(MAX_PITCH_SEMITONES);
    rand::rng().random_range(-range..=range)
}
