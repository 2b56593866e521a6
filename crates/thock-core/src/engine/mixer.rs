//! Active-voice mixer
//!
//! Owns the set of playing voices. The control plane appends under the lock
//! (O(1)); the render callback holds the same lock for one pass over the
//! voices, bounded by the block size. Volume sits outside that lock in an
//! atomic so the callback reads it without contention.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::gc::SharedSound;
use super::resample::render_voice;
use super::voice::{Voice, VoiceHandle};
use crate::types::{as_frames_mut, Sample};

/// Maximum number of simultaneously playing voices
pub const MAX_VOICES: usize = 128;

/// Default output volume
pub const DEFAULT_VOLUME: f32 = 0.5;

/// Master volume in [0, 1]
///
/// Read lock-free by the render thread (a write becomes audible at the next
/// block); writers serialize on a separate lock.
pub struct Volume {
    bits: AtomicU32,
    writer: Mutex<()>,
}

impl Volume {
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(clamp_volume(value).to_bits()),
            writer: Mutex::new(()),
        }
    }

    /// Set the volume, clamping to [0, 1] (NaN becomes 0)
    pub fn set(&self, value: f32) {
        let value = clamp_volume(value);
        let _guard = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME)
    }
}

fn clamp_volume(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// The set of playing voices plus master volume
pub struct Mixer {
    voices: Mutex<Vec<Voice>>,
    volume: Volume,
    next_id: AtomicU64,
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            voices: Mutex::new(Vec::with_capacity(MAX_VOICES)),
            volume: Volume::default(),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Voice>> {
        self.voices.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start playing `sound` at the given pitch offset
    ///
    /// When [`MAX_VOICES`] are already playing, the oldest one is cut.
    pub fn enqueue(&self, sound: SharedSound, pitch_semitones: f32) -> VoiceHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let voice = Voice::new(id, sound, pitch_semitones);
        let handle = voice.handle();

        let evicted = {
            let mut voices = self.lock();
            let evicted = if voices.len() >= MAX_VOICES {
                Some(voices.remove(0))
            } else {
                None
            };
            voices.push(voice);
            evicted
        };
        if let Some(voice) = evicted {
            log::debug!("Voice limit reached, cut voice {}", voice.id());
        }
        handle
    }

    /// Render one interleaved stereo block (audio thread only)
    pub fn render_block(&self, out: &mut [Sample]) {
        self.render_block_with(out, |_| {});
    }

    /// Render one block, calling `on_start` for each voice's first block
    ///
    /// The block is always fully overwritten: silence when nothing plays.
    /// Finished voices are removed in a single pass after mixing.
    pub fn render_block_with<F>(&self, out: &mut [Sample], mut on_start: F)
    where
        F: FnMut(&Voice),
    {
        out.fill(0.0);

        let mut voices = self.lock();
        if voices.is_empty() {
            return;
        }

        let gain = self.volume.get();
        let frames = as_frames_mut(out);
        for voice in voices.iter_mut() {
            if voice.take_start() {
                on_start(&*voice);
            }
            render_voice(voice, frames, gain);
        }
        voices.retain(|voice| !voice.is_finished());
    }

    /// Drop every playing voice
    ///
    /// The voice set keeps its capacity; the voices themselves are released
    /// after the lock is let go.
    pub fn clear(&self) {
        let dropped: Vec<Voice> = self.lock().drain(..).collect();
        if !dropped.is_empty() {
            log::debug!("Dropped {} in-flight voices", dropped.len());
        }
    }

    pub fn active_voices(&self) -> usize {
        self.lock().len()
    }

    /// Whether no voice is playing
    pub fn is_idle(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    pub fn set_volume(&self, value: f32) {
        self.volume.set(value);
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}
