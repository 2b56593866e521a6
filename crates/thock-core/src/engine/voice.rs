//! A single in-flight playback of a decoded sound

use std::time::Instant;

use super::gc::SharedSound;
use super::resample::{clamp_pitch, pitch_to_rate};
use super::sound::DecodedSound;

/// Opaque handle returned when a voice is enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle(pub(crate) u64);

impl VoiceHandle {
    /// Correlation id of the voice
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// One playing instance of a sound
///
/// The cursor only moves inside the render callback. Once `finished` is set
/// the voice is never advanced again and the mixer drops it at the end of
/// the current pass.
pub struct Voice {
    pub(crate) sound: SharedSound,
    /// Fractional read position in source frames
    pub(crate) cursor: f64,
    /// Playback rate derived from the pitch offset
    pub(crate) rate: f64,
    pitch: f32,
    id: u64,
    enqueued_at: Instant,
    started: bool,
    pub(crate) finished: bool,
}

impl Voice {
    /// Create a voice at `pitch_semitones`, clamped to `±MAX_PITCH_SEMITONES`
    pub fn new(id: u64, sound: SharedSound, pitch_semitones: f32) -> Self {
        let finished = sound.is_empty();
        let pitch = clamp_pitch(pitch_semitones);
        Self {
            sound,
            cursor: 0.0,
            rate: pitch_to_rate(pitch),
            pitch,
            id,
            enqueued_at: Instant::now(),
            started: false,
            finished,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn handle(&self) -> VoiceHandle {
        VoiceHandle(self.id)
    }

    pub fn sound(&self) -> &DecodedSound {
        &self.sound
    }

    /// Pitch offset in semitones
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns true exactly once, on the voice's first rendered block
    pub(crate) fn take_start(&mut self) -> bool {
        !std::mem::replace(&mut self.started, true)
    }
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("id", &self.id)
            .field("sound", &self.sound.name())
            .field("cursor", &self.cursor)
            .field("pitch", &self.pitch)
            .field("finished", &self.finished)
            .finish()
    }
}
