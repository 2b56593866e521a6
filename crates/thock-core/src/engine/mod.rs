//! Audio engine: sound library, voices, mixer, lifecycle
//!
//! - SoundLibrary: decoded sounds by file name, replaced wholesale on pack load
//! - Voice/resample: one playing sound with its own pitch and cursor
//! - Mixer: sums active voices into the hardware block under master volume
//! - IdleTimer: closes the stream after a period without sound
//! - AudioEngine: main engine tying everything together

pub(crate) mod gc;
mod engine;
mod events;
mod idle;
mod latency;
mod library;
mod mixer;
mod resample;
mod sound;
mod voice;

pub use engine::*;
pub use events::*;
pub use gc::{share_sound, SharedSound};
pub use idle::{IdleTimer, IdleTimerWorker};
pub use latency::{latency_channel, LatencySample, LatencyTracker, LATENCY_QUEUE_CAPACITY};
pub use library::{LoadError, LoadReport, SoundLibrary};
pub use mixer::*;
pub use resample::{clamp_pitch, pitch_to_rate, render_voice, MAX_PITCH_SEMITONES};
pub use sound::{decode_file, is_supported, DecodeError, DecodedSound, SUPPORTED_EXTENSIONS};
pub use voice::*;
