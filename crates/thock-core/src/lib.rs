//! Thock Core - low-latency keyboard sound engine
//!
//! Decodes a pack of short sounds, mixes any number of overlapping voices
//! with per-voice pitch offsets, and streams the result to the audio device,
//! closing the stream again when nothing has played for a while.

pub mod audio;
pub mod config;
pub mod engine;
pub mod pack;
pub mod types;

pub use types::*;
