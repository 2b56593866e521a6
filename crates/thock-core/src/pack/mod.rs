//! Sound packs
//!
//! A sound pack is a directory of audio files, optionally described by a
//! `config.json` manifest that assigns files to keys. The engine itself only
//! needs the audio files; the manifest is for whoever turns key events into
//! `play()` calls.

mod keymap;
mod manifest;

pub use keymap::{KeyMapper, DEFAULT_KEY};
pub use manifest::{
    KeyDirection, KeySounds, License, ManifestError, SoundPackManifest, MANIFEST_FILE,
};
