//! Sound library for the active sound pack
//!
//! Maps file names to decoded sounds. Loading a pack builds a complete new
//! map off to the side and swaps it in under the write lock, so lookups see
//! either the old pack or the new one. Sounds are `Shared`, so voices still
//! playing from the old pack keep their data alive after the swap.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use rayon::prelude::*;
use thiserror::Error;

use super::gc::{share_sound, SharedSound};
use super::sound::{decode_file, is_supported, DecodedSound};

/// Errors loading a whole sound pack
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read sound pack directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a pack load
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Number of sounds now in the library
    pub loaded: usize,
    /// Files that were skipped and why
    pub skipped: Vec<(PathBuf, String)>,
}

/// Decoded sounds of the active pack, keyed by file name
#[derive(Default)]
pub struct SoundLibrary {
    sounds: RwLock<HashMap<String, SharedSound>>,
}

impl SoundLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the library with every decodable file in `dir`
    ///
    /// Returns the number of sounds loaded. Undecodable files are skipped.
    pub fn load(&self, dir: &Path) -> Result<usize, LoadError> {
        self.load_with_report(dir).map(|report| report.loaded)
    }

    /// Like [`SoundLibrary::load`], also reporting which files were skipped
    pub fn load_with_report(&self, dir: &Path) -> Result<LoadReport, LoadError> {
        let read_dir_error = |source| LoadError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_dir_error)? {
            let path = entry.map_err(read_dir_error)?.path();
            if path.is_file() && is_supported(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let decoded: Vec<_> = paths
            .par_iter()
            .map(|path| (path, decode_file(path)))
            .collect();

        let mut sounds = HashMap::with_capacity(decoded.len());
        let mut report = LoadReport::default();
        for (path, result) in decoded {
            match result {
                Ok(sound) => {
                    sounds.insert(sound.name().to_string(), share_sound(sound));
                }
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    report.skipped.push((path.clone(), e.to_string()));
                }
            }
        }
        report.loaded = sounds.len();

        *self.write() = sounds;
        log::info!(
            "Loaded {} sounds from {} ({} skipped)",
            report.loaded,
            dir.display(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Add or replace a single sound
    pub fn insert(&self, sound: DecodedSound) {
        let name = sound.name().to_string();
        self.write().insert(name, share_sound(sound));
    }

    /// Look up a sound by file name
    pub fn get(&self, name: &str) -> Option<SharedSound> {
        self.read().get(name).cloned()
    }

    /// Sorted names of all loaded sounds
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop every sound (voices still playing keep theirs)
    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SharedSound>> {
        self.sounds.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SharedSound>> {
        self.sounds.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn write_wav(dir: &Path, name: &str, frames: usize) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(dir.join(name), spec).unwrap();
        for i in 0..frames {
            writer.write_sample(i as f32 / frames as f32).unwrap();
            writer.write_sample(-(i as f32) / frames as f32).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path(), "a.wav", 10);
        write_wav(dir.path(), "b.wav", 20);
        std::fs::write(dir.path().join("broken.wav"), b"nope").unwrap();
        std::fs::write(dir.path().join("config.json"), b"{}").unwrap();

        let library = SoundLibrary::new();
        let report = library.load_with_report(dir.path()).unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(library.names(), vec!["a.wav".to_string(), "b.wav".to_string()]);
        assert_eq!(library.get("b.wav").unwrap().frame_count(), 20);
        assert!(library.get("broken.wav").is_none());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let library = SoundLibrary::new();
        library.insert(DecodedSound::new("keep.wav", 48000, vec![StereoSample::silence()]));

        let err = library.load(Path::new("/nonexistent/thock/pack")).unwrap_err();
        assert!(matches!(err, LoadError::ReadDir { .. }));
        // Failed load leaves the previous pack in place
        assert!(library.get("keep.wav").is_some());
    }

    #[test]
    fn test_load_replaces_previous_pack() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_wav(first.path(), "old.wav", 8);
        write_wav(second.path(), "new.wav", 8);

        let library = SoundLibrary::new();
        library.load(first.path()).unwrap();
        let held = library.get("old.wav").unwrap();

        assert_eq!(library.load(second.path()).unwrap(), 1);
        assert!(library.get("old.wav").is_none());
        assert!(library.get("new.wav").is_some());
        // A reference taken before the swap stays valid
        assert_eq!(held.frame_count(), 8);
        assert_eq!(held.frames()[4], StereoSample::new(0.5, -0.5));
    }
}
