//! `config.json` sound pack manifest

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keymap::DEFAULT_KEY;

/// File name of the manifest inside a pack directory
pub const MANIFEST_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Whether a sound is for pressing or releasing a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// Candidate files for one key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeySounds {
    #[serde(default)]
    pub down: Vec<String>,
    #[serde(default)]
    pub up: Vec<String>,
}

impl KeySounds {
    pub fn for_direction(&self, direction: KeyDirection) -> &[String] {
        match direction {
            KeyDirection::Down => &self.down,
            KeyDirection::Up => &self.up,
        }
    }
}

/// Parsed `config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundPackManifest {
    pub name: String,
    pub source: String,
    pub license: License,
    pub supports_key_up: bool,
    pub sounds: HashMap<String, KeySounds>,
}

impl SoundPackManifest {
    /// Read `config.json` from a pack directory
    pub fn load(pack_dir: &Path) -> Result<Self, ManifestError> {
        let path = pack_dir.join(MANIFEST_FILE);
        let contents = std::fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        let manifest = Self::from_json(&contents).map_err(|source| ManifestError::Parse {
            path: path.clone(),
            source,
        })?;
        log::info!(
            "Loaded sound pack manifest '{}' ({} keys, key-up: {})",
            manifest.name,
            manifest.sounds.len(),
            manifest.supports_key_up
        );
        Ok(manifest)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Files for `key`, or for the `"default"` entry when `key` has none
    ///
    /// Key-up lookups are empty when the pack does not support key-up sounds.
    pub fn sounds_for(&self, key: &str, direction: KeyDirection) -> &[String] {
        if direction == KeyDirection::Up && !self.supports_key_up {
            return &[];
        }
        self.sounds
            .get(key)
            .or_else(|| self.sounds.get(DEFAULT_KEY))
            .map(|sounds| sounds.for_direction(direction))
            .unwrap_or(&[])
    }

    /// A uniformly random file for `key`
    pub fn pick(&self, key: &str, direction: KeyDirection) -> Option<&str> {
        self.sounds_for(key, direction)
            .choose(&mut rand::rng())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACK: &str = r#"{
        "name": "Test Pack",
        "source": "https://example.com/pack",
        "license": { "type": "CC BY 4.0", "url": "https://creativecommons.org/licenses/by/4.0/" },
        "supportsKeyUp": true,
        "sounds": {
            "default": { "down": ["d1.wav", "d2.wav"], "up": ["u1.wav"] },
            "space": { "down": ["space.wav"], "up": [] }
        }
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = SoundPackManifest::from_json(PACK).unwrap();
        assert_eq!(manifest.name, "Test Pack");
        assert_eq!(manifest.license.kind, "CC BY 4.0");
        assert!(manifest.supports_key_up);
        assert_eq!(manifest.sounds.len(), 2);
    }

    #[test]
    fn test_known_key_uses_own_entry() {
        let manifest = SoundPackManifest::from_json(PACK).unwrap();
        assert_eq!(manifest.sounds_for("space", KeyDirection::Down), ["space.wav"]);
        // An entry that exists but is empty does not fall back
        assert!(manifest.sounds_for("space", KeyDirection::Up).is_empty());
    }

    #[test]
    fn test_unknown_key_falls_back_to_default() {
        let manifest = SoundPackManifest::from_json(PACK).unwrap();
        assert_eq!(manifest.sounds_for("q", KeyDirection::Down).len(), 2);
        assert_eq!(manifest.sounds_for("q", KeyDirection::Up), ["u1.wav"]);
    }

    #[test]
    fn test_no_default_entry_is_empty() {
        let mut manifest = SoundPackManifest::from_json(PACK).unwrap();
        manifest.sounds.remove(DEFAULT_KEY);
        assert!(manifest.sounds_for("q", KeyDirection::Down).is_empty());
        assert!(manifest.pick("q", KeyDirection::Down).is_none());
    }

    #[test]
    fn test_key_up_disabled() {
        let mut manifest = SoundPackManifest::from_json(PACK).unwrap();
        manifest.supports_key_up = false;
        assert!(manifest.pick("q", KeyDirection::Up).is_none());
    }

    #[test]
    fn test_pick_is_from_candidates() {
        let manifest = SoundPackManifest::from_json(PACK).unwrap();
        for _ in 0..50 {
            let file = manifest.pick("x", KeyDirection::Down).unwrap();
            assert!(file == "d1.wav" || file == "d2.wav");
        }
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), PACK).unwrap();
        let manifest = SoundPackManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.name, "Test Pack");
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SoundPackManifest::load(dir.path()),
            Err(ManifestError::Read { .. })
        ));

        std::fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();
        assert!(matches!(
            SoundPackManifest::load(dir.path()),
            Err(ManifestError::Parse { .. })
        ));
    }
}
