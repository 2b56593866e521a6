//! Reading and writing the settings file
//!
//! Only the front end touches this file. A missing file is the normal first
//! run, and a file the current build cannot parse (hand edits, an older
//! layout) must not stop the keyboard from clicking, so both fall back to
//! defaults. Saves go through a sibling temp file and a rename, so a crash
//! in the middle of `:save` leaves the previous settings intact.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read settings from `path`, or defaults when it is absent or unreadable
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("No settings at {}, using defaults", path.display());
            return T::default();
        }
        Err(e) => {
            log::warn!("Cannot read settings {}: {}, using defaults", path.display(), e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(settings) => {
            log::info!("Loaded settings from {}", path.display());
            settings
        }
        Err(e) => {
            log::warn!("Ignoring invalid settings {}: {}", path.display(), e);
            T::default()
        }
    }
}

/// Write settings to `path`, replacing any previous file in one step
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create settings directory {}", parent.display()))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize settings")?;

    let staging = staging_path(path);
    std::fs::write(&staging, yaml)
        .with_context(|| format!("Failed to write {}", staging.display()))?;
    if let Err(e) = std::fs::rename(&staging, path) {
        let _ = std::fs::remove_file(&staging);
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }

    log::info!("Saved settings to {}", path.display());
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
