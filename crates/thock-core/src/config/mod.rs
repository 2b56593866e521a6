//! Persisted engine settings
//!
//! The engine never reads or writes settings itself; front ends load an
//! [`EngineSettings`] and apply it through the [`AudioEngine`] API.
//!
//! ```ignore
//! use thock_core::config::{load_config, save_config, default_config_path, EngineSettings};
//!
//! let path = default_config_path();
//! let settings: EngineSettings = load_config(&path);
//! save_config(&settings, &path)?;
//! ```
//!
//! [`AudioEngine`]: crate::engine::AudioEngine

mod io;
mod paths;
mod settings;

pub use io::{load_config, save_config};
pub use paths::{default_config_path, default_sound_pack_dir};
pub use settings::EngineSettings;
