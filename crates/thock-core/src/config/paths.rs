//! Standard locations for thock files

use std::path::PathBuf;

fn config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("thock")
}

/// Get the default settings file path
///
/// Returns: `~/.config/thock/config.yaml` (platform equivalent elsewhere)
pub fn default_config_path() -> PathBuf {
    config_root().join("config.yaml")
}

/// Directory searched for sound packs when none is configured
///
/// Returns: `~/.config/thock/packs`
pub fn default_sound_pack_dir() -> PathBuf {
    config_root().join("packs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_ends_with_file_name() {
        let path = default_config_path();
        assert!(path.ends_with("thock/config.yaml"));
    }

    #[test]
    fn test_pack_dir_is_next_to_config() {
        assert_eq!(
            default_sound_pack_dir().parent(),
            default_config_path().parent()
        );
    }
}
