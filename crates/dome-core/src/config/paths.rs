//! Standard locations of dome files

use std::path::PathBuf;

const APP_DIR: &str = "dome-node";

/// `~/.config/dome-node` (platform config dir), or `./dome-node` without one
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// `<config dir>/config.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

/// `~/dome/media`, used when the config names no media root
pub fn default_media_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dome")
        .join("media")
}
