//! YAML config loading and saving

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Where a loaded config came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Parsed from the file
    File,
    /// No file; defaults used
    Defaults,
    /// The file could not be read or parsed; defaults used
    Invalid(String),
}

/// Load a YAML config, falling back to `T::default()`
///
/// A missing file is normal (first start). An unreadable or malformed file
/// is logged as a warning; the node still starts with defaults and the
/// origin tells the caller what happened.
pub fn load_config<T>(path: &Path) -> (T, ConfigOrigin)
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("[CONFIG] {:?} not found, using defaults", path);
        return (T::default(), ConfigOrigin::Defaults);
    }

    let parsed = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))
        .and_then(|contents| {
            serde_yaml::from_str::<T>(&contents).with_context(|| format!("Failed to parse {:?}", path))
        });

    match parsed {
        Ok(config) => {
            log::info!("[CONFIG] Loaded {:?}", path);
            (config, ConfigOrigin::File)
        }
        Err(e) => {
            let reason = format!("{:#}", e);
            log::warn!("[CONFIG] {}, using defaults", reason);
            (T::default(), ConfigOrigin::Invalid(reason))
        }
    }
}

/// Write a config as YAML, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write {:?}", path))?;
    log::info!("[CONFIG] Saved {:?}", path);
    Ok(())
}
