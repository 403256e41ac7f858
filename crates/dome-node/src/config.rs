//! Node configuration for dome-node
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/dome-node/config.yaml

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use dome_core::dataset::DatasetConfig;
use dome_core::error::{ConfigError, ConfigResult};
use dome_core::media::SwapMode;
use dome_core::Role;

/// Default replication port
pub const DEFAULT_PORT: u16 = 7400;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Fixed role of this node; CLI flags override it
    pub role: Option<Role>,
    /// Alternative to `role`: the node with this hostname is the primary
    pub primary_hostname: Option<String>,
    pub network: NetworkConfig,
    pub display: DisplayConfig,
    pub media: MediaConfig,
    pub dataset: DatasetConfig,
}

/// Replication transport section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local address the socket binds to
    pub bind: String,
    /// Replica addresses (primary) or the broadcast address
    pub targets: Vec<String>,
    pub broadcast: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{}", DEFAULT_PORT),
            targets: vec![format!("255.255.255.255:{}", DEFAULT_PORT)],
            broadcast: true,
        }
    }
}

/// Display section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Frame loop rate in Hz
    pub frame_rate: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { frame_rate: 60.0 }
    }
}

/// Media section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Media root on the control machine
    pub root: PathBuf,
    /// Media root on renderer machines, when mounted elsewhere
    pub replica_root: Option<PathBuf>,
    /// Playback rate of image-sequence assets
    pub sequence_fps: f64,
    pub swap_mode: SwapMode,
    /// Named triggers → panorama asset ids
    pub presets: BTreeMap<String, String>,
    /// Looping globe asset started at boot
    pub data_video: Option<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: dome_core::config::default_media_root(),
            replica_root: None,
            sequence_fps: 30.0,
            swap_mode: SwapMode::default(),
            presets: BTreeMap::new(),
            data_video: None,
        }
    }
}

impl MediaConfig {
    /// Media root to resolve assets against on a node with `role`
    pub fn root_for(&self, role: Role) -> &PathBuf {
        match (role, &self.replica_root) {
            (Role::Replica, Some(root)) => root,
            _ => &self.root,
        }
    }
}

impl NodeConfig {
    /// Reject values the frame loop cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        let rate = self.display.frame_rate;
        if !rate.is_finite() || rate <= 0.0 || rate > 1000.0 {
            return Err(ConfigError::InvalidValue {
                field: "display.frame_rate",
                reason: format!("{} is not in (0, 1000] Hz", rate),
            });
        }
        let fps = self.media.sequence_fps;
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "media.sequence_fps",
                reason: format!("{} must be positive", fps),
            });
        }
        let years = &self.dataset;
        if years.last_year <= years.first_year {
            return Err(ConfigError::InvalidValue {
                field: "dataset.last_year",
                reason: format!(
                    "{} must be after first_year {}",
                    years.last_year, years.first_year
                ),
            });
        }
        if self.network.bind.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "network.bind",
                reason: "empty address".to_string(),
            });
        }
        Ok(())
    }
}
