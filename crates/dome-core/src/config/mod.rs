//! Configuration file helpers shared by dome binaries
//!
//! Node-specific settings live with the binary; this module only knows how
//! to find, read and write YAML files.

mod io;
mod paths;

pub use io::{load_config, save_config, ConfigOrigin};
pub use paths::{default_config_dir, default_config_path, default_media_root};
