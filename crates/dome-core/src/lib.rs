//! Dome Core - replicated frame state and clock-driven media playback for
//! clustered dome projection nodes

pub mod clock;
pub mod config;
pub mod control;
pub mod dataset;
pub mod decode;
pub mod elements;
pub mod error;
pub mod media;
pub mod navigation;
pub mod replication;
pub mod role;
pub mod state;
pub mod tick;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use types::*;
pub use clock::PlaybackClock;
pub use role::{PrimaryAuthority, RoleCoordinator, RoleSources};
pub use state::{AssetName, DerivedElement, MediaCue, SharedState};
pub use tick::{FrameTick, PrimaryInputs, RenderFrame, RenderSink};
