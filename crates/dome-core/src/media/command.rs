//! Media commands accepted by the primary

use crate::state::AssetName;

/// Operator request for one media channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaCommand {
    /// Simple replace: discard the active slot and load the asset
    Load(AssetName),
    /// Load the asset into the inactive slot while the active one plays
    Preload(AssetName),
    /// Promote the preloaded slot (rejected until it is ready)
    Swap,
    /// Discard the active slot
    Unload,
    Play,
    Pause,
    SetLooping(bool),
    /// Jump the channel clock back to its loop target
    Rewind,
}

impl MediaCommand {
    pub fn name(&self) -> &'static str {
        match self {
            MediaCommand::Load(_) => "load",
            MediaCommand::Preload(_) => "preload",
            MediaCommand::Swap => "swap",
            MediaCommand::Unload => "unload",
            MediaCommand::Play => "play",
            MediaCommand::Pause => "pause",
            MediaCommand::SetLooping(_) => "loop",
            MediaCommand::Rewind => "rewind",
        }
    }
}
