//! Operator control queue (primary only)
//!
//! Input threads (console, network control surface) push [`ControlEvent`]s
//! into a bounded lock-free `rtrb` queue; the primary's frame tick drains it
//! at the start of every frame. Pushing never blocks the input thread and
//! popping never blocks the frame.

use std::collections::HashMap;

use crate::media::MediaCommand;
use crate::navigation::GeoLocation;
use crate::state::AssetName;
use crate::types::{MediaChannel, Pose, Scalar, Toggle};

/// Capacity of the control queue
///
/// Presets and startup can push a burst of events in one frame; operator
/// typing never comes close.
pub const CONTROL_QUEUE_CAPACITY: usize = 256;

/// One operator request applied by the primary's frame tick
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    SetToggle { toggle: Toggle, on: bool },
    SetScalar { scalar: Scalar, value: f32 },
    Media { channel: MediaChannel, command: MediaCommand },
    /// Morph the camera to a geo-location
    FlyTo(GeoLocation),
    /// Place the camera directly
    SetPose(Pose),
    /// Trigger a named preset from the preset table
    Preset(String),
}

/// Create a control queue (producer for input, consumer for the frame tick)
pub fn control_channel() -> (rtrb::Producer<ControlEvent>, rtrb::Consumer<ControlEvent>) {
    rtrb::RingBuffer::new(CONTROL_QUEUE_CAPACITY)
}

/// Named triggers that load a panorama asset
#[derive(Debug, Clone, Default)]
pub struct PresetTable {
    presets: HashMap<String, AssetName>,
}

impl PresetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `name → asset` pairs; names whose asset id does not fit
    /// are skipped with a warning
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut table = Self::new();
        for (name, asset) in pairs {
            match AssetName::new(asset) {
                Some(asset) => {
                    table.presets.insert(name.to_string(), asset);
                }
                None => log::warn!("[CONTROL] Preset '{}' has an invalid asset id '{}'", name, asset),
            }
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<AssetName> {
        self.presets.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
