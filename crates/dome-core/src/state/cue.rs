//! Media cues - which assets every node must have loaded
//!
//! Decoding happens locally on each node, so the primary publishes the
//! asset selection and the load/preload/swap triggers. Triggers are
//! generation counters: a node acts whenever a counter differs from the
//! last one it acted on, so a skipped snapshot never loses a trigger's
//! final effect.

use crate::types::ASSET_NAME_LEN;

/// Fixed-size, NUL-padded UTF-8 asset identifier
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AssetName {
    bytes: [u8; ASSET_NAME_LEN],
}

impl AssetName {
    /// The empty name (no asset)
    pub const EMPTY: AssetName = AssetName {
        bytes: [0; ASSET_NAME_LEN],
    };

    /// Encode `name`; `None` if it is longer than the fixed capacity or
    /// contains a NUL byte
    pub fn new(name: &str) -> Option<Self> {
        let raw = name.as_bytes();
        if raw.len() > ASSET_NAME_LEN || raw.contains(&0) {
            return None;
        }
        let mut bytes = [0u8; ASSET_NAME_LEN];
        bytes[..raw.len()].copy_from_slice(raw);
        Some(Self { bytes })
    }

    /// Decoded name; invalid UTF-8 from a foreign sender decodes as empty
    pub fn as_str(&self) -> &str {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(ASSET_NAME_LEN);
        std::str::from_utf8(&self.bytes[..end]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl Default for AssetName {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for AssetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AssetName({:?})", self.as_str())
    }
}

/// Asset selection and triggers of one media channel
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MediaCue {
    /// Asset in the active slot
    pub asset: AssetName,
    /// Asset being preloaded into the inactive slot
    pub preload: AssetName,
    /// Bumped on every simple-replace load
    pub load_generation: u32,
    /// Bumped on every preload request
    pub preload_generation: u32,
    /// Bumped on every swap
    pub swap_generation: u32,
    pub _reserved: u32,
}

impl MediaCue {
    /// Simple replace: the active slot reloads `asset` (even if unchanged)
    pub fn request_load(&mut self, asset: AssetName) {
        self.asset = asset;
        self.load_generation = self.load_generation.wrapping_add(1);
    }

    /// Start preloading `asset` into the inactive slot
    pub fn request_preload(&mut self, asset: AssetName) {
        self.preload = asset;
        self.preload_generation = self.preload_generation.wrapping_add(1);
    }

    /// Promote the preloaded asset to active
    pub fn request_swap(&mut self) {
        self.asset = self.preload;
        self.preload = AssetName::EMPTY;
        self.swap_generation = self.swap_generation.wrapping_add(1);
    }

    /// Stop the channel: the active slot is discarded
    pub fn request_unload(&mut self) {
        self.request_load(AssetName::EMPTY);
    }
}
