//! Shared state - the fixed-shape snapshot a replica needs to reproduce the
//! primary's view
//!
//! The whole struct is copied by value every tick; there is no dirty
//! tracking and no partial update. Any quantity whose recomputation could
//! diverge between nodes (randomness, float accumulation, input devices)
//! is computed once by the primary and carried here.
//!
//! # Layout
//!
//! `#[repr(C)]` + `bytemuck::Pod` with no implicit padding, so the byte
//! image is identical on every node of the cluster:
//!
//! ```text
//! offset   size   field
//!      0     56   pose
//!     56     32   clocks        [f64; 4]
//!     88     64   scalars       [f32; 16]
//!    152     32   toggles       [u8; 32]   (0 / 1)
//!    184    544   media         [MediaCue; 2]
//!    728      4   element_count
//!    732      4   _reserved
//!    736  14336   elements      [DerivedElement; 512]
//! ```

mod cue;

pub use cue::{AssetName, MediaCue};

use crate::types::{
    ClockId, MediaChannel, Pose, Scalar, Toggle, MAX_ELEMENTS, NUM_CLOCKS, NUM_MEDIA_CHANNELS,
    NUM_SCALARS, NUM_TOGGLES,
};

/// Per-element transient render attributes computed by the primary
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DerivedElement {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Snapshot of everything a replica needs for one frame
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SharedState {
    /// Camera pose; replicas overwrite their local camera with it
    pub pose: Pose,
    /// Playback clock values, indexed by [`ClockId`]
    pub clocks: [f64; NUM_CLOCKS],
    /// Scalar parameters, indexed by [`Scalar`]
    pub scalars: [f32; NUM_SCALARS],
    /// Feature toggles as 0/1 bytes, indexed by [`Toggle`]
    pub toggles: [u8; NUM_TOGGLES],
    /// Asset selection per media channel
    pub media: [MediaCue; NUM_MEDIA_CHANNELS],
    /// Number of valid entries in `elements`
    pub element_count: u32,
    pub _reserved: u32,
    pub elements: [DerivedElement; MAX_ELEMENTS],
}

/// Byte size of the snapshot (agreed by every node)
pub const SHARED_STATE_SIZE: usize = std::mem::size_of::<SharedState>();

const _: () = assert!(SHARED_STATE_SIZE == 15072);

impl Default for SharedState {
    fn default() -> Self {
        let mut state: SharedState = bytemuck::Zeroable::zeroed();
        state.pose = Pose::IDENTITY;
        state.set_scalar(Scalar::BRIGHTNESS, 1.0);
        state.set_scalar(Scalar::BLEND_ACTIVE, 1.0);
        state.set_scalar(Scalar::BLEND_PRELOAD, 1.0);
        state.set_scalar(Scalar::LIGHT_INTENSITY, 0.6);
        state.set_scalar(Scalar::DATA_BLEND, 1.0);
        state.set_toggle(Toggle::GLOBE_LOOP, true);
        state
    }
}

impl SharedState {
    #[inline]
    pub fn toggle(&self, toggle: Toggle) -> bool {
        self.toggles.get(toggle.index()).is_some_and(|&b| b != 0)
    }

    pub fn set_toggle(&mut self, toggle: Toggle, on: bool) {
        if let Some(slot) = self.toggles.get_mut(toggle.index()) {
            *slot = on as u8;
        }
    }

    #[inline]
    pub fn scalar(&self, scalar: Scalar) -> f32 {
        self.scalars.get(scalar.index()).copied().unwrap_or(0.0)
    }

    pub fn set_scalar(&mut self, scalar: Scalar, value: f32) {
        if let Some(slot) = self.scalars.get_mut(scalar.index()) {
            *slot = value;
        }
    }

    #[inline]
    pub fn clock(&self, clock: ClockId) -> f64 {
        self.clocks.get(clock.index()).copied().unwrap_or(0.0)
    }

    pub fn set_clock(&mut self, clock: ClockId, value: f64) {
        if let Some(slot) = self.clocks.get_mut(clock.index()) {
            *slot = value;
        }
    }

    #[inline]
    pub fn cue(&self, channel: MediaChannel) -> &MediaCue {
        &self.media[channel.index()]
    }

    #[inline]
    pub fn cue_mut(&mut self, channel: MediaChannel) -> &mut MediaCue {
        &mut self.media[channel.index()]
    }

    /// Valid derived elements
    pub fn elements(&self) -> &[DerivedElement] {
        let count = (self.element_count as usize).min(MAX_ELEMENTS);
        &self.elements[..count]
    }

    /// Replace the derived elements; anything beyond capacity is dropped
    pub fn set_elements(&mut self, elements: &[DerivedElement]) {
        let count = elements.len().min(MAX_ELEMENTS);
        self.elements[..count].copy_from_slice(&elements[..count]);
        self.elements[count..].fill(DerivedElement::default());
        self.element_count = count as u32;
    }

    /// Byte image for the wire
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Decode a byte image; `None` unless exactly `SHARED_STATE_SIZE` bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytemuck::try_pod_read_unaligned(bytes).ok()
    }
}
