//! Decoding - the boundary to the media decoder and the per-slot state
//! machine built on top of it
//!
//! The decoder is an external collaborator reached through [`VideoDecoder`].
//! All calls are non-blocking polls: the core never waits for a frame.
//!
//! Pictures are planar (one single-channel buffer per Y/U/V plane). Plane
//! buffers are allocated from the decoder-reported line size, which is
//! often larger than the logical width because codecs pad rows.

mod buffers;
mod sequence;
mod slot;
mod yuv;

pub use buffers::{PictureBuffers, SubmitError};
pub use sequence::{ImageSequenceDecoder, SequenceDecoderFactory};
pub use slot::{DecodeSlot, FetchOutcome, SlotState};
pub use yuv::{rgb_to_yuv420, PLANE_ALIGN};

use std::path::Path;

use crate::error::DecodeResult;

/// Number of planes per picture (Y, U, V)
pub const NUM_PLANES: usize = 3;

/// Stream geometry reported by a started decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamGeometry {
    /// Logical picture width in pixels
    pub width: u32,
    /// Logical picture height in pixels
    pub height: u32,
    /// Bytes per row of each plane (padded, >= logical plane width)
    pub line_sizes: [usize; NUM_PLANES],
}

impl StreamGeometry {
    /// Rows of `plane`; chroma planes are vertically subsampled (4:2:0)
    pub fn plane_rows(&self, plane: usize) -> usize {
        let height = self.height as usize;
        if plane == 0 {
            height
        } else {
            height.div_ceil(2)
        }
    }

    /// Byte length of `plane`
    pub fn plane_len(&self, plane: usize) -> usize {
        self.line_sizes[plane] * self.plane_rows(plane)
    }
}

/// One single-channel plane of a picture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plane {
    /// Bytes per row (padded line size)
    pub stride: usize,
    /// Number of rows
    pub rows: usize,
    pub data: Vec<u8>,
}

impl Plane {
    pub fn zeroed(stride: usize, rows: usize) -> Self {
        Self {
            stride,
            rows,
            data: vec![0; stride * rows],
        }
    }

    /// Bytes the plane must hold for its stride and row count
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.stride * self.rows
    }
}

/// A decoded picture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Picture {
    pub planes: [Plane; NUM_PLANES],
    /// Presentation time in seconds
    pub timestamp: f64,
}

/// External media decoder
///
/// Mirrors the decode component the installation drives: open a file,
/// start background decoding, then poll for the picture matching a clock
/// position. `picture_for` must never block.
pub trait VideoDecoder {
    /// Open `path`; an error leaves the decoder unusable
    fn load(&mut self, path: &Path) -> DecodeResult<()>;

    /// Enable or disable audio decoding
    fn enable_audio(&mut self, enabled: bool);

    /// Configure loop mode
    fn set_looping(&mut self, looping: bool);

    /// Begin decoding (possibly on a background thread)
    fn start(&mut self);

    /// Stop decoding and release background resources
    fn stop(&mut self);

    /// Reposition the stream to `time` seconds
    fn seek(&mut self, time: f64);

    /// The stream has no more pictures at or after the last requested time
    fn finished(&self) -> bool;

    fn is_looping(&self) -> bool;

    /// Picture to show at clock position `time`, if one is ready
    fn picture_for(&mut self, time: f64) -> Option<&Picture>;

    /// The last picture returned has been copied out; its storage may be
    /// reused
    fn picture_consumed(&mut self);

    /// Geometry of the started stream; `None` until decoding has started
    fn geometry(&self) -> Option<StreamGeometry>;
}

/// Creates a fresh decoder for every load
pub trait DecoderFactory: Send + Sync {
    fn create(&self) -> Box<dyn VideoDecoder>;
}

impl<F> DecoderFactory for F
where
    F: Fn() -> Box<dyn VideoDecoder> + Send + Sync,
{
    fn create(&self) -> Box<dyn VideoDecoder> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_plane_sizes() {
        let geometry = StreamGeometry {
            width: 1918,
            height: 1081,
            line_sizes: [1920, 960, 960],
        };
        assert_eq!(geometry.plane_rows(0), 1081);
        assert_eq!(geometry.plane_rows(1), 541);
        assert_eq!(geometry.plane_len(0), 1920 * 1081);
        assert_eq!(geometry.plane_len(2), 960 * 541);
    }
}
