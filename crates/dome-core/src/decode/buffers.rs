//! Output picture buffers of a decode slot
//!
//! The render boundary sees three planes that are always from the same
//! picture. `submit` validates every plane before touching any of them, so
//! a bad picture leaves the previous complete picture in place.

use thiserror::Error;

use super::{Picture, Plane, StreamGeometry, NUM_PLANES};

/// Why a picture was rejected
#[derive(Error, Debug, PartialEq)]
pub enum SubmitError {
    /// A plane has no rows or no stride
    #[error("Plane {0} is empty")]
    EmptyPlane(usize),

    /// A plane holds fewer bytes than stride * rows
    #[error("Plane {plane} holds {got} bytes, expected {expected}")]
    ShortPlane {
        plane: usize,
        got: usize,
        expected: usize,
    },
}

/// Y/U/V buffers updated in lockstep
#[derive(Debug, Default)]
pub struct PictureBuffers {
    planes: [Plane; NUM_PLANES],
    /// Number of complete pictures submitted
    generation: u64,
    timestamp: f64,
}

impl PictureBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate all planes for a stream (zero filled)
    ///
    /// Uses the decoder-reported line sizes, not the logical width.
    pub fn allocate(&mut self, geometry: &StreamGeometry) {
        for (index, plane) in self.planes.iter_mut().enumerate() {
            *plane = Plane::zeroed(geometry.line_sizes[index], geometry.plane_rows(index));
        }
        log::debug!(
            "[DECODE] Allocated picture buffers {}x{} (line sizes {:?})",
            geometry.width,
            geometry.height,
            geometry.line_sizes
        );
    }

    pub fn is_allocated(&self) -> bool {
        self.planes.iter().all(|p| !p.data.is_empty())
    }

    /// Copy a complete picture into the buffers
    ///
    /// All planes are validated first; on error nothing is modified. If the
    /// picture's plane shapes differ from the current allocation, every
    /// plane is reallocated together.
    pub fn submit(&mut self, picture: &Picture) -> Result<(), SubmitError> {
        for (index, plane) in picture.planes.iter().enumerate() {
            if plane.stride == 0 || plane.rows == 0 {
                return Err(SubmitError::EmptyPlane(index));
            }
            let expected = plane.expected_len();
            if plane.data.len() < expected {
                return Err(SubmitError::ShortPlane {
                    plane: index,
                    got: plane.data.len(),
                    expected,
                });
            }
        }

        let reshaped = self
            .planes
            .iter()
            .zip(picture.planes.iter())
            .any(|(own, new)| own.stride != new.stride || own.rows != new.rows);
        if reshaped {
            log::debug!("[DECODE] Picture shape changed, reallocating all planes");
            for (own, new) in self.planes.iter_mut().zip(picture.planes.iter()) {
                *own = Plane::zeroed(new.stride, new.rows);
            }
        }

        for (own, new) in self.planes.iter_mut().zip(picture.planes.iter()) {
            let len = own.expected_len();
            own.data[..len].copy_from_slice(&new.data[..len]);
        }
        self.timestamp = picture.timestamp;
        self.generation += 1;
        Ok(())
    }

    #[inline]
    pub fn planes(&self) -> &[Plane; NUM_PLANES] {
        &self.planes
    }

    /// Increments once per complete picture; renderers re-upload on change
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Presentation time of the current picture
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
}
