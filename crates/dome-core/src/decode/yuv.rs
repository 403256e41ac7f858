//! RGB → planar YUV 4:2:0 conversion (BT.601, full range)

use rayon::prelude::*;

use super::{Plane, NUM_PLANES};

/// Row alignment of decoded planes in bytes
pub const PLANE_ALIGN: usize = 32;

#[inline]
fn aligned(width: usize) -> usize {
    width.div_ceil(PLANE_ALIGN) * PLANE_ALIGN
}

/// Padded line sizes for a `width` pixel wide picture
pub fn line_sizes(width: u32) -> [usize; NUM_PLANES] {
    let luma = aligned(width as usize);
    let chroma = aligned((width as usize).div_ceil(2));
    [luma, chroma, chroma]
}

#[inline]
fn luma(r: f32, g: f32, b: f32) -> u8 {
    (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
}

#[inline]
fn chroma(r: f32, g: f32, b: f32) -> (u8, u8) {
    let u = -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
    let v = 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;
    (
        u.round().clamp(0.0, 255.0) as u8,
        v.round().clamp(0.0, 255.0) as u8,
    )
}

/// Convert packed RGB8 into `planes`, reusing their storage
///
/// `rgb` must hold `width * height * 3` bytes. Planes are reshaped to the
/// padded line sizes if needed. Chroma is the average of each 2x2 block.
pub fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32, planes: &mut [Plane; NUM_PLANES]) {
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 || rgb.len() < w * h * 3 {
        return;
    }
    let sizes = line_sizes(width);
    let rows = [h, h.div_ceil(2), h.div_ceil(2)];
    for (index, plane) in planes.iter_mut().enumerate() {
        if plane.stride != sizes[index] || plane.rows != rows[index] {
            *plane = Plane::zeroed(sizes[index], rows[index]);
        }
    }

    let row_bytes = w * 3;
    let [y_plane, u_plane, v_plane] = planes;

    y_plane
        .data
        .par_chunks_mut(sizes[0])
        .zip(rgb.par_chunks(row_bytes))
        .for_each(|(out, src)| {
            for (x, px) in src.chunks_exact(3).enumerate() {
                out[x] = luma(px[0] as f32, px[1] as f32, px[2] as f32);
            }
        });

    let chroma_width = w.div_ceil(2);
    u_plane
        .data
        .par_chunks_mut(sizes[1])
        .zip(v_plane.data.par_chunks_mut(sizes[2]))
        .enumerate()
        .for_each(|(cy, (u_row, v_row))| {
            let y0 = cy * 2;
            let y1 = (y0 + 1).min(h - 1);
            for cx in 0..chroma_width {
                let x0 = cx * 2;
                let x1 = (x0 + 1).min(w - 1);
                let mut sum = [0f32; 3];
                for (x, y) in [(x0, y0), (x1, y0), (x0, y1), (x1, y1)] {
                    let at = y * row_bytes + x * 3;
                    sum[0] += rgb[at] as f32;
                    sum[1] += rgb[at + 1] as f32;
                    sum[2] += rgb[at + 2] as f32;
                }
                let (u, v) = chroma(sum[0] / 4.0, sum[1] / 4.0, sum[2] / 4.0);
                u_row[cx] = u;
                v_row[cx] = v;
            }
        });
}
