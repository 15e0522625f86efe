//! Mask feathering and expansion.
//!
//! Masks use 255 for "regenerate" and 0 for "preserve"; anything in between
//! is a partial blend weight.

use image::imageops;
use image::GrayImage;

/// Soften the mask boundary with a Gaussian blur of the given radius.
///
/// A radius of 0 returns the mask unchanged.
#[must_use]
pub fn feather(mask: GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask;
    }
    imageops::blur(&mask, radius as f32)
}

/// Grow the masked region by `radius` pixels in every direction.
///
/// Equivalent pixel-for-pixel to `radius` successive 3x3 maximum filters
/// with edge replication, computed as one separable square dilation.
/// A radius of 0 returns the mask unchanged.
#[must_use]
pub fn expand(mask: GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask;
    }
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let r = radius as usize;
    let src = mask.as_raw();

    let mut rows = vec![0u8; w * h];
    for y in 0..h {
        let line = &src[y * w..(y + 1) * w];
        for x in 0..w {
            rows[y * w + x] = window_max(line, x, r);
        }
    }

    let mut out = vec![0u8; w * h];
    let mut column = vec![0u8; h];
    for x in 0..w {
        for (y, slot) in column.iter_mut().enumerate() {
            *slot = rows[y * w + x];
        }
        for y in 0..h {
            out[y * w + x] = window_max(&column, y, r);
        }
    }

    GrayImage::from_raw(width, height, out).unwrap_or(mask)
}

/// Maximum of `line[center - r ..= center + r]`, clamped to the line.
fn window_max(line: &[u8], center: usize, r: usize) -> u8 {
    let lo = center.saturating_sub(r);
    let hi = (center + r).min(line.len() - 1);
    line[lo..=hi].iter().copied().max().unwrap_or(0)
}
