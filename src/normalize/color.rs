//! Color mode normalization.
//!
//! Images become 3-channel RGB, masks become 8-bit single-channel intensity.
//! Transparency is never dropped naively: an image's alpha is flattened onto
//! opaque white, and a mask's alpha scales its intensity so that transparent
//! regions read as "preserve".

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// Convert any image encoding to RGB, compositing transparency onto white.
#[must_use]
pub fn normalize_image(image: &DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other if other.color().has_alpha() => flatten_onto_white(other),
        other => other.to_rgb8(),
    }
}

/// Convert any mask encoding to single-channel intensity.
///
/// Gray levels are kept as-is; no thresholding happens here.
#[must_use]
pub fn normalize_mask(mask: &DynamicImage) -> GrayImage {
    match mask {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other if other.color().has_alpha() => {
            let luma_alpha = other.to_luma_alpha8();
            let (width, height) = luma_alpha.dimensions();
            GrayImage::from_fn(width, height, |x, y| {
                let [value, alpha] = luma_alpha.get_pixel(x, y).0;
                Luma([scale(value, alpha)])
            })
        }
        other => other.to_luma8(),
    }
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([blend_white(r, a), blend_white(g, a), blend_white(b, a)])
    })
}

/// `value * alpha + 255 * (1 - alpha)`, rounded.
fn blend_white(value: u8, alpha: u8) -> u8 {
    let value = u32::from(value);
    let alpha = u32::from(alpha);
    ((value * alpha + 255 * (255 - alpha) + 127) / 255) as u8
}

/// `value * alpha`, rounded.
fn scale(value: u8, alpha: u8) -> u8 {
    ((u32::from(value) * u32::from(alpha) + 127) / 255) as u8
}
