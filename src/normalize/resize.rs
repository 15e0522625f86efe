//! Model-friendly image geometry.
//!
//! The engine works on tensors whose spatial stride is 8, so both dimensions
//! must be multiples of [`MODEL_STRIDE`], and neither may exceed the
//! configured bound.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel};

use super::ValidationError;

/// Spatial stride required by the engine.
pub const MODEL_STRIDE: u32 = 8;

/// Compute the dimensions an image of `width`x`height` is resized to.
///
/// Within the bound, each dimension is only rounded down to a multiple of 8.
/// Above it, the image is scaled so that the larger side equals the bound
/// (aspect ratio preserved) and then rounded down the same way.
///
/// # Errors
///
/// Returns [`ValidationError::ZeroDimension`] when a side would round to zero.
///
/// # Examples
///
/// ```
/// use inpaint_cache::normalize::target_dimensions;
///
/// assert_eq!(target_dimensions(1001, 767, 1024).unwrap(), (1000, 760));
/// assert_eq!(target_dimensions(2048, 1536, 1024).unwrap(), (1024, 768));
/// assert!(target_dimensions(7, 512, 1024).is_err());
/// ```
pub fn target_dimensions(
    width: u32,
    height: u32,
    max_dimension: u32,
) -> Result<(u32, u32), ValidationError> {
    let (scaled_w, scaled_h) = if width <= max_dimension && height <= max_dimension {
        (width, height)
    } else if width >= height {
        (max_dimension, scale_side(height, max_dimension, width))
    } else {
        (scale_side(width, max_dimension, height), max_dimension)
    };

    let new_w = round_to_stride(scaled_w);
    let new_h = round_to_stride(scaled_h);
    if new_w == 0 || new_h == 0 {
        return Err(ValidationError::ZeroDimension {
            width,
            height,
            max_dimension,
        });
    }
    Ok((new_w, new_h))
}

/// `side * numerator / denominator`, truncated, without float rounding drift.
fn scale_side(side: u32, numerator: u32, denominator: u32) -> u32 {
    (u64::from(side) * u64::from(numerator) / u64::from(denominator)) as u32
}

fn round_to_stride(value: u32) -> u32 {
    (value / MODEL_STRIDE) * MODEL_STRIDE
}

/// Resize an image to model geometry, returning it untouched when no change
/// is needed. Resampling uses Lanczos3.
///
/// # Errors
///
/// Propagates [`ValidationError::ZeroDimension`] from [`target_dimensions`].
pub fn resize_for_model<P>(
    image: ImageBuffer<P, Vec<P::Subpixel>>,
    max_dimension: u32,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>, ValidationError>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let (width, height) = image.dimensions();
    let (new_w, new_h) = target_dimensions(width, height, max_dimension)?;
    if (new_w, new_h) == (width, height) {
        return Ok(image);
    }
    log::debug!("Resizing {}x{} -> {}x{}", width, height, new_w, new_h);
    Ok(resize_to(&image, new_w, new_h, FilterType::Lanczos3))
}

/// Resample an image to exact dimensions with the given filter.
#[must_use]
pub fn resize_to<P>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
    filter: FilterType,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    imageops::resize(image, width, height, filter)
}
