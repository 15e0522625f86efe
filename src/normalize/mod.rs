//! Image and mask normalization.
//!
//! Every request passes through this module before anything is hashed or
//! handed to the engine, so that semantically identical inputs always end up
//! as identical pixel buffers.
//!
//! # Architecture
//!
//! - [`color`]: Canonical color modes (RGB for images, 8-bit luma for masks)
//! - [`resize`]: Model-friendly geometry (bounded, multiples of 8)
//! - [`mask`]: Feather (Gaussian blur) and expand (square dilation)
//!
//! [`prepare`] runs the full pipeline in the fixed order the cache key
//! depends on: color normalization, feather, expand, resize.
//!
//! # Example
//!
//! ```no_run
//! use inpaint_cache::normalize::{prepare, MaskOps};
//!
//! let image = image::open("frame.png").unwrap();
//! let mask = image::open("mask.png").unwrap();
//!
//! let prepared = prepare(&image, &mask, MaskOps { feather: 4, expand: 2 }, 1024).unwrap();
//! assert_eq!(prepared.image.dimensions(), prepared.mask.dimensions());
//! ```

pub mod color;
pub mod mask;
pub mod resize;

use image::{DynamicImage, GrayImage, RgbImage};

pub use color::{normalize_image, normalize_mask};
pub use mask::{expand, feather};
pub use resize::{resize_for_model, resize_to, target_dimensions, MODEL_STRIDE};

/// Errors raised for malformed or unusable inputs.
///
/// These are never retried: the same input always fails the same way.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    /// The payload could not be decoded as an image.
    #[error("Failed to decode {what}: {source}")]
    Decode {
        /// Which input failed ("image" or "mask")
        what: &'static str,
        /// Underlying decoder error
        #[source]
        source: image::ImageError,
    },

    /// The payload was not valid base64.
    #[error("Invalid base64 in {what}: {source}")]
    Base64 {
        /// Which input failed ("image" or "mask")
        what: &'static str,
        /// Underlying base64 error
        #[source]
        source: base64::DecodeError,
    },

    /// The input image has no pixels.
    #[error("{what} is empty ({width}x{height})")]
    Empty {
        /// Which input failed ("image" or "mask")
        what: &'static str,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },

    /// Resizing would collapse a dimension to zero.
    #[error(
        "Image {width}x{height} cannot be resized for the model: a dimension would round to zero (bound {max_dimension})"
    )]
    ZeroDimension {
        /// Source width
        width: u32,
        /// Source height
        height: u32,
        /// Maximum dimension in effect
        max_dimension: u32,
    },

    /// A numeric parameter fell outside its accepted range.
    #[error("{field} = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Parameter name
        field: &'static str,
        /// Rejected value, formatted
        value: String,
        /// Inclusive lower bound, formatted
        min: String,
        /// Inclusive upper bound, formatted
        max: String,
    },
}

/// Mask post-processing requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskOps {
    /// Gaussian blur radius in pixels (0 disables).
    pub feather: u32,
    /// Dilation radius in pixels (0 disables).
    pub expand: u32,
}

/// Inputs after the full normalization pipeline.
#[derive(Debug, Clone)]
pub struct PreparedInputs {
    /// RGB image at model geometry.
    pub image: RgbImage,
    /// Single-channel mask with the same dimensions as `image`.
    pub mask: GrayImage,
    /// Dimensions of the image as supplied, before resizing.
    pub original_size: (u32, u32),
}

/// Normalize an image/mask pair into model-ready buffers.
///
/// Feather runs before expand; expand then operates on the intensities
/// feather introduced. The mask is processed at its own resolution and only
/// then resampled to the resized image's dimensions.
///
/// # Errors
///
/// Returns [`ValidationError`] if either input is empty or the image cannot
/// be resized without collapsing a dimension.
pub fn prepare(
    image: &DynamicImage,
    mask: &DynamicImage,
    ops: MaskOps,
    max_dimension: u32,
) -> Result<PreparedInputs, ValidationError> {
    ensure_not_empty("image", image)?;
    ensure_not_empty("mask", mask)?;

    let rgb = normalize_image(image);
    let original_size = rgb.dimensions();

    let gray = normalize_mask(mask);
    let gray = feather(gray, ops.feather);
    let gray = expand(gray, ops.expand);

    let rgb = resize_for_model(rgb, max_dimension)?;
    let (width, height) = rgb.dimensions();
    let gray = if gray.dimensions() == (width, height) {
        gray
    } else {
        resize_to(&gray, width, height, image::imageops::FilterType::CatmullRom)
    };

    log::trace!(
        "Prepared inputs: {}x{} -> {}x{} (feather {}, expand {})",
        original_size.0,
        original_size.1,
        width,
        height,
        ops.feather,
        ops.expand
    );

    Ok(PreparedInputs {
        image: rgb,
        mask: gray,
        original_size,
    })
}

fn ensure_not_empty(what: &'static str, image: &DynamicImage) -> Result<(), ValidationError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ValidationError::Empty {
            what,
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(())
}
