//! Base64 PNG payloads.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbImage};

use crate::normalize::ValidationError;

/// Decode a base64 image, accepting an optional `data:...;base64,` prefix.
///
/// # Errors
///
/// Returns [`ValidationError::Base64`] or [`ValidationError::Decode`] when
/// the payload is not valid base64 or not a decodable image.
pub fn decode_image(what: &'static str, payload: &str) -> Result<DynamicImage, ValidationError> {
    let data = match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    };
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|source| ValidationError::Base64 { what, source })?;
    image::load_from_memory(&bytes).map_err(|source| ValidationError::Decode { what, source })
}

/// Encode an image as base64 PNG.
///
/// # Errors
///
/// Returns an error if PNG encoding fails.
pub fn encode_png(image: &RgbImage) -> Result<String, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(STANDARD.encode(buf.get_ref()))
}
