//! Content-derived cache keys.
//!
//! A key is `<prefix>_<hex>`, where `<hex>` is the first
//! [`KEY_HEX_LEN`] hex digits of a BLAKE3 digest over, in this order:
//! the normalized image, the normalized mask, the prompt and the canonical
//! parameter bytes. Each segment is length-prefixed, and pixel segments carry
//! their dimensions, so different splits or geometries of the same raw bytes
//! never hash alike.

use std::fmt;

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Number of hex digits kept from the digest (64 bits).
pub const KEY_HEX_LEN: usize = 16;

/// Default key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "inpaint";

/// Opaque, filesystem-safe cache identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// The full key string, used as the file name stem.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hex digest part of the key.
    #[must_use]
    pub fn digest(&self) -> &str {
        self.0.rsplit('_').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns true if `s` may be used verbatim inside a file name.
#[must_use]
pub fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Derives [`CacheKey`]s from normalized request content.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    prefix: String,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl ContentHasher {
    /// Create a hasher that emits keys with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The key prefix in use.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Compute the key for one request.
    ///
    /// # Examples
    ///
    /// ```
    /// use image::{GrayImage, RgbImage};
    /// use inpaint_cache::cache::ContentHasher;
    ///
    /// let hasher = ContentHasher::default();
    /// let image = RgbImage::new(8, 8);
    /// let mask = GrayImage::new(8, 8);
    ///
    /// let a = hasher.compute_key(&image, &mask, "sky", b"{}");
    /// let b = hasher.compute_key(&image.clone(), &mask.clone(), "sky", b"{}");
    /// assert_eq!(a, b);
    /// assert!(a.as_str().starts_with("inpaint_"));
    /// assert_ne!(a, hasher.compute_key(&image, &mask, "sea", b"{}"));
    /// ```
    #[must_use]
    pub fn compute_key(
        &self,
        image: &RgbImage,
        mask: &GrayImage,
        prompt: &str,
        canonical_params: &[u8],
    ) -> CacheKey {
        let mut hasher = blake3::Hasher::new();
        update_pixels(&mut hasher, image.width(), image.height(), 3, image.as_raw());
        update_pixels(&mut hasher, mask.width(), mask.height(), 1, mask.as_raw());
        update_segment(&mut hasher, prompt.as_bytes());
        update_segment(&mut hasher, canonical_params);

        let hex = hasher.finalize().to_hex();
        let key = CacheKey(format!("{}_{}", self.prefix, &hex.as_str()[..KEY_HEX_LEN]));
        log::debug!("Derived cache key {}", key);
        key
    }
}

fn update_pixels(hasher: &mut blake3::Hasher, width: u32, height: u32, channels: u8, raw: &[u8]) {
    hasher.update(&width.to_le_bytes());
    hasher.update(&height.to_le_bytes());
    hasher.update(&[channels]);
    update_segment(hasher, raw);
}

fn update_segment(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
