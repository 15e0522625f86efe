//! JSON request and response bundles.
//!
//! These mirror what a transport layer receives and returns: images travel
//! as base64 PNG, numeric fields carry defaults, and the optional
//! `cache_dir` selects the project whose cache to use.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::normalize::ValidationError;
use crate::params::{
    InpaintParams, DEFAULT_CONTROLNET_SCALE, DEFAULT_GUIDANCE_SCALE, DEFAULT_STEPS,
    DEFAULT_STRENGTH,
};
use crate::service::{InpaintJob, InpaintOutcome};

/// Inpainting request as received over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InpaintRequest {
    /// Base64 PNG of the source image.
    pub image: String,
    /// Base64 PNG of the mask (white = inpaint).
    pub mask: String,
    /// Prompt text.
    #[serde(default)]
    pub prompt: String,
    /// Negative prompt; empty means "use the configured default".
    #[serde(default)]
    pub negative_prompt: String,
    /// Denoising strength in [0, 1].
    #[serde(default = "default_strength")]
    pub strength: f64,
    /// Guidance scale in [1, 20].
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    /// Denoising steps in [10, 100].
    #[serde(default = "default_steps")]
    pub num_steps: u32,
    /// ControlNet scale in [0, 1].
    #[serde(default = "default_controlnet_scale")]
    pub controlnet_scale: f64,
    /// Optional seed.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Mask feather in pixels, [0, 50].
    #[serde(default)]
    pub feather: u32,
    /// Mask expand in pixels, [0, 50].
    #[serde(default)]
    pub expand: u32,
    /// Project cache directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

fn default_strength() -> f64 {
    DEFAULT_STRENGTH
}

fn default_guidance_scale() -> f64 {
    DEFAULT_GUIDANCE_SCALE
}

fn default_steps() -> u32 {
    DEFAULT_STEPS
}

fn default_controlnet_scale() -> f64 {
    DEFAULT_CONTROLNET_SCALE
}

impl InpaintRequest {
    /// The typed parameters carried by this request.
    #[must_use]
    pub fn params(&self) -> InpaintParams {
        InpaintParams {
            negative_prompt: self.negative_prompt.clone(),
            strength: self.strength,
            guidance_scale: self.guidance_scale,
            steps: self.num_steps,
            controlnet_scale: self.controlnet_scale,
            seed: self.seed,
            feather: self.feather,
            expand: self.expand,
        }
    }

    /// Validate and decode into a job.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for out-of-range parameters or payloads
    /// that are not decodable images.
    pub fn into_job(self) -> Result<InpaintJob, ValidationError> {
        let params = self.params();
        params.validate()?;
        Ok(InpaintJob {
            image: codec::decode_image("image", &self.image)?,
            mask: codec::decode_image("mask", &self.mask)?,
            prompt: self.prompt,
            params,
            cache_root: self.cache_dir,
        })
    }
}

/// Inpainting response as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InpaintResponse {
    /// Base64 PNG of the result.
    pub result: String,
    /// Whether the result came from the cache.
    pub cached: bool,
    /// Result width in pixels.
    pub width: u32,
    /// Result height in pixels.
    pub height: u32,
    /// Cache key, when the cache was consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Present when the result could not be cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl InpaintResponse {
    /// Encode an outcome for the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if the result cannot be encoded as PNG.
    pub fn from_outcome(outcome: &InpaintOutcome) -> Result<Self, image::ImageError> {
        Ok(Self {
            result: codec::encode_png(&outcome.result)?,
            cached: outcome.cache_hit,
            width: outcome.width(),
            height: outcome.height(),
            key: outcome.key.as_ref().map(ToString::to_string),
            warning: outcome.warning.clone(),
        })
    }
}
