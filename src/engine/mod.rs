//! Inference engine boundary.
//!
//! The cache never runs inference itself. Anything that can load a model and
//! turn a normalized image/mask pair into a result implements
//! [`InpaintEngine`]; callers pass the engine explicitly to whatever needs it.
//!
//! - [`command`]: An engine that delegates to an external executable

pub mod command;

use image::{GrayImage, RgbImage};

pub use command::{CommandEngine, CommandEngineConfig};

/// Errors reported by an engine.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Inference was requested before the model was loaded.
    #[error("Engine '{0}' is not loaded")]
    NotLoaded(String),

    /// The model could not be loaded.
    #[error("Failed to load engine: {0}")]
    Load(String),

    /// The computation could not complete.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// I/O failure while talking to the engine.
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine produced an image that could not be decoded or encoded.
    #[error("Engine image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result of loading an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// All capabilities are available.
    Ready,
    /// The engine works, but an optional capability is unavailable.
    Degraded {
        /// What is missing and why.
        reason: String,
    },
}

/// One inference call.
#[derive(Debug, Clone, Copy)]
pub struct EngineRequest<'a> {
    /// Normalized RGB image.
    pub image: &'a RgbImage,
    /// Normalized mask, same dimensions as `image`.
    pub mask: &'a GrayImage,
    /// Prompt text.
    pub prompt: &'a str,
    /// Negative prompt text.
    pub negative_prompt: &'a str,
    /// Denoising strength.
    pub strength: f64,
    /// Guidance scale.
    pub guidance_scale: f64,
    /// Number of denoising steps.
    pub steps: u32,
    /// ControlNet conditioning scale.
    pub controlnet_scale: f64,
    /// Explicit seed, if any.
    pub seed: Option<u64>,
}

/// An inpainting engine with an explicit load/unload lifecycle.
///
/// Engines are stateful and not reentrant; callers serialize access through
/// `&mut self`.
pub trait InpaintEngine {
    /// Short engine name, for logs and status output.
    fn name(&self) -> &str;

    /// Device the engine runs on.
    fn device(&self) -> &str;

    /// Returns true if the model is loaded.
    fn is_loaded(&self) -> bool;

    /// Returns true if ControlNet conditioning is available.
    fn supports_controlnet(&self) -> bool;

    /// Load the model. Loading an already loaded engine is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Load`] if the model cannot be loaded at all.
    fn load(&mut self) -> Result<LoadOutcome, EngineError>;

    /// Release the model.
    fn unload(&mut self);

    /// Run inference.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the engine is not loaded or the
    /// computation fails.
    fn infer(&mut self, request: &EngineRequest<'_>) -> Result<RgbImage, EngineError>;
}
