//! Request orchestration.
//!
//! [`InpaintService`] owns only configuration. Each call receives the engine
//! explicitly and builds a fresh [`CacheManager`] for the request's project
//! root, so nothing is shared between requests except what is on disk.
//!
//! Flow for one request:
//! 1. Validate parameters and resolve the effective negative prompt
//! 2. Normalize inputs and derive the key (when a project root is given)
//! 3. Hit: return the stored result. Miss: load the engine if needed, infer,
//!    then store the result. A failed store becomes a warning, not an error.
//! 4. Resize the result back to the caller's original image size

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use crate::cache::{CacheKey, CacheManager, Resolution, StorageError};
use crate::config::Config;
use crate::engine::{EngineError, EngineRequest, InpaintEngine, LoadOutcome};
use crate::normalize::{self, resize_to, PreparedInputs, ValidationError};
use crate::params::InpaintParams;

/// Errors that fail a request.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    /// The request itself is unusable.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The engine could not produce a result.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The cache could not be cleared.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A decoded request.
#[derive(Debug, Clone)]
pub struct InpaintJob {
    /// Source image in any color mode.
    pub image: DynamicImage,
    /// Mask in any color mode; white regenerates, black preserves.
    pub mask: DynamicImage,
    /// Prompt text.
    pub prompt: String,
    /// Inpainting parameters.
    pub params: InpaintParams,
    /// Project directory whose cache areas to use. Never hashed.
    pub cache_root: Option<PathBuf>,
}

/// Result of one request.
#[derive(Debug, Clone)]
pub struct InpaintOutcome {
    /// Result at the caller's original image size.
    pub result: RgbImage,
    /// Whether the result came from the cache.
    pub cache_hit: bool,
    /// Cache key, when the cache was consulted.
    pub key: Option<CacheKey>,
    /// Where a freshly computed result was stored.
    pub stored_at: Option<PathBuf>,
    /// Set when the result was computed but could not be cached.
    pub warning: Option<String>,
}

impl InpaintOutcome {
    /// Result width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.result.width()
    }

    /// Result height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.result.height()
    }
}

/// Runs requests through the cache and, on a miss, the engine.
#[derive(Debug, Clone)]
pub struct InpaintService {
    config: Config,
}

impl InpaintService {
    /// Create a service with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cache manager for a project, or `None` if caching is disabled.
    #[must_use]
    pub fn cache_manager(&self, project_root: &Path) -> Option<CacheManager> {
        self.config
            .cache_enabled
            .then(|| CacheManager::for_project(project_root, &self.config))
    }

    /// Normalize a request and derive its key, looking it up when the job
    /// names a project root.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for unusable input.
    pub fn resolve(&self, job: &InpaintJob) -> Result<Resolution, ServiceError> {
        let params = self.effective_params(&job.params)?;
        let resolution = match &job.cache_root {
            Some(root) => CacheManager::for_project(root, &self.config).resolve(
                &job.image,
                &job.mask,
                &job.prompt,
                &params,
            )?,
            None => CacheManager::for_project(Path::new("."), &self.config).prepare(
                &job.image,
                &job.mask,
                &job.prompt,
                &params,
            )?,
        };
        Ok(resolution)
    }

    /// Serve one request.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for unusable input and
    /// [`ServiceError::Engine`] if inference fails. Cache write failures do
    /// not fail the request; they are reported in
    /// [`InpaintOutcome::warning`].
    pub fn inpaint(
        &self,
        job: &InpaintJob,
        engine: &mut dyn InpaintEngine,
    ) -> Result<InpaintOutcome, ServiceError> {
        let params = self.effective_params(&job.params)?;
        let manager = job
            .cache_root
            .as_deref()
            .and_then(|root| self.cache_manager(root));

        let resolution = match &manager {
            Some(manager) => Some(manager.resolve(&job.image, &job.mask, &job.prompt, &params)?),
            None => None,
        };

        if let Some(resolution) = &resolution {
            if let Some(cached) = &resolution.cached {
                log::info!("Returning cached result for {}", resolution.key);
                return Ok(InpaintOutcome {
                    result: restore_size(cached, resolution.inputs.original_size),
                    cache_hit: true,
                    key: Some(resolution.key.clone()),
                    stored_at: None,
                    warning: None,
                });
            }
        }

        let prepared: PreparedInputs;
        let inputs = match &resolution {
            Some(resolution) => &resolution.inputs,
            None => {
                prepared = normalize::prepare(
                    &job.image,
                    &job.mask,
                    params.mask_ops(),
                    self.config.max_dimension,
                )?;
                &prepared
            }
        };

        ensure_loaded(engine)?;
        let result = engine.infer(&EngineRequest {
            image: &inputs.image,
            mask: &inputs.mask,
            prompt: &job.prompt,
            negative_prompt: &params.negative_prompt,
            strength: params.strength,
            guidance_scale: params.guidance_scale,
            steps: params.steps,
            controlnet_scale: params.controlnet_scale,
            seed: params.seed,
        })?;

        let mut stored_at = None;
        let mut warning = None;
        if let (Some(manager), Some(resolution)) = (&manager, &resolution) {
            match manager.commit(resolution, &result) {
                Ok(path) => stored_at = Some(path),
                Err(e) => {
                    log::warn!("Result for {} computed but not cached: {}", resolution.key, e);
                    warning = Some(format!("Result computed but not cached: {e}"));
                }
            }
        }

        Ok(InpaintOutcome {
            result: restore_size(&result, inputs.original_size),
            cache_hit: false,
            key: resolution.map(|r| r.key),
            stored_at,
            warning,
        })
    }

    /// Remove every cached entry of a project.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the cache areas cannot be cleared.
    pub fn clear_cache(&self, project_root: &Path) -> Result<(), StorageError> {
        CacheManager::for_project(project_root, &self.config).invalidate()
    }

    fn effective_params(&self, params: &InpaintParams) -> Result<InpaintParams, ValidationError> {
        params.validate()?;
        Ok(InpaintParams {
            negative_prompt: self.config.effective_negative_prompt(&params.negative_prompt),
            ..params.clone()
        })
    }
}

fn ensure_loaded(engine: &mut dyn InpaintEngine) -> Result<(), EngineError> {
    if engine.is_loaded() {
        return Ok(());
    }
    log::info!("Auto-loading engine '{}'", engine.name());
    if let LoadOutcome::Degraded { reason } = engine.load()? {
        log::warn!("Engine '{}' loaded with reduced capabilities: {}", engine.name(), reason);
    }
    Ok(())
}

fn restore_size(image: &RgbImage, (width, height): (u32, u32)) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    resize_to(image, width, height, FilterType::Lanczos3)
}
