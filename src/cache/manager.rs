//! Request-level cache orchestration.
//!
//! [`CacheManager::resolve`] normalizes the raw inputs, derives the key and
//! looks it up. On a miss the caller runs the engine on
//! [`Resolution::inputs`] and hands the result to [`CacheManager::commit`].
//! The manager itself never runs inference and keeps no state between calls.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage};

use super::{CacheKey, CacheStore, ContentHasher, StorageError};
use crate::config::Config;
use crate::normalize::{self, PreparedInputs, ValidationError};
use crate::params::{InpaintParams, Parameters};

/// Outcome of resolving one request against the cache.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Key derived from the normalized request.
    pub key: CacheKey,
    /// Normalized inputs; these are what the engine must receive.
    pub inputs: PreparedInputs,
    /// Prompt that was hashed.
    pub prompt: String,
    /// Parameters that were hashed.
    pub params: Parameters,
    /// Stored result, if the key was present.
    pub cached: Option<RgbImage>,
}

impl Resolution {
    /// Returns true if a stored result was found.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.cached.is_some()
    }
}

/// Binds normalization, key derivation and one [`CacheStore`] together.
#[derive(Debug, Clone)]
pub struct CacheManager {
    store: CacheStore,
    hasher: ContentHasher,
    max_dimension: u32,
    paranoid: bool,
}

impl CacheManager {
    /// Create a manager over an existing store.
    #[must_use]
    pub fn new(store: CacheStore, hasher: ContentHasher) -> Self {
        Self {
            store,
            hasher,
            max_dimension: crate::config::DEFAULT_MAX_DIMENSION,
            paranoid: false,
        }
    }

    /// Create a manager for a project directory using the configured
    /// area names, key prefix, bound and verification mode.
    #[must_use]
    pub fn for_project(project_root: &Path, config: &Config) -> Self {
        let store = CacheStore::new(
            project_root.join(&config.input_dir_name),
            project_root.join(&config.output_dir_name),
        );
        Self::new(store, ContentHasher::new(config.key_prefix.clone()))
            .with_max_dimension(config.max_dimension)
            .with_paranoid(config.paranoid)
    }

    /// Set the model's maximum image dimension.
    #[must_use]
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Verify stored inputs pixel-for-pixel before accepting a hit.
    #[must_use]
    pub fn with_paranoid(mut self, paranoid: bool) -> Self {
        self.paranoid = paranoid;
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Normalize a request and derive its key without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the inputs cannot be normalized.
    pub fn prepare(
        &self,
        image: &DynamicImage,
        mask: &DynamicImage,
        prompt: &str,
        params: &InpaintParams,
    ) -> Result<Resolution, ValidationError> {
        let inputs = normalize::prepare(image, mask, params.mask_ops(), self.max_dimension)?;
        let params = params.to_parameters();
        let key = self.hasher.compute_key(
            &inputs.image,
            &inputs.mask,
            prompt,
            &params.canonical_bytes(),
        );
        Ok(Resolution {
            key,
            inputs,
            prompt: prompt.to_string(),
            params,
            cached: None,
        })
    }

    /// Normalize a request, derive its key and look it up.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the inputs cannot be normalized.
    /// Storage problems during lookup are reported as a miss.
    pub fn resolve(
        &self,
        image: &DynamicImage,
        mask: &DynamicImage,
        prompt: &str,
        params: &InpaintParams,
    ) -> Result<Resolution, ValidationError> {
        let mut resolution = self.prepare(image, mask, prompt, params)?;
        resolution.cached = self.store.lookup(&resolution.key);

        if resolution.cached.is_some() && self.paranoid && !self.inputs_match(&resolution) {
            log::warn!(
                "Stored inputs for {} differ from the request; ignoring cached result",
                resolution.key
            );
            resolution.cached = None;
        }

        if resolution.is_hit() {
            log::info!("Cache hit for {}", resolution.key);
        } else {
            log::info!("Cache miss for {}", resolution.key);
        }
        Ok(resolution)
    }

    /// Store the engine's result for a resolved request.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the entry cannot be written. The caller
    /// still holds `result` and may serve it uncached.
    pub fn commit(
        &self,
        resolution: &Resolution,
        result: &RgbImage,
    ) -> Result<PathBuf, StorageError> {
        self.store.save(
            &resolution.key,
            &resolution.inputs.image,
            &resolution.inputs.mask,
            result,
            &resolution.prompt,
            &resolution.params,
        )
    }

    /// Drop every entry in this manager's store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the areas cannot be cleared.
    pub fn invalidate(&self) -> Result<(), StorageError> {
        self.store.invalidate()
    }

    fn inputs_match(&self, resolution: &Resolution) -> bool {
        self.store
            .stored_inputs(&resolution.key)
            .is_some_and(|(image, mask)| {
                image == resolution.inputs.image && mask == resolution.inputs.mask
            })
    }
}
