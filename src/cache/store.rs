//! Filesystem-backed cache store.
//!
//! # Layout
//!
//! ```text
//! <input_dir>/<key>_input.png    normalized image
//! <input_dir>/<key>_mask.png     normalized mask
//! <input_dir>/<key>_meta.json    metadata record
//! <output_dir>/<key>_result.png  engine result
//! ```
//!
//! An entry counts as present exactly when its result file exists and
//! decodes. Saves write the result last, so a present entry always has its
//! input artifacts in place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::{GrayImage, RgbImage};

use super::atomic;
use super::entry::{EntryMetadata, EntryPaths};
use super::CacheKey;
use crate::params::Parameters;

/// Errors that can occur while writing or clearing the store.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// A storage directory could not be created.
    #[error("Failed to create cache directory {path}: {source}")]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A file could not be written.
    #[error("Failed to write cache file {path}: {source}")]
    Write {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An image could not be encoded.
    #[error("Failed to encode {path}: {source}")]
    Encode {
        /// File path
        path: PathBuf,
        /// Underlying encoder error
        #[source]
        source: image::ImageError,
    },

    /// The metadata record could not be serialized.
    #[error("Failed to serialize metadata for {path}: {source}")]
    Metadata {
        /// File path
        path: PathBuf,
        /// Underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// A storage directory could not be removed.
    #[error("Failed to remove cache directory {path}: {source}")]
    Remove {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Write-once mapping from [`CacheKey`] to stored artifacts.
///
/// Holds only the two directory roots; all state lives on disk, so any
/// number of stores may point at the same roots concurrently.
#[derive(Debug, Clone)]
pub struct CacheStore {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl CacheStore {
    /// Create a store over the given input and output areas.
    ///
    /// Nothing is touched on disk until the first save.
    #[must_use]
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Directory holding inputs and metadata.
    #[must_use]
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Directory holding results.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File locations for `key`.
    #[must_use]
    pub fn paths(&self, key: &CacheKey) -> EntryPaths {
        let stem = key.as_str();
        EntryPaths {
            input: self.input_dir.join(format!("{stem}_input.png")),
            mask: self.input_dir.join(format!("{stem}_mask.png")),
            meta: self.input_dir.join(format!("{stem}_meta.json")),
            result: self.output_dir.join(format!("{stem}_result.png")),
        }
    }

    /// Fetch the stored result for `key`.
    ///
    /// Missing and unreadable results are both reported as `None`; a broken
    /// file is logged and otherwise treated as absent.
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<RgbImage> {
        let path = self.paths(key).result;
        read_png(&path).map(|image| image.to_rgb8())
    }

    /// Fetch the stored normalized inputs for `key`, if both are readable.
    #[must_use]
    pub fn stored_inputs(&self, key: &CacheKey) -> Option<(RgbImage, GrayImage)> {
        let paths = self.paths(key);
        let image = read_png(&paths.input)?.to_rgb8();
        let mask = read_png(&paths.mask)?.to_luma8();
        Some((image, mask))
    }

    /// Persist one entry and return the result path.
    ///
    /// Re-saving an existing key overwrites it. Every file is written via a
    /// temp file and rename; the result goes last.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if a directory cannot be created or any
    /// artifact cannot be written.
    pub fn save(
        &self,
        key: &CacheKey,
        image: &RgbImage,
        mask: &GrayImage,
        result: &RgbImage,
        prompt: &str,
        params: &Parameters,
    ) -> Result<PathBuf, StorageError> {
        ensure_dir(&self.input_dir)?;
        ensure_dir(&self.output_dir)?;

        let paths = self.paths(key);
        atomic::write_png(&paths.input, image)?;
        atomic::write_png(&paths.mask, mask)?;

        let meta = EntryMetadata {
            key: key.clone(),
            prompt: prompt.to_string(),
            params: params.clone(),
            input: paths.input.clone(),
            mask: paths.mask.clone(),
            result: paths.result.clone(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&meta).map_err(|source| StorageError::Metadata {
            path: paths.meta.clone(),
            source,
        })?;
        atomic::write_bytes(&paths.meta, &json)?;

        atomic::write_png(&paths.result, result)?;
        log::debug!("Saved cache entry {} -> {}", key, paths.result.display());
        Ok(paths.result)
    }

    /// Read the metadata record for `key`, if present and well-formed.
    #[must_use]
    pub fn metadata(&self, key: &CacheKey) -> Option<EntryMetadata> {
        let path = self.paths(key).meta;
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(meta) => Some(meta),
            Err(e) => {
                log::warn!("Ignoring unreadable metadata {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Delete both storage areas and recreate them empty.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if a directory cannot be removed or recreated.
    pub fn invalidate(&self) -> Result<(), StorageError> {
        for dir in [&self.input_dir, &self.output_dir] {
            match fs::remove_dir_all(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StorageError::Remove {
                        path: dir.clone(),
                        source,
                    })
                }
            }
            ensure_dir(dir)?;
        }
        log::info!(
            "Cleared cache areas {} and {}",
            self.input_dir.display(),
            self.output_dir.display()
        );
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

fn read_png(path: &Path) -> Option<image::DynamicImage> {
    if !path.exists() {
        return None;
    }
    match image::open(path) {
        Ok(image) => Some(image),
        Err(e) => {
            log::warn!("Treating unreadable cache file as missing {}: {}", path.display(), e);
            None
        }
    }
}
