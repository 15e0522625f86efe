//! Cache entry metadata record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::CacheKey;
use crate::params::Parameters;

/// Human-readable record stored next to an entry's input artifacts.
///
/// The record is informational: lookups only depend on the result file.
/// It carries no format version, so a structural change simply leaves older
/// records unreadable by newer tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Key the entry is stored under.
    pub key: CacheKey,
    /// Prompt text that was hashed.
    pub prompt: String,
    /// Parameters that were hashed.
    pub params: Parameters,
    /// Normalized input image.
    pub input: PathBuf,
    /// Normalized mask.
    pub mask: PathBuf,
    /// Engine result served on later hits.
    pub result: PathBuf,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

/// On-disk locations of one entry's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPaths {
    /// Normalized input image (input area).
    pub input: PathBuf,
    /// Normalized mask (input area).
    pub mask: PathBuf,
    /// Metadata record (input area).
    pub meta: PathBuf,
    /// Result image (output area).
    pub result: PathBuf,
}
