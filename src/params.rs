//! Inpainting parameters and their canonical encoding.
//!
//! [`InpaintParams`] is the typed request-side view; [`Parameters`] is the
//! flat name-to-scalar mapping that gets hashed. The mapping is backed by a
//! `BTreeMap`, so its JSON encoding always lists keys in lexicographic order
//! regardless of insertion order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::normalize::{MaskOps, ValidationError};

/// Default denoising strength.
pub const DEFAULT_STRENGTH: f64 = 0.85;
/// Default classifier-free guidance scale.
pub const DEFAULT_GUIDANCE_SCALE: f64 = 7.5;
/// Default number of denoising steps.
pub const DEFAULT_STEPS: u32 = 30;
/// Default ControlNet conditioning scale.
pub const DEFAULT_CONTROLNET_SCALE: f64 = 0.5;

/// Fields that only route a request and never influence the computed pixels.
pub const TRANSPORT_ONLY_KEYS: &[&str] = &["cache_dir", "cache_root"];

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Explicitly absent (e.g. no seed). Distinct from any number.
    Null,
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Int(v) => serializer.serialize_i64(*v),
            // JSON has no NaN/inf; spell them out rather than collapsing to null.
            Self::Float(v) if !v.is_finite() => serializer.serialize_str(&v.to_string()),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Text(v) => serializer.serialize_str(v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Order-independent parameter mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, ParamValue>);

impl Parameters {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Look up a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deterministic byte encoding used for hashing.
    ///
    /// Compact JSON with keys in lexicographic order and transport-only keys
    /// removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use inpaint_cache::params::{ParamValue, Parameters};
    ///
    /// let mut a = Parameters::new();
    /// a.insert("steps", 30u32);
    /// a.insert("seed", ParamValue::Null);
    ///
    /// let mut b = Parameters::new();
    /// b.insert("seed", ParamValue::Null);
    /// b.insert("steps", 30u32);
    /// b.insert("cache_dir", "/projects/a");
    ///
    /// assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    /// assert_eq!(a.canonical_bytes(), br#"{"seed":null,"steps":30}"#.to_vec());
    /// ```
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let hashed: BTreeMap<&str, &ParamValue> = self
            .0
            .iter()
            .filter(|(name, _)| !TRANSPORT_ONLY_KEYS.contains(&name.as_str()))
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        // Serializing string keys and scalar values cannot fail.
        serde_json::to_vec(&hashed).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Typed inpainting parameters for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InpaintParams {
    /// Text describing what to avoid. Already resolved to its effective value.
    pub negative_prompt: String,
    /// Denoising strength in [0, 1].
    pub strength: f64,
    /// Guidance scale in [1, 20].
    pub guidance_scale: f64,
    /// Denoising steps in [10, 100].
    pub steps: u32,
    /// ControlNet conditioning scale in [0, 1].
    pub controlnet_scale: f64,
    /// Explicit seed; `None` lets the engine pick one.
    pub seed: Option<u64>,
    /// Mask feather radius in pixels, [0, 50].
    pub feather: u32,
    /// Mask expand radius in pixels, [0, 50].
    pub expand: u32,
}

impl Default for InpaintParams {
    fn default() -> Self {
        Self {
            negative_prompt: String::new(),
            strength: DEFAULT_STRENGTH,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            steps: DEFAULT_STEPS,
            controlnet_scale: DEFAULT_CONTROLNET_SCALE,
            seed: None,
            feather: 0,
            expand: 0,
        }
    }
}

impl InpaintParams {
    /// Check every field against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] for the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("strength", self.strength, 0.0, 1.0)?;
        check_range("guidance_scale", self.guidance_scale, 1.0, 20.0)?;
        check_range("num_steps", self.steps, 10, 100)?;
        check_range("controlnet_scale", self.controlnet_scale, 0.0, 1.0)?;
        check_range("feather", self.feather, 0, 50)?;
        check_range("expand", self.expand, 0, 50)?;
        Ok(())
    }

    /// Mask post-processing described by these parameters.
    #[must_use]
    pub fn mask_ops(&self) -> MaskOps {
        MaskOps {
            feather: self.feather,
            expand: self.expand,
        }
    }

    /// Flatten into the hashed parameter mapping.
    ///
    /// The seed is always present, as `null` when absent, so that "no seed"
    /// never collides with an explicit seed of 0.
    #[must_use]
    pub fn to_parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("strength", self.strength);
        params.insert("guidance_scale", self.guidance_scale);
        params.insert("num_steps", self.steps);
        params.insert("controlnet_scale", self.controlnet_scale);
        params.insert("feather", self.feather);
        params.insert("expand", self.expand);
        // Bit-preserving cast: distinct seeds stay distinct.
        params.insert("seed", self.seed.map(|s| s as i64));
        params.insert("negative_prompt", self.negative_prompt.as_str());
        params
    }
}

fn check_range<T>(field: &'static str, value: T, min: T, max: T) -> Result<(), ValidationError>
where
    T: PartialOrd + fmt::Display + Copy,
{
    // Written so that NaN fails.
    if value >= min && value <= max {
        return Ok(());
    }
    Err(ValidationError::OutOfRange {
        field,
        value: value.to_string(),
        min: min.to_string(),
        max: max.to_string(),
    })
}
