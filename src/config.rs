//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. TOML config file (platform config dir, or `--config`)
//! 3. `INPAINT_CACHE_*` environment variables (`__` separates nested keys,
//!    e.g. `INPAINT_CACHE_ENGINE__PROGRAM`)
//! 4. CLI flags, applied by the caller after loading
//!
//! # Example
//!
//! ```toml
//! max_dimension = 768
//! paranoid = true
//!
//! [engine]
//! program = "sd-inpaint"
//! args = ["--model", "/models/sd-v1-5-inpainting.ckpt"]
//! controlnet_model = "/models/control_v11p_sd15_lineart.safetensors"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cache::key::{is_safe_component, DEFAULT_KEY_PREFIX};
use crate::engine::CommandEngineConfig;

/// Default bound on the longer image side handed to the engine.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Negative prompt used when a request leaves it empty.
pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "blurry, low quality, watermark, signature, realistic, photo, 3d render, deformed";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "INPAINT_CACHE_";

const KNOWN_KEYS: &[&str] = &[
    "max_dimension",
    "cache_enabled",
    "input_dir_name",
    "output_dir_name",
    "key_prefix",
    "paranoid",
    "default_negative_prompt",
    "engine",
];

/// Errors while loading or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A layer could not be read or has the wrong shape.
    #[error("Invalid configuration: {0}")]
    Figment(#[from] figment::Error),

    /// A value is present but unusable.
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Offending key
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Longest image side handed to the engine.
    pub max_dimension: u32,
    /// Whether requests with a project root use the cache at all.
    pub cache_enabled: bool,
    /// Name of the per-project input artifacts directory.
    pub input_dir_name: String,
    /// Name of the per-project output artifacts directory.
    pub output_dir_name: String,
    /// Prefix of every cache key.
    pub key_prefix: String,
    /// Compare stored inputs pixel-for-pixel before accepting a hit.
    pub paranoid: bool,
    /// Negative prompt used when a request leaves it empty.
    pub default_negative_prompt: String,
    /// External engine settings.
    pub engine: CommandEngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            cache_enabled: true,
            input_dir_name: "_AI_CACHE".to_string(),
            output_dir_name: "_AI_OUT".to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            paranoid: false,
            default_negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            engine: CommandEngineConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default platform-specific path, falling back to
    /// defaults (plus environment) when anything goes wrong.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from_path(path),
            None => {
                log::debug!("No config directory available, using defaults");
                Self::figment(None).extract().unwrap_or_default()
            }
        }
    }

    /// Load from `path`, falling back to defaults on error.
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load_from_path(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "Failed to load config from {}, using defaults: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Load from `path` and validate.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is malformed, a value has the
    /// wrong type, or validation fails.
    pub fn try_load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if let Ok(content) = fs::read_to_string(path) {
            for (key, suggestion) in unknown_keys(&content) {
                match suggestion {
                    Some(s) => log::warn!("Unknown config key '{}' (did you mean '{}'?)", key, s),
                    None => log::warn!("Unknown config key '{}'", key),
                }
            }
        }

        let config: Self = Self::figment(Some(path)).extract()?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Check values that deserialize fine but cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dimension < crate::normalize::MODEL_STRIDE {
            return Err(ConfigError::Invalid {
                field: "max_dimension",
                reason: format!(
                    "{} is below the model stride of {}",
                    self.max_dimension,
                    crate::normalize::MODEL_STRIDE
                ),
            });
        }
        for (field, name) in [
            ("input_dir_name", &self.input_dir_name),
            ("output_dir_name", &self.output_dir_name),
        ] {
            if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("'{name}' must be a plain directory name"),
                });
            }
        }
        if self.input_dir_name == self.output_dir_name {
            return Err(ConfigError::Invalid {
                field: "output_dir_name",
                reason: "input and output areas must differ".to_string(),
            });
        }
        if !is_safe_component(&self.key_prefix) {
            return Err(ConfigError::Invalid {
                field: "key_prefix",
                reason: format!(
                    "'{}' may only contain ASCII letters, digits, '-' and '_'",
                    self.key_prefix
                ),
            });
        }
        Ok(())
    }

    /// Write the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented in TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The negative prompt to use for a request.
    #[must_use]
    pub fn effective_negative_prompt(&self, requested: &str) -> String {
        if requested.is_empty() {
            self.default_negative_prompt.clone()
        } else {
            requested.to_string()
        }
    }

    /// Default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "inpaint-cache", "inpaint-cache")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Top-level keys in `content` that are not config fields, each with the
/// closest known key if one is similar enough.
fn unknown_keys(content: &str) -> Vec<(String, Option<&'static str>)> {
    let Ok(table) = content.parse::<toml::Table>() else {
        return Vec::new();
    };
    table
        .keys()
        .filter(|key| !KNOWN_KEYS.contains(&key.as_str()))
        .map(|key| (key.clone(), suggest(key)))
        .collect()
}

fn suggest(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .map(|known| (*known, strsim::jaro_winkler(key, known)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(known, _)| known)
}
