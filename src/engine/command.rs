//! Engine backed by an external executable.
//!
//! Each inference call writes the normalized image and mask as PNG files into
//! a scratch directory and runs:
//!
//! ```text
//! <program> [args...] --image <png> --mask <png> --output <png>
//!     --prompt <text> --negative-prompt <text> --strength <f> --guidance-scale <f>
//!     --steps <n> --controlnet-scale <f> [--seed <n>] [--controlnet <path>]
//! ```
//!
//! The program must write its result to the `--output` path and exit with
//! status 0. Anything it prints to stderr is included in the error on
//! failure.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::{EngineError, EngineRequest, InpaintEngine, LoadOutcome};
use crate::normalize::normalize_image;

/// Settings for [`CommandEngine`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandEngineConfig {
    /// Executable name (looked up on `PATH`) or path.
    pub program: PathBuf,
    /// Extra leading arguments, e.g. a script path or model location.
    pub args: Vec<String>,
    /// Optional ControlNet weights passed through as `--controlnet`.
    pub controlnet_model: Option<PathBuf>,
    /// Device label reported by the engine.
    pub device: String,
}

/// Runs inference by spawning an external program.
#[derive(Debug)]
pub struct CommandEngine {
    config: CommandEngineConfig,
    resolved: Option<PathBuf>,
    controlnet: bool,
}

impl CommandEngine {
    /// Create an unloaded engine.
    #[must_use]
    pub fn new(config: CommandEngineConfig) -> Self {
        Self {
            config,
            resolved: None,
            controlnet: false,
        }
    }

    fn resolve_program(&self) -> Option<PathBuf> {
        let program = &self.config.program;
        if program.as_os_str().is_empty() {
            return None;
        }
        if program.components().count() > 1 || program.is_absolute() {
            return program.is_file().then(|| program.clone());
        }
        let path = env::var_os("PATH")?;
        env::split_paths(&path)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    }
}

impl InpaintEngine for CommandEngine {
    fn name(&self) -> &str {
        "command"
    }

    fn device(&self) -> &str {
        if self.config.device.is_empty() {
            "external"
        } else {
            &self.config.device
        }
    }

    fn is_loaded(&self) -> bool {
        self.resolved.is_some()
    }

    fn supports_controlnet(&self) -> bool {
        self.controlnet
    }

    fn load(&mut self) -> Result<LoadOutcome, EngineError> {
        if self.is_loaded() {
            log::debug!("Engine already loaded");
            return Ok(LoadOutcome::Ready);
        }

        let program = self.resolve_program().ok_or_else(|| {
            EngineError::Load(format!(
                "engine program not found: '{}'",
                self.config.program.display()
            ))
        })?;
        log::info!("Using engine program {}", program.display());
        self.resolved = Some(program);

        let outcome = match &self.config.controlnet_model {
            None => LoadOutcome::Ready,
            Some(model) if model.exists() => {
                self.controlnet = true;
                LoadOutcome::Ready
            }
            Some(model) => {
                self.controlnet = false;
                LoadOutcome::Degraded {
                    reason: format!(
                        "ControlNet weights not found at {}; continuing without ControlNet",
                        model.display()
                    ),
                }
            }
        };
        if let LoadOutcome::Degraded { reason } = &outcome {
            log::warn!("{}", reason);
        }
        Ok(outcome)
    }

    fn unload(&mut self) {
        self.resolved = None;
        self.controlnet = false;
        log::info!("Engine unloaded");
    }

    fn infer(&mut self, request: &EngineRequest<'_>) -> Result<RgbImage, EngineError> {
        let program = self
            .resolved
            .as_ref()
            .ok_or_else(|| EngineError::NotLoaded(self.name().to_string()))?;

        let scratch = tempfile::tempdir()?;
        let image_path = scratch.path().join("image.png");
        let mask_path = scratch.path().join("mask.png");
        let output_path = scratch.path().join("result.png");
        request.image.save(&image_path)?;
        request.mask.save(&mask_path)?;

        let mut cmd = Command::new(program);
        cmd.args(&self.config.args)
            .arg("--image")
            .arg(&image_path)
            .arg("--mask")
            .arg(&mask_path)
            .arg("--output")
            .arg(&output_path)
            .arg("--prompt")
            .arg(request.prompt)
            .arg("--negative-prompt")
            .arg(request.negative_prompt)
            .arg("--strength")
            .arg(request.strength.to_string())
            .arg("--guidance-scale")
            .arg(request.guidance_scale.to_string())
            .arg("--steps")
            .arg(request.steps.to_string())
            .arg("--controlnet-scale")
            .arg(request.controlnet_scale.to_string());
        if let Some(seed) = request.seed {
            cmd.arg("--seed").arg(seed.to_string());
        }
        if self.controlnet {
            if let Some(model) = &self.config.controlnet_model {
                cmd.arg("--controlnet").arg(model);
            }
        }

        log::debug!("Running engine: {:?}", cmd);
        let output = cmd.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Inference(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            )));
        }

        read_result(&output_path)
    }
}

fn read_result(path: &Path) -> Result<RgbImage, EngineError> {
    if !path.exists() {
        return Err(EngineError::Inference(
            "engine exited successfully but wrote no result".to_string(),
        ));
    }
    let image = image::open(path)?;
    Ok(normalize_image(&image))
}
