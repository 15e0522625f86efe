//! Command-line interface definitions for inpaint-cache.
//!
//! Global options (verbosity, JSON errors, config file) apply to every
//! subcommand.
//!
//! # Example
//!
//! ```bash
//! # Inpaint a region, caching the result under ~/project
//! inpaint-cache inpaint --image photo.png --mask mask.png \
//!     --prompt "clean background" --seed 42 --cache-root ~/project -o out.png
//!
//! # Print the cache key a request would use
//! inpaint-cache key --image photo.png --mask mask.png --prompt "clean background"
//!
//! # Serve a JSON request bundle from stdin
//! inpaint-cache request - < request.json
//!
//! # Drop every cached result of a project
//! inpaint-cache clear-cache ~/project
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Content-addressed result cache for a local image inpainting service.
///
/// Identical requests (same pixels, mask, prompt and parameters) are served
/// from a per-project cache instead of re-running the engine.
#[derive(Debug, Parser)]
#[command(name = "inpaint-cache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "PATH", global = true, env = "INPAINT_CACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inpaint an image, using the project cache when possible
    Inpaint(InpaintArgs),
    /// Print the cache key of a request and whether it is cached
    Key(KeyArgs),
    /// Serve a JSON request bundle and print the JSON response
    Request(RequestArgs),
    /// Remove every cached entry of a project
    ClearCache(ClearCacheArgs),
    /// Show or initialize the configuration file
    Config(ConfigArgs),
}

/// Image, mask, prompt and parameters of one request.
#[derive(Debug, Args)]
pub struct RequestInputArgs {
    /// Source image file
    #[arg(long, value_name = "PATH")]
    pub image: PathBuf,

    /// Mask file (white = inpaint, black = keep)
    #[arg(long, value_name = "PATH")]
    pub mask: PathBuf,

    /// Prompt describing the desired content
    #[arg(short, long, default_value = "")]
    pub prompt: String,

    /// Negative prompt; the configured default is used when empty
    #[arg(long, default_value = "")]
    pub negative_prompt: String,

    /// Denoising strength
    #[arg(long, value_name = "0..1", default_value_t = crate::params::DEFAULT_STRENGTH, value_parser = parse_unit)]
    pub strength: f64,

    /// Classifier-free guidance scale
    #[arg(long, value_name = "1..20", default_value_t = crate::params::DEFAULT_GUIDANCE_SCALE, value_parser = parse_guidance)]
    pub guidance_scale: f64,

    /// Number of denoising steps
    #[arg(long, default_value_t = crate::params::DEFAULT_STEPS, value_parser = clap::value_parser!(u32).range(10..=100))]
    pub steps: u32,

    /// ControlNet conditioning scale
    #[arg(long, value_name = "0..1", default_value_t = crate::params::DEFAULT_CONTROLNET_SCALE, value_parser = parse_unit)]
    pub controlnet_scale: f64,

    /// Seed for reproducible results
    #[arg(long)]
    pub seed: Option<u64>,

    /// Blur the mask edge by this many pixels
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=50))]
    pub feather: u32,

    /// Grow the mask by this many pixels
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=50))]
    pub expand: u32,

    /// Project directory holding the cache areas
    #[arg(long, value_name = "DIR")]
    pub cache_root: Option<PathBuf>,

    /// Longest image side handed to the engine (overrides config)
    #[arg(long, value_name = "PX", value_parser = clap::value_parser!(u32).range(8..))]
    pub max_dimension: Option<u32>,

    /// Compare stored inputs pixel-for-pixel before accepting a cache hit
    #[arg(long)]
    pub paranoid: bool,
}

/// External engine overrides.
#[derive(Debug, Args)]
pub struct EngineArgs {
    /// Engine executable (overrides config)
    #[arg(long, value_name = "PROGRAM")]
    pub engine_program: Option<PathBuf>,

    /// Leading argument for the engine executable (repeatable, overrides config)
    #[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// ControlNet weights passed to the engine (overrides config)
    #[arg(long, value_name = "PATH")]
    pub controlnet_model: Option<PathBuf>,

    /// Bypass the cache entirely
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for the inpaint subcommand.
#[derive(Debug, Args)]
pub struct InpaintArgs {
    #[command(flatten)]
    pub input: RequestInputArgs,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Write the result PNG here
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print the JSON response on stdout
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the key subcommand.
#[derive(Debug, Args)]
pub struct KeyArgs {
    #[command(flatten)]
    pub input: RequestInputArgs,
}

/// Arguments for the request subcommand.
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// JSON request file, or `-` for stdin
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Compare stored inputs pixel-for-pixel before accepting a cache hit
    #[arg(long)]
    pub paranoid: bool,
}

/// Arguments for the clear-cache subcommand.
#[derive(Debug, Args)]
pub struct ClearCacheArgs {
    /// Project directory whose cache areas to clear
    #[arg(value_name = "PROJECT_ROOT")]
    pub root: PathBuf,
}

/// Arguments for the config subcommand.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Write the effective configuration to the config file
    #[arg(long)]
    pub init: bool,

    /// Print only the config file location
    #[arg(long, conflicts_with = "init")]
    pub path: bool,
}

/// Parse a float in `[0, 1]`.
///
/// # Errors
///
/// Returns an error if the value is not a number or out of range.
pub fn parse_unit(s: &str) -> Result<f64, String> {
    parse_in_range(s, 0.0, 1.0)
}

/// Parse a guidance scale in `[1, 20]`.
///
/// # Errors
///
/// Returns an error if the value is not a number or out of range.
pub fn parse_guidance(s: &str) -> Result<f64, String> {
    parse_in_range(s, 1.0, 20.0)
}

fn parse_in_range(s: &str, min: f64, max: f64) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if !(min..=max).contains(&value) {
        return Err(format!("{value} is not in {min}..={max}"));
    }
    Ok(value)
}
