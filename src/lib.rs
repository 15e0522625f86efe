//! inpaint-cache - Content-addressed result cache for image inpainting
//!
//! Normalizes an inpainting request (image, mask, prompt, parameters) into a
//! canonical form, derives a deterministic BLAKE3 key from it, and serves
//! repeated requests from a per-project artifact store instead of re-running
//! the engine.

pub mod api;
pub mod cache;
pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod params;
pub mod service;

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Context;

use crate::api::{InpaintRequest, InpaintResponse};
use crate::cli::{Cli, Commands, ConfigArgs, EngineArgs, RequestInputArgs};
use crate::config::Config;
use crate::engine::CommandEngine;
use crate::error::ExitCode;
use crate::normalize::ValidationError;
use crate::params::InpaintParams;
use crate::service::{InpaintJob, InpaintOutcome, InpaintService};

/// Run the application with parsed arguments.
///
/// # Errors
///
/// Returns an error if the command fails; [`ExitCode::for_error`] maps it
/// to a process exit code.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => Config::try_load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load(),
    };

    match cli.command {
        Commands::Inpaint(args) => {
            let mut config = config;
            apply_input_overrides(&mut config, &args.input);
            apply_engine_overrides(&mut config, &args.engine);
            config.validate()?;

            let job = load_job(&args.input)?;
            let service = InpaintService::new(config);
            let mut engine = CommandEngine::new(service.config().engine.clone());
            let outcome = service.inpaint(&job, &mut engine)?;

            if let Some(path) = &args.output {
                outcome
                    .result
                    .save(path)
                    .with_context(|| format!("writing result to {}", path.display()))?;
                log::info!("Wrote {}", path.display());
            }
            if args.json {
                print_response(&outcome)?;
            } else if !cli.quiet {
                println!("{}", summary(&outcome));
            }
            Ok(exit_code_for(&outcome))
        }
        Commands::Key(args) => {
            let mut config = config;
            apply_input_overrides(&mut config, &args.input);
            config.validate()?;

            let job = load_job(&args.input)?;
            let resolution = InpaintService::new(config).resolve(&job)?;
            if job.cache_root.is_some() {
                let state = if resolution.is_hit() { "hit" } else { "miss" };
                println!("{} {}", resolution.key, state);
            } else {
                println!("{}", resolution.key);
            }
            Ok(ExitCode::Success)
        }
        Commands::Request(args) => {
            let mut config = config;
            config.paranoid |= args.paranoid;
            apply_engine_overrides(&mut config, &args.engine);
            config.validate()?;

            let request = read_request(&args.file)?;
            let job = request.into_job()?;
            let service = InpaintService::new(config);
            let mut engine = CommandEngine::new(service.config().engine.clone());
            let outcome = service.inpaint(&job, &mut engine)?;
            print_response(&outcome)?;
            Ok(exit_code_for(&outcome))
        }
        Commands::ClearCache(args) => {
            InpaintService::new(config).clear_cache(&args.root)?;
            log::info!("Cleared cache under {}", args.root.display());
            Ok(ExitCode::Success)
        }
        Commands::Config(args) => handle_config(&args, cli.config.as_deref(), &config),
    }
}

fn apply_input_overrides(config: &mut Config, input: &RequestInputArgs) {
    if let Some(max_dimension) = input.max_dimension {
        config.max_dimension = max_dimension;
    }
    config.paranoid |= input.paranoid;
}

fn apply_engine_overrides(config: &mut Config, engine: &EngineArgs) {
    if let Some(program) = &engine.engine_program {
        config.engine.program = program.clone();
    }
    if !engine.engine_args.is_empty() {
        config.engine.args = engine.engine_args.clone();
    }
    if let Some(model) = &engine.controlnet_model {
        config.engine.controlnet_model = Some(model.clone());
    }
    if engine.no_cache {
        config.cache_enabled = false;
    }
}

fn load_job(input: &RequestInputArgs) -> anyhow::Result<InpaintJob> {
    let open = |what: &'static str, path: &Path| {
        image::open(path)
            .map_err(|source| ValidationError::Decode { what, source })
            .with_context(|| format!("reading {}", path.display()))
    };
    Ok(InpaintJob {
        image: open("image", &input.image)?,
        mask: open("mask", &input.mask)?,
        prompt: input.prompt.clone(),
        params: InpaintParams {
            negative_prompt: input.negative_prompt.clone(),
            strength: input.strength,
            guidance_scale: input.guidance_scale,
            steps: input.steps,
            controlnet_scale: input.controlnet_scale,
            seed: input.seed,
            feather: input.feather,
            expand: input.expand,
        },
        cache_root: input.cache_root.clone(),
    })
}

fn read_request(path: &Path) -> anyhow::Result<InpaintRequest> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading request from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&text).context("parsing request JSON")
}

fn print_response(outcome: &InpaintOutcome) -> anyhow::Result<()> {
    let response = InpaintResponse::from_outcome(outcome).context("encoding result")?;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

fn summary(outcome: &InpaintOutcome) -> String {
    let state = if outcome.cache_hit { "cached" } else { "computed" };
    match &outcome.key {
        Some(key) => format!("{} {} {}x{}", key, state, outcome.width(), outcome.height()),
        None => format!("{} {}x{}", state, outcome.width(), outcome.height()),
    }
}

fn exit_code_for(outcome: &InpaintOutcome) -> ExitCode {
    if outcome.warning.is_some() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    }
}

fn handle_config(
    args: &ConfigArgs,
    explicit: Option<&Path>,
    config: &Config,
) -> anyhow::Result<ExitCode> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Config::default_path(),
    };

    if args.path {
        match &path {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("no configuration directory available on this platform"),
        }
        return Ok(ExitCode::Success);
    }

    if args.init {
        let path = path.context("no configuration directory available on this platform")?;
        config.save(&path)?;
        log::info!("Wrote configuration to {}", path.display());
        return Ok(ExitCode::Success);
    }

    print!("{}", config.to_toml()?);
    Ok(ExitCode::Success)
}
