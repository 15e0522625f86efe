use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use inpaint_cache::api::{InpaintRequest, InpaintResponse};
use inpaint_cache::codec;
use inpaint_cache::config::Config;
use inpaint_cache::engine::{EngineError, EngineRequest, InpaintEngine, LoadOutcome};
use inpaint_cache::params::InpaintParams;
use inpaint_cache::service::{InpaintJob, InpaintService, ServiceError};
use std::path::PathBuf;
use tempfile::tempdir;

/// Engine double that records what it was asked to do.
#[derive(Default)]
struct RecordingEngine {
    loaded: bool,
    degrade: bool,
    fail: bool,
    calls: usize,
    last_size: Option<(u32, u32)>,
    last_negative_prompt: Option<String>,
}

impl InpaintEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn device(&self) -> &str {
        "cpu"
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn supports_controlnet(&self) -> bool {
        !self.degrade
    }

    fn load(&mut self) -> Result<LoadOutcome, EngineError> {
        self.loaded = true;
        if self.degrade {
            Ok(LoadOutcome::Degraded {
                reason: "no controlnet".to_string(),
            })
        } else {
            Ok(LoadOutcome::Ready)
        }
    }

    fn unload(&mut self) {
        self.loaded = false;
    }

    fn infer(&mut self, request: &EngineRequest<'_>) -> Result<RgbImage, EngineError> {
        if self.fail {
            return Err(EngineError::Inference("out of memory".to_string()));
        }
        self.calls += 1;
        self.last_size = Some(request.image.dimensions());
        self.last_negative_prompt = Some(request.negative_prompt.to_string());
        let (w, h) = request.image.dimensions();
        Ok(RgbImage::from_pixel(w, h, Rgb([0, 255, 0])))
    }
}

fn job(root: Option<PathBuf>, seed: u64) -> InpaintJob {
    let image = RgbImage::from_pixel(512, 512, Rgb([90, 90, 90]));
    let mut mask = GrayImage::new(512, 512);
    for y in 206..306 {
        for x in 206..306 {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    InpaintJob {
        image: DynamicImage::ImageRgb8(image),
        mask: DynamicImage::ImageLuma8(mask),
        prompt: "clean background".to_string(),
        params: InpaintParams {
            seed: Some(seed),
            ..InpaintParams::default()
        },
        cache_root: root,
    }
}

#[test]
fn test_repeat_request_skips_engine() {
    let project = tempdir().unwrap();
    let service = InpaintService::new(Config::default());
    let mut engine = RecordingEngine::default();

    let first = service
        .inpaint(&job(Some(project.path().to_path_buf()), 42), &mut engine)
        .unwrap();
    let second = service
        .inpaint(&job(Some(project.path().to_path_buf()), 42), &mut engine)
        .unwrap();
    let third = service
        .inpaint(&job(Some(project.path().to_path_buf()), 43), &mut engine)
        .unwrap();

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert!(!third.cache_hit);
    assert_eq!(engine.calls, 2);
    assert_eq!(first.result, second.result);
    assert_ne!(first.key, third.key);
}

#[test]
fn test_engine_sees_bounded_input_and_caller_gets_original_size() {
    let service = InpaintService::new(Config::default());
    let mut engine = RecordingEngine::default();
    let mut request = job(None, 1);
    request.image = DynamicImage::ImageRgb8(RgbImage::new(1001, 767));
    request.mask = DynamicImage::ImageLuma8(GrayImage::new(1001, 767));

    let outcome = service.inpaint(&request, &mut engine).unwrap();
    assert_eq!(engine.last_size, Some((1000, 760)));
    assert_eq!((outcome.width(), outcome.height()), (1001, 767));
}

#[test]
fn test_degraded_load_still_serves() {
    let service = InpaintService::new(Config::default());
    let mut engine = RecordingEngine {
        degrade: true,
        ..RecordingEngine::default()
    };
    let outcome = service.inpaint(&job(None, 1), &mut engine).unwrap();
    assert!(engine.loaded);
    assert!(!engine.supports_controlnet());
    assert_eq!(outcome.width(), 512);
}

#[test]
fn test_engine_failure_is_not_cached() {
    let project = tempdir().unwrap();
    let service = InpaintService::new(Config::default());
    let mut failing = RecordingEngine {
        fail: true,
        ..RecordingEngine::default()
    };

    let err = service
        .inpaint(&job(Some(project.path().to_path_buf()), 42), &mut failing)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Engine(_)));
    assert!(!project.path().join("_AI_OUT").exists());

    let mut working = RecordingEngine::default();
    let outcome = service
        .inpaint(&job(Some(project.path().to_path_buf()), 42), &mut working)
        .unwrap();
    assert!(!outcome.cache_hit);
}

#[test]
fn test_configured_negative_prompt_reaches_engine() {
    let service = InpaintService::new(Config {
        default_negative_prompt: "text, logo".to_string(),
        ..Config::default()
    });
    let mut engine = RecordingEngine::default();
    service.inpaint(&job(None, 1), &mut engine).unwrap();
    assert_eq!(engine.last_negative_prompt.as_deref(), Some("text, logo"));

    let mut explicit = job(None, 1);
    explicit.params.negative_prompt = "people".to_string();
    service.inpaint(&explicit, &mut engine).unwrap();
    assert_eq!(engine.last_negative_prompt.as_deref(), Some("people"));
}

#[test]
fn test_negative_prompt_changes_key() {
    let service = InpaintService::new(Config::default());
    let plain = service.resolve(&job(None, 1)).unwrap();
    let mut other = job(None, 1);
    other.params.negative_prompt = "people".to_string();
    assert_ne!(plain.key, service.resolve(&other).unwrap().key);
}

#[test]
fn test_clear_cache_forces_recompute() {
    let project = tempdir().unwrap();
    let service = InpaintService::new(Config::default());
    let mut engine = RecordingEngine::default();
    let request = job(Some(project.path().to_path_buf()), 42);

    service.inpaint(&request, &mut engine).unwrap();
    service.clear_cache(project.path()).unwrap();
    let outcome = service.inpaint(&request, &mut engine).unwrap();

    assert!(!outcome.cache_hit);
    assert_eq!(engine.calls, 2);
}

#[test]
fn test_json_bundle_round_trip_through_service() {
    let project = tempdir().unwrap();
    let image = codec::encode_png(&RgbImage::from_pixel(64, 48, Rgb([1, 2, 3]))).unwrap();
    let mask = codec::encode_png(&RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]))).unwrap();
    let body = serde_json::json!({
        "image": image,
        "mask": mask,
        "prompt": "sky",
        "seed": 9,
        "cache_dir": project.path(),
    });

    let service = InpaintService::new(Config::default());
    let mut engine = RecordingEngine::default();

    let request: InpaintRequest = serde_json::from_value(body.clone()).unwrap();
    let outcome = service
        .inpaint(&request.into_job().unwrap(), &mut engine)
        .unwrap();
    let response = InpaintResponse::from_outcome(&outcome).unwrap();
    assert!(!response.cached);
    assert_eq!((response.width, response.height), (64, 48));

    let request: InpaintRequest = serde_json::from_value(body).unwrap();
    let outcome = service
        .inpaint(&request.into_job().unwrap(), &mut engine)
        .unwrap();
    let cached = InpaintResponse::from_outcome(&outcome).unwrap();
    assert!(cached.cached);
    assert_eq!(cached.result, response.result);
    assert_eq!(cached.key, response.key);
}

#[test]
fn test_undecodable_payload_is_validation_error() {
    let body = serde_json::json!({ "image": "aGVsbG8=", "mask": "aGVsbG8=" });
    let request: InpaintRequest = serde_json::from_value(body).unwrap();
    assert!(request.into_job().is_err());
}
