use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use inpaint_cache::cache::{CacheManager, CacheStore, ContentHasher, KEY_HEX_LEN};
use inpaint_cache::config::Config;
use inpaint_cache::params::{InpaintParams, ParamValue, Parameters};
use std::fs;
use tempfile::tempdir;

// =============================================================================
// Helper Functions
// =============================================================================

/// 512x512 gradient image with a centered 100x100 white mask.
fn scene() -> (DynamicImage, DynamicImage) {
    let image = RgbImage::from_fn(512, 512, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    let mut mask = GrayImage::new(512, 512);
    for y in 206..306 {
        for x in 206..306 {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    (DynamicImage::ImageRgb8(image), DynamicImage::ImageLuma8(mask))
}

fn seeded(seed: u64) -> InpaintParams {
    InpaintParams {
        seed: Some(seed),
        ..InpaintParams::default()
    }
}

fn fake_result(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([10, 200, 30]))
}

// =============================================================================
// Hit / Miss Scenarios
// =============================================================================

#[test]
fn test_miss_then_hit_then_new_seed_misses() {
    let project = tempdir().unwrap();
    let manager = CacheManager::for_project(project.path(), &Config::default());
    let (image, mask) = scene();

    let first = manager
        .resolve(&image, &mask, "clean background", &seeded(42))
        .unwrap();
    assert!(!first.is_hit());
    assert_eq!(first.inputs.image.dimensions(), (512, 512));

    let result = fake_result(512, 512);
    manager.commit(&first, &result).unwrap();

    let second = manager
        .resolve(&image, &mask, "clean background", &seeded(42))
        .unwrap();
    assert!(second.is_hit());
    assert_eq!(second.key, first.key);
    assert_eq!(second.cached.unwrap(), result);

    let other = manager
        .resolve(&image, &mask, "clean background", &seeded(43))
        .unwrap();
    assert_ne!(other.key, first.key);
    assert!(!other.is_hit());
}

#[test]
fn test_entry_layout_on_disk() {
    let project = tempdir().unwrap();
    let manager = CacheManager::for_project(project.path(), &Config::default());
    let (image, mask) = scene();

    let resolution = manager
        .resolve(&image, &mask, "clean background", &seeded(42))
        .unwrap();
    let result_path = manager.commit(&resolution, &fake_result(512, 512)).unwrap();

    let key = resolution.key.as_str();
    assert!(key.starts_with("inpaint_"));
    assert_eq!(resolution.key.digest().len(), KEY_HEX_LEN);

    let input_area = project.path().join("_AI_CACHE");
    let output_area = project.path().join("_AI_OUT");
    assert!(input_area.join(format!("{key}_input.png")).is_file());
    assert!(input_area.join(format!("{key}_mask.png")).is_file());
    assert!(input_area.join(format!("{key}_meta.json")).is_file());
    assert_eq!(result_path, output_area.join(format!("{key}_result.png")));
    assert!(result_path.is_file());
}

#[test]
fn test_metadata_records_request() {
    let project = tempdir().unwrap();
    let manager = CacheManager::for_project(project.path(), &Config::default());
    let (image, mask) = scene();

    let resolution = manager
        .resolve(&image, &mask, "clean background", &seeded(42))
        .unwrap();
    manager.commit(&resolution, &fake_result(512, 512)).unwrap();

    let meta = manager.store().metadata(&resolution.key).unwrap();
    assert_eq!(meta.key, resolution.key);
    assert_eq!(meta.prompt, "clean background");
    assert_eq!(meta.params.get("seed"), Some(&ParamValue::Int(42)));
    assert_eq!(meta.params.get("num_steps"), Some(&ParamValue::Int(30)));

    let raw = fs::read_to_string(manager.store().paths(&resolution.key).meta).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(json.get("created_at").is_some());
}

#[test]
fn test_lookup_never_creates_directories() {
    let project = tempdir().unwrap();
    let manager = CacheManager::for_project(project.path(), &Config::default());
    let (image, mask) = scene();

    manager
        .resolve(&image, &mask, "clean background", &seeded(42))
        .unwrap();
    assert!(!project.path().join("_AI_CACHE").exists());
    assert!(!project.path().join("_AI_OUT").exists());
}

// =============================================================================
// Failure Tolerance
// =============================================================================

#[test]
fn test_corrupt_result_is_a_miss() {
    let project = tempdir().unwrap();
    let manager = CacheManager::for_project(project.path(), &Config::default());
    let (image, mask) = scene();

    let resolution = manager.resolve(&image, &mask, "x", &seeded(1)).unwrap();
    let path = manager.commit(&resolution, &fake_result(512, 512)).unwrap();
    fs::write(&path, b"\x89PNG truncated").unwrap();

    let again = manager.resolve(&image, &mask, "x", &seeded(1)).unwrap();
    assert!(!again.is_hit());

    // A fresh commit repairs the entry.
    manager.commit(&again, &fake_result(512, 512)).unwrap();
    assert!(manager.resolve(&image, &mask, "x", &seeded(1)).unwrap().is_hit());
}

#[test]
fn test_inputs_without_result_is_a_miss() {
    let project = tempdir().unwrap();
    let manager = CacheManager::for_project(project.path(), &Config::default());
    let (image, mask) = scene();

    let resolution = manager.resolve(&image, &mask, "x", &seeded(1)).unwrap();
    let path = manager.commit(&resolution, &fake_result(512, 512)).unwrap();
    fs::remove_file(path).unwrap();

    assert!(!manager.resolve(&image, &mask, "x", &seeded(1)).unwrap().is_hit());
}

#[test]
fn test_paranoid_rejects_tampered_inputs() {
    let project = tempdir().unwrap();
    let config = Config {
        paranoid: true,
        ..Config::default()
    };
    let manager = CacheManager::for_project(project.path(), &config);
    let (image, mask) = scene();

    let resolution = manager.resolve(&image, &mask, "x", &seeded(1)).unwrap();
    manager.commit(&resolution, &fake_result(512, 512)).unwrap();
    assert!(manager.resolve(&image, &mask, "x", &seeded(1)).unwrap().is_hit());

    let input_path = manager.store().paths(&resolution.key).input;
    RgbImage::new(512, 512).save(&input_path).unwrap();
    assert!(!manager.resolve(&image, &mask, "x", &seeded(1)).unwrap().is_hit());
}

// =============================================================================
// Invalidation
// =============================================================================

#[test]
fn test_invalidate_clears_and_recreates() {
    let project = tempdir().unwrap();
    let manager = CacheManager::for_project(project.path(), &Config::default());
    let (image, mask) = scene();

    let resolution = manager.resolve(&image, &mask, "x", &seeded(1)).unwrap();
    manager.commit(&resolution, &fake_result(512, 512)).unwrap();
    fs::write(project.path().join("_AI_OUT").join("stray.txt"), b"x").unwrap();

    manager.invalidate().unwrap();

    let input_area = project.path().join("_AI_CACHE");
    let output_area = project.path().join("_AI_OUT");
    assert!(input_area.is_dir());
    assert!(output_area.is_dir());
    assert_eq!(fs::read_dir(&input_area).unwrap().count(), 0);
    assert_eq!(fs::read_dir(&output_area).unwrap().count(), 0);
    assert!(!manager.resolve(&image, &mask, "x", &seeded(1)).unwrap().is_hit());
}

#[test]
fn test_invalidate_missing_areas_is_ok() {
    let project = tempdir().unwrap();
    let store = CacheStore::new(project.path().join("in"), project.path().join("out"));
    store.invalidate().unwrap();
    assert!(project.path().join("in").is_dir());
}

#[test]
fn test_projects_are_isolated() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    let config = Config::default();
    let (image, mask) = scene();

    let manager_a = CacheManager::for_project(a.path(), &config);
    let resolution = manager_a.resolve(&image, &mask, "x", &seeded(1)).unwrap();
    manager_a.commit(&resolution, &fake_result(512, 512)).unwrap();

    let manager_b = CacheManager::for_project(b.path(), &config);
    let other = manager_b.resolve(&image, &mask, "x", &seeded(1)).unwrap();
    assert_eq!(other.key, resolution.key);
    assert!(!other.is_hit());
}

// =============================================================================
// Key Derivation
// =============================================================================

#[test]
fn test_equivalent_color_modes_share_a_key() {
    let project = tempdir().unwrap();
    let manager = CacheManager::for_project(project.path(), &Config::default());
    let (image, mask) = scene();

    let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
    let rgb_mask = DynamicImage::ImageRgb8(mask.to_rgb8());

    let a = manager.prepare(&image, &mask, "x", &seeded(1)).unwrap();
    let b = manager.prepare(&rgba, &rgb_mask, "x", &seeded(1)).unwrap();
    assert_eq!(a.key, b.key);
}

#[test]
fn test_transport_keys_do_not_affect_key() {
    let hasher = ContentHasher::default();
    let image = RgbImage::new(8, 8);
    let mask = GrayImage::new(8, 8);

    let plain: Parameters = [("steps", 30u32)].into_iter().collect();
    let mut routed = plain.clone();
    routed.insert("cache_dir", "/projects/a");

    assert_eq!(
        hasher.compute_key(&image, &mask, "x", &plain.canonical_bytes()),
        hasher.compute_key(&image, &mask, "x", &routed.canonical_bytes()),
    );
}

#[test]
fn test_seed_none_differs_from_zero() {
    let project = tempdir().unwrap();
    let manager = CacheManager::for_project(project.path(), &Config::default());
    let (image, mask) = scene();

    let none = manager
        .prepare(&image, &mask, "x", &InpaintParams::default())
        .unwrap();
    let zero = manager.prepare(&image, &mask, "x", &seeded(0)).unwrap();
    assert_ne!(none.key, zero.key);
}

#[test]
fn test_custom_prefix() {
    let project = tempdir().unwrap();
    let config = Config {
        key_prefix: "studio".to_string(),
        ..Config::default()
    };
    let manager = CacheManager::for_project(project.path(), &config);
    let (image, mask) = scene();
    let resolution = manager.prepare(&image, &mask, "x", &seeded(1)).unwrap();
    assert!(resolution.key.as_str().starts_with("studio_"));
}

#[test]
fn test_oversized_input_is_bounded() {
    let project = tempdir().unwrap();
    let manager = CacheManager::for_project(project.path(), &Config::default());
    let image = DynamicImage::ImageRgb8(RgbImage::new(2048, 1536));
    let mask = DynamicImage::ImageLuma8(GrayImage::new(2048, 1536));

    let resolution = manager.prepare(&image, &mask, "x", &seeded(1)).unwrap();
    assert_eq!(resolution.inputs.image.dimensions(), (1024, 768));
    assert_eq!(resolution.inputs.mask.dimensions(), (1024, 768));
    assert_eq!(resolution.inputs.original_size, (2048, 1536));
}

#[test]
fn test_hashed_parameter_change_changes_key() {
    let project = tempdir().unwrap();
    let manager = CacheManager::for_project(project.path(), &Config::default());
    let (image, mask) = scene();

    let base = manager.prepare(&image, &mask, "x", &seeded(1)).unwrap();
    let nudged = InpaintParams {
        strength: 0.86,
        ..seeded(1)
    };
    let changed = manager.prepare(&image, &mask, "x", &nudged).unwrap();
    assert_ne!(base.key, changed.key);
}
