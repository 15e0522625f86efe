//! Integration tests for the layered configuration stack: defaults, TOML
//! file, `INPAINT_CACHE_*` environment overrides, and validation.

use inpaint_cache::config::Config;
use std::fs;
use std::sync::Mutex;
use tempfile::tempdir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Clear all INPAINT_CACHE_* environment variables to avoid interference.
fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("INPAINT_CACHE_") {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn test_missing_file_yields_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let config = Config::try_load_from_path(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_load_from_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
max_dimension = 768
paranoid = true
input_dir_name = ".inpaint-in"

[engine]
program = "sd-inpaint"
args = ["--fp16"]
"#,
    )
    .unwrap();

    let config = Config::try_load_from_path(&path).unwrap();
    assert_eq!(config.max_dimension, 768);
    assert!(config.paranoid);
    assert_eq!(config.input_dir_name, ".inpaint-in");
    assert_eq!(config.output_dir_name, "_AI_OUT");
    assert_eq!(config.engine.program.to_str(), Some("sd-inpaint"));
    assert_eq!(config.engine.args, vec!["--fp16"]);
}

#[test]
fn test_env_overrides_file() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "max_dimension = 768\n").unwrap();

    std::env::set_var("INPAINT_CACHE_MAX_DIMENSION", "512");
    std::env::set_var("INPAINT_CACHE_ENGINE__DEVICE", "cuda");
    let config = Config::try_load_from_path(&path);
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.max_dimension, 512);
    assert_eq!(config.engine.device, "cuda");
}

#[test]
fn test_malformed_file_is_an_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "max_dimension = \"huge\"\n").unwrap();

    assert!(Config::try_load_from_path(&path).is_err());
    assert_eq!(Config::load_from_path(&path), Config::default());
}

#[test]
fn test_invalid_value_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "key_prefix = \"../escape\"\n").unwrap();

    let err = Config::try_load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("key_prefix"));
}

#[test]
fn test_unknown_keys_are_tolerated() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "max_dimensoin = 10\nparanoid = true\n").unwrap();

    let config = Config::try_load_from_path(&path).unwrap();
    assert!(config.paranoid);
    assert_eq!(config.max_dimension, 1024);
}

#[test]
fn test_save_then_load() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = Config {
        cache_enabled: false,
        key_prefix: "studio".to_string(),
        ..Config::default()
    };
    config.save(&path).unwrap();

    assert_eq!(Config::try_load_from_path(&path).unwrap(), config);
}
