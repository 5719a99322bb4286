//! Loading configuration from disk.

use std::path::PathBuf;

use nova_engine::config::EngineConfig;
use nova_engine::engine::Engine;
use nova_engine::EngineError;

fn scratch_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("nova-{}-{name}", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn saved_config_loads_back() {
    let mut config = EngineConfig::default();
    config.window.title = "scene".to_owned();
    config.graphics.exposure = 1.5;
    config.graphics.shadows.cascade_count = 2;
    config.graphics.shadows.split_fractions = vec![0.4, 1.0];
    let path = scratch_file("saved.json", &config.to_json_string().unwrap());

    let loaded = EngineConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let path = std::env::temp_dir().join("nova-config-that-does-not-exist.json");
    assert_eq!(
        EngineConfig::load_or_default(&path).unwrap(),
        EngineConfig::default()
    );
    assert!(matches!(EngineConfig::load(&path), Err(EngineError::Io(_))));
}

#[test]
fn broken_file_is_still_an_error() {
    let path = scratch_file("broken.json", r#"{ "window": { "width": "wide" } }"#);
    let result = EngineConfig::load_or_default(&path);
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(result, Err(EngineError::Config(_))));
}

#[test]
fn engine_rejects_invalid_config() {
    let mut config = EngineConfig::default();
    config.window.width = 0;
    assert!(matches!(
        Engine::new(config),
        Err(EngineError::Argument(_))
    ));
}
