//! Configuration builder and value-object tests

use http_testbed::server::axum::DEFAULT_STOP_TIMEOUT;
use http_testbed::{AxumConfig, ConfigError, FnHook, HyperConfig, ServerConfig};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn test_server_config_defaults() {
    let config = ServerConfig::default();

    assert_eq!(config.path(), "/");
    assert_eq!(config.static_root(), Path::new("public"));
    assert_eq!(config.port(), 0);
    assert!(config.overlays().is_empty());
    assert!(config.env().is_empty());
    assert!(config.hooks().is_empty());
    assert!(config.descriptor().is_none());
}

#[test]
fn test_server_config_builder_collects_everything() {
    let config = ServerConfig::builder()
        .path("/app")
        .static_root("assets")
        .overlay("extra-a")
        .overlay("extra-b")
        .port(8080)
        .env("APP_MODE", "test")
        .env("APP_REGION", "eu")
        .descriptor("fixtures/routes.toml")
        .build()
        .unwrap();

    assert_eq!(config.path(), "/app");
    assert_eq!(config.static_root(), Path::new("assets"));
    assert_eq!(
        config.overlays(),
        &[Path::new("extra-a").to_path_buf(), Path::new("extra-b").to_path_buf()]
    );
    assert_eq!(config.port(), 8080);
    assert_eq!(config.env().get("APP_MODE").unwrap(), "test");
    assert_eq!(config.env().len(), 2);
    assert_eq!(
        config.descriptor().unwrap(),
        Path::new("fixtures/routes.toml")
    );
}

#[test]
fn test_blank_path_is_rejected() {
    let result = ServerConfig::builder().path("  ").build();
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_path_without_leading_slash_is_rejected() {
    let result = ServerConfig::builder().path("app").build();
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_blank_env_name_is_rejected() {
    let result = ServerConfig::builder().env("   ", "x").build();
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_identical_configs_are_equal_and_hash_equal() {
    let build = || {
        ServerConfig::builder()
            .path("/api")
            .port(9000)
            .env("A", "1")
            .build()
            .unwrap()
    };
    let a = build();
    let b = build();

    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));
}

#[test]
fn test_configs_differ_by_any_field() {
    let base = ServerConfig::builder().port(9000).build().unwrap();

    let other_port = ServerConfig::builder().port(9001).build().unwrap();
    assert_ne!(base, other_port);

    let other_path = ServerConfig::builder()
        .port(9000)
        .path("/x")
        .build()
        .unwrap();
    assert_ne!(base, other_path);
}

#[test]
fn test_hooks_compare_by_identity() {
    let hook: Arc<dyn http_testbed::Hook> = Arc::new(FnHook::new(|| {}, || {}));

    let a = ServerConfig::builder()
        .hook_arc(Arc::clone(&hook))
        .build()
        .unwrap();
    let b = ServerConfig::builder()
        .hook_arc(Arc::clone(&hook))
        .build()
        .unwrap();
    assert_eq!(a, b);

    // A clone shares the hook instances, so it stays equal.
    assert_eq!(a.clone(), a);

    // A separately-created hook is a different identity.
    let c = ServerConfig::builder()
        .hook(FnHook::new(|| {}, || {}))
        .build()
        .unwrap();
    assert_ne!(a, c);
}

#[test]
fn test_axum_config_defaults() {
    let config = AxumConfig::default();

    assert_eq!(config.stop_timeout(), DEFAULT_STOP_TIMEOUT);
    assert_eq!(config.stop_timeout(), Duration::from_secs(30));
    assert!(config.stop_at_shutdown());
    assert!(config.base_dir().is_none());
}

#[test]
fn test_axum_config_rejects_zero_stop_timeout() {
    let result = AxumConfig::builder().stop_timeout(Duration::ZERO).build();
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_axum_config_builder_delegates_common_setters() {
    let config = AxumConfig::builder()
        .path("/app")
        .port(7070)
        .env("MODE", "it")
        .stop_timeout(Duration::from_secs(2))
        .stop_at_shutdown(false)
        .base_dir("webroot")
        .build()
        .unwrap();

    assert_eq!(config.common().path(), "/app");
    assert_eq!(config.common().port(), 7070);
    assert_eq!(config.common().env().get("MODE").unwrap(), "it");
    assert_eq!(config.stop_timeout(), Duration::from_secs(2));
    assert!(!config.stop_at_shutdown());
    assert_eq!(config.base_dir().unwrap(), Path::new("webroot"));
}

#[test]
fn test_axum_configs_equality() {
    let a = AxumConfig::builder()
        .port(8081)
        .stop_timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    let b = AxumConfig::builder()
        .port(8081)
        .stop_timeout(Duration::from_secs(10))
        .build()
        .unwrap();

    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));

    let c = AxumConfig::builder()
        .port(8081)
        .stop_timeout(Duration::from_secs(11))
        .build()
        .unwrap();
    assert_ne!(a, c);
}

#[test]
fn test_hyper_config_defaults_and_builder() {
    let config = HyperConfig::default();
    assert!(config.keep_alive());

    let config = HyperConfig::builder()
        .path("/h")
        .keep_alive(false)
        .build()
        .unwrap();
    assert_eq!(config.common().path(), "/h");
    assert!(!config.keep_alive());

    let invalid = HyperConfig::builder().path("h").build();
    assert!(matches!(invalid, Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_debug_output_reports_hook_count_only() {
    let config = ServerConfig::builder()
        .port(1234)
        .hook(FnHook::new(|| {}, || {}))
        .hook(FnHook::new(|| {}, || {}))
        .build()
        .unwrap();

    let rendered = format!("{config:?}");
    assert!(rendered.contains("port: 1234"));
    assert!(rendered.contains("hooks: 2"));
}
