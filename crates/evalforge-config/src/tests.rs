//! Tests for configuration loading.

use super::*;

#[test]
fn test_toml_parsing() {
    let toml = r#"
        engine = "reference"

        [jit]
        opt_level = "none"
        verify = false

        [conformance]
        print_pass = true
        min_pass_count = 1500
        relative_epsilon = 1e-6
        parallel = true
    "#;

    let config = EvalConfig::from_toml_str(toml).unwrap();
    assert_eq!(config.engine, EngineKind::Reference);
    assert_eq!(config.jit.opt_level, OptLevel::None);
    assert!(!config.jit.verify);
    assert!(config.conformance.print_pass);
    assert!(config.conformance.print_fail);
    assert_eq!(config.conformance.min_pass_count, 1500);
    assert_eq!(config.conformance.relative_epsilon, 1e-6);
    assert_eq!(config.conformance.absolute_epsilon, 1e-12);
    assert!(config.conformance.parallel);
}

#[test]
fn test_yaml_parsing() {
    let yaml = r#"
        engine: production
        jit:
          opt_level: speed_and_size
        conformance:
          min_pass_count: 10
    "#;

    let config = EvalConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.engine, EngineKind::Production);
    assert_eq!(config.jit.opt_level, OptLevel::SpeedAndSize);
    assert_eq!(config.conformance.min_pass_count, 10);
}

#[test]
fn test_empty_toml_gives_defaults() {
    let config = EvalConfig::from_toml_str("").unwrap();
    assert_eq!(config, EvalConfig::default());
    assert_eq!(config.jit.opt_level, OptLevel::Speed);
    assert_eq!(config.conformance.min_pass_count, 1000);
}

#[test]
fn test_negative_epsilon_is_rejected() {
    let err = EvalConfig::from_toml_str(
        r#"
        [conformance]
        relative_epsilon = -1.0
    "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("relative_epsilon"));
}

#[test]
fn test_unknown_engine_is_rejected() {
    let err = EvalConfig::from_toml_str(r#"engine = "gpu""#).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn test_missing_file() {
    let err = EvalConfig::load("/nonexistent/evalforge.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_builder() {
    let config = EvalConfig::new()
        .with_opt_level(OptLevel::None)
        .with_engine(EngineKind::Reference)
        .with_min_pass_count(5);

    assert_eq!(config.jit.opt_level, OptLevel::None);
    assert_eq!(config.engine, EngineKind::Reference);
    assert_eq!(config.conformance.min_pass_count, 5);
    assert_eq!(OptLevel::SpeedAndSize.as_cranelift_str(), "speed_and_size");
}
