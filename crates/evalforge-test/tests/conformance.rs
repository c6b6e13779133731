//! Full catalog against both engines.

use evalforge_config::{ConformanceConfig, EvalConfig, OptLevel};
use evalforge_tensor::{DefaultTensorEngine, SimpleTensorEngine, TensorEngine};
use evalforge_test::{EvalConformance, EvalSpec, TensorConformance};

fn assert_conformant(engine: &dyn TensorEngine, config: ConformanceConfig) {
    let spec = EvalSpec::all();
    let min_pass = config.min_pass_count;
    let report = EvalConformance::new(engine, config).run(&spec);
    let failures: Vec<String> = report.failures.iter().map(ToString::to_string).collect();
    assert!(
        report.is_conformant(min_pass),
        "{} engine: {} passed, {} failed, {} misclassified\n{}",
        engine.name(),
        report.pass_count,
        report.fail_count,
        report.classification_mismatches,
        failures.join("\n")
    );
    assert_eq!(report.pass_count, spec.len());
    assert!(report.native_count > 0);
    assert!(report.interpreted_count > 0);
}

#[test]
fn reference_engine_passes_the_catalog() {
    assert_conformant(&SimpleTensorEngine::new(), ConformanceConfig::default());
}

#[test]
fn production_engine_passes_the_catalog() {
    assert_conformant(
        &DefaultTensorEngine::new(),
        ConformanceConfig {
            parallel: true,
            ..ConformanceConfig::default()
        },
    );
}

#[test]
fn catalog_passes_at_every_opt_level() {
    let engine = DefaultTensorEngine::new();
    let spec = EvalSpec::all();
    for opt_level in [OptLevel::None, OptLevel::Speed, OptLevel::SpeedAndSize] {
        let config = EvalConfig::new().with_opt_level(opt_level);
        let report = EvalConformance::from_config(&engine, &config).run(&spec);
        assert!(
            report.is_conformant(config.conformance.min_pass_count),
            "{opt_level:?}: {:?}",
            report.failures.first()
        );
    }
}

#[test]
fn tensor_engines_conform() {
    for engine in [
        &SimpleTensorEngine::new() as &dyn TensorEngine,
        &DefaultTensorEngine::new(),
    ] {
        let report = TensorConformance::new(engine).run_all_tests();
        assert!(report.is_conformant(), "{}: {:?}", engine.name(), report.failures);
    }
}
