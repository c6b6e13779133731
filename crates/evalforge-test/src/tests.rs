use evalforge_config::ConformanceConfig;
use evalforge_tensor::{
    CellFn, DefaultTensorEngine, Result as TensorResult, SimpleTensorEngine, TensorEngine, Value,
};

use super::*;

fn quiet() -> ConformanceConfig {
    ConformanceConfig {
        print_fail: false,
        ..ConformanceConfig::default()
    }
}

#[test]
fn test_catalog_is_large_and_consistent() {
    let spec = EvalSpec::all();
    assert!(spec.len() >= 1000, "only {} cases", spec.len());
    for case in spec.cases() {
        assert_eq!(case.param_names.len(), case.param_values.len(), "{case}");
        assert!(
            spec.expressions()
                .iter()
                .any(|e| e.expression == case.expression && e.param_names == case.param_names),
            "{case} has no catalog entry"
        );
    }
    assert!(spec.expressions().iter().any(|e| is_unsupported(&e.expression)));
    assert!(spec.expressions().iter().any(|e| !is_unsupported(&e.expression)));
}

#[test]
fn test_rule_sweeps_every_combination() {
    let mut spec = EvalSpec::new();
    spec.add_rule(&["a", "b"], "a-b", &[1.0, 2.0, 3.0], |p| p[0] - p[1]);
    assert_eq!(spec.len(), 9);
    assert_eq!(spec.expressions().len(), 1);
    let first = &spec.cases()[0];
    assert_eq!(first.param_values, vec![1.0, 1.0]);
    let last = &spec.cases()[8];
    assert_eq!(last.param_values, vec![3.0, 3.0]);
    assert_eq!(spec.cases()[1].param_values, vec![1.0, 2.0]);
    assert_eq!(spec.cases()[1].expected, -1.0);
}

#[test]
fn test_rule_without_params_adds_one_case() {
    let mut spec = EvalSpec::new();
    spec.add_rule(&[], "1+1", &[1.0, 2.0], |_| 2.0);
    assert_eq!(spec.len(), 1);
    assert_eq!(spec.cases()[0].expected, 2.0);
}

#[test]
fn test_case_display() {
    let case = EvalCase {
        param_names: vec!["a".into(), "b".into()],
        param_values: vec![1.0, 2.5],
        expression: "a+b".into(),
        expected: 3.5,
    };
    assert_eq!(case.as_string(), "a+b with a=1, b=2.5 = 3.5");
    let constant = EvalCase {
        param_names: vec![],
        param_values: vec![],
        expression: "7".into(),
        expected: 7.0,
    };
    assert_eq!(constant.to_string(), "7 = 7");
}

#[test]
fn test_is_same() {
    assert!(is_same(f64::NAN, f64::NAN, 0.0, 0.0));
    assert!(!is_same(f64::NAN, 1.0, 1.0, 1.0));
    assert!(!is_same(1.0, f64::NAN, 1.0, 1.0));
    assert!(is_same(f64::INFINITY, f64::INFINITY, 0.0, 0.0));
    assert!(!is_same(f64::INFINITY, f64::NEG_INFINITY, 1.0, 1.0));
    assert!(!is_same(f64::INFINITY, 1e308, 1.0, 1.0));
    assert!(is_same(0.0, -0.0, 0.0, 0.0));
    assert!(is_same(1.0, 1.0 + 1e-12, 1e-9, 0.0));
    assert!(!is_same(1.0, 1.001, 1e-9, 1e-12));
    assert!(is_same(1e-14, 0.0, 1e-9, 1e-12));
}

#[test]
fn test_is_unsupported() {
    assert!(is_unsupported("sum(tensor(x[3])(x))"));
    assert!(is_unsupported("  reduce(a,max)"));
    assert!(is_unsupported("tensor(x[2])(x)"));
    assert!(is_unsupported("concat(a,b,x)"));
    assert!(!is_unsupported("summary+1"));
    assert!(!is_unsupported("a+sum(a)"));
    assert!(!is_unsupported("mapped"));
    assert!(!is_unsupported("if(a,b,c)"));
}

#[test]
fn test_conformance_on_small_catalog() {
    let mut spec = EvalSpec::new();
    spec.add_rule(&["a", "b"], "a*b+1", &[0.0, 2.0], |p| p[0] * p[1] + 1.0);
    spec.add_rule(&["a"], "sum(tensor(x[2])(x*a))", &[1.0, 4.0], |p| p[0]);
    let engine = SimpleTensorEngine::new();
    let report = EvalConformance::new(&engine, quiet()).run(&spec);
    assert_eq!(report.pass_count, 6);
    assert_eq!(report.native_count, 4);
    assert_eq!(report.interpreted_count, 2);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert!(report.is_conformant(6));
    assert!(!report.is_conformant(7));
}

#[test]
fn test_conformance_reports_mismatches_without_aborting() {
    let mut spec = EvalSpec::new();
    spec.add_case(&["a"], &[2.0], "a*a", 5.0);
    spec.add_case(&["a"], &[2.0], "a+a", 4.0);
    let engine = DefaultTensorEngine::new();
    let report = EvalConformance::new(&engine, quiet()).run(&spec);
    assert_eq!(report.pass_count, 1);
    assert_eq!(report.fail_count, 1);
    match &report.failures[0] {
        Failure::Mismatch { actual, path, .. } => {
            assert_eq!(*actual, 4.0);
            assert_eq!(*path, EvalPath::Native);
        }
        other => panic!("unexpected failure {other:?}"),
    }
    assert!(!report.is_conformant(1));
}

#[test]
fn test_conformance_counts_classification_mismatches() {
    let mut spec = EvalSpec::new();
    spec.add_case(&["a"], &[1.0], "a+sum(tensor(x[2])(x))", 2.0);
    let engine = DefaultTensorEngine::new();
    let report = EvalConformance::new(&engine, quiet()).run(&spec);
    assert_eq!(report.classification_mismatches, 1);
    assert_eq!(report.pass_count, 1);
    assert!(matches!(
        report.failures[0],
        Failure::Classification {
            expected_issues: false,
            ..
        }
    ));
    assert!(!report.is_conformant(1));
}

#[test]
fn test_conformance_reports_parse_and_engine_errors() {
    let mut spec = EvalSpec::new();
    spec.add_case(&["a"], &[1.0], "a+", 1.0);
    spec.add_case(&["a"], &[1.0], "sum(tensor(x[2])(x+a))", 3.0);

    struct Nothing;
    impl TensorEngine for Nothing {
        fn name(&self) -> &'static str {
            "nothing"
        }
    }

    let report = EvalConformance::new(&Nothing, quiet()).run(&spec);
    assert_eq!(report.pass_count, 0);
    assert_eq!(report.fail_count, 2);
    assert!(matches!(report.failures[0], Failure::Parse { .. }));
    assert!(report
        .failures
        .iter()
        .any(|f| matches!(f, Failure::Error { message, .. } if message.contains("does not implement"))));
}

#[test]
fn test_parallel_run_matches_sequential() {
    let mut spec = EvalSpec::new();
    spec.add_binary_cases();
    spec.add_tensor_cases();
    let engine = DefaultTensorEngine::new();
    let sequential = EvalConformance::new(&engine, quiet()).run(&spec);
    let parallel = EvalConformance::new(
        &engine,
        ConformanceConfig {
            parallel: true,
            ..quiet()
        },
    )
    .run(&spec);
    assert_eq!(sequential, parallel);
    assert!(parallel.is_conformant(spec.len()));
}

#[test]
fn test_tensor_conformance_of_both_engines() {
    let engines: [&dyn TensorEngine; 3] = [
        &SimpleTensorEngine::new(),
        &DefaultTensorEngine::new(),
        &DefaultTensorEngine::new().with_parallel_threshold(1),
    ];
    for engine in engines {
        let report = TensorConformance::new(engine).with_rounds(16).run_all_tests();
        assert!(report.is_conformant(), "{}: {:?}", engine.name(), report.failures);
    }
}

#[test]
fn test_tensor_conformance_detects_a_broken_engine() {
    struct OffByOne(SimpleTensorEngine);
    impl TensorEngine for OffByOne {
        fn name(&self) -> &'static str {
            "off-by-one"
        }

        fn map(&self, value: &Value, f: CellFn<'_>) -> TensorResult<Value> {
            self.0.map(value, &|v| f(v) + 1.0)
        }
    }

    let report = TensorConformance::new(&OffByOne(SimpleTensorEngine::new()))
        .with_seed(3)
        .with_rounds(4)
        .run_all_tests();
    assert!(!report.is_conformant());
    assert!(report.failures.iter().any(|f| f.starts_with("map doubles each cell")));
    // Everything but map is unimplemented.
    assert!(report.failures.iter().any(|f| f.contains("does not implement join")));
}
