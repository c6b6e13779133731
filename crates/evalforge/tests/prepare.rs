//! The whole conformance catalog, evaluated through `prepare`.

use evalforge::{engine, prepare, EngineKind, PassParams, MAX_SEPARATE_PARAMS};
use evalforge_test::{is_same, is_unsupported, EvalSpec};

fn run_catalog(kind: EngineKind, pass_params: PassParams) -> usize {
    let spec = EvalSpec::all();
    let mut checked = 0;
    for case in spec.cases() {
        if pass_params == PassParams::Separate && case.param_names.len() > MAX_SEPARATE_PARAMS {
            continue;
        }
        let prepared = prepare(&case.param_names, &case.expression, pass_params, engine(kind))
            .unwrap_or_else(|err| panic!("{case}: {err}"));
        assert_eq!(prepared.is_native(), !is_unsupported(&case.expression), "{case}");
        let actual = prepared
            .eval(&case.param_values)
            .unwrap_or_else(|err| panic!("{case}: {err}"));
        assert!(is_same(case.expected, actual, 1e-9, 1e-12), "{case}, got {actual}");
        checked += 1;
    }
    checked
}

#[test]
fn catalog_through_array_convention() {
    let spec_len = EvalSpec::all().len();
    assert_eq!(run_catalog(EngineKind::Production, PassParams::Array), spec_len);
}

#[test]
fn catalog_through_separate_convention() {
    assert!(run_catalog(EngineKind::Reference, PassParams::Separate) >= 1000);
}
