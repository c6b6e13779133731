use super::*;

#[test]
fn test_scalar_expressions_compile() {
    let engine = DefaultTensorEngine::new();
    for pass_params in [PassParams::Separate, PassParams::Array] {
        let prepared = prepare(&["a", "b", "c"], "if(a < b, b * c, a - c)", pass_params, &engine)
            .unwrap();
        assert!(prepared.is_native());
        assert_eq!(prepared.num_params(), 3);
        assert_eq!(prepared.eval(&[1.0, 2.0, 3.0]).unwrap(), 6.0);
        assert_eq!(prepared.eval(&[5.0, 2.0, 3.0]).unwrap(), 2.0);
    }
}

#[test]
fn test_tensor_expressions_are_interpreted() {
    let engine = SimpleTensorEngine::new();
    let prepared = prepare(
        &["a"],
        "reduce(tensor(x[2],y[2])(x+y+a), max)",
        PassParams::Separate,
        &engine,
    )
    .unwrap();
    assert!(!prepared.is_native());
    assert_eq!(prepared.eval(&[10.0]).unwrap(), 12.0);
}

#[test]
fn test_every_separate_arity_dispatches() {
    let names = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
    let values: Vec<f64> = (1..=10).map(f64::from).collect();
    let engine = DefaultTensorEngine::new();
    for n in 0..=10 {
        let text = if n == 0 {
            "42".to_string()
        } else {
            names[..n].join("+")
        };
        let prepared = prepare(&names[..n], &text, PassParams::Separate, &engine).unwrap();
        let expected = if n == 0 {
            42.0
        } else {
            values[..n].iter().sum()
        };
        assert_eq!(prepared.eval(&values).unwrap(), expected, "{text}");
    }
}

#[test]
fn test_parse_errors_are_reported() {
    let engine = DefaultTensorEngine::new();
    let err = prepare(&["a"], "a +", PassParams::Array, &engine).err().unwrap();
    assert!(matches!(err, PrepareError::Parse(_)));
    let err = prepare(&["a"], "b", PassParams::Array, &engine).err().unwrap();
    assert!(matches!(err, PrepareError::Parse(_)));
}

#[test]
fn test_separate_parameter_limit() {
    let names: Vec<String> = (0..11).map(|i| format!("p{i}")).collect();
    let text = names.join("+");
    let engine = DefaultTensorEngine::new();
    let err = prepare(&names, &text, PassParams::Separate, &engine).err().unwrap();
    assert_eq!(err, PrepareError::TooManyParams { got: 11, max: 10 });
    assert_eq!(
        err.to_string(),
        "PassParams::Separate supports at most 10 parameters, got 11"
    );

    let prepared = prepare(&names, &text, PassParams::Array, &engine).unwrap();
    let values: Vec<f64> = (0..11).map(f64::from).collect();
    assert_eq!(prepared.eval(&values).unwrap(), 55.0);
}

#[test]
fn test_too_few_values() {
    let engine = DefaultTensorEngine::new();
    let native = prepare(&["a", "b"], "a+b", PassParams::Separate, &engine).unwrap();
    assert_eq!(
        native.eval(&[1.0]).unwrap_err(),
        EvalError::ParamCount {
            expected: 2,
            got: 1
        }
    );
    let interpreted =
        prepare(&["a", "b"], "sum(tensor(x[2])(a+b))", PassParams::Array, &engine).unwrap();
    assert!(matches!(
        interpreted.eval(&[1.0]),
        Err(EvalError::ParamCount { .. })
    ));
}

#[test]
fn test_tensor_results_are_not_doubles() {
    let engine = DefaultTensorEngine::new();
    let prepared = prepare(&["a"], "tensor(x[2])(x+a)", PassParams::Array, &engine).unwrap();
    assert!(matches!(prepared.eval(&[1.0]), Err(EvalError::ExpectedDouble(_))));
}

#[test]
fn test_empty_native_handle_is_nan() {
    let prepared = Prepared::Native(CompiledFunction::default());
    assert!(prepared.eval(&[]).unwrap().is_nan());
}

#[test]
fn test_engine_selection() {
    assert_eq!(engine(EngineKind::Reference).name(), "simple");
    assert_eq!(engine(EngineKind::Production).name(), "default");
    assert_eq!(engine(EvalConfig::default().engine).name(), "default");
}

#[test]
fn test_prepare_with_config() {
    let config = JitConfig {
        opt_level: OptLevel::None,
        verify: true,
    };
    let prepared = prepare_with_config(
        &["a"],
        "sqrt(a) * 2",
        PassParams::Array,
        engine(EngineKind::Reference),
        &config,
    )
    .unwrap();
    assert_eq!(prepared.eval(&[16.0]).unwrap(), 8.0);
}

#[test]
fn test_prepare_from_config_uses_configured_engine() {
    let reference = EvalConfig::from_toml_str(
        r#"
engine = "reference"

[jit]
opt_level = "none"
"#,
    )
    .unwrap();
    let tensor = prepare_from_config(&["a"], "sum(tensor(x[3])(x+a))", PassParams::Array, &reference)
        .unwrap();
    match &tensor {
        Prepared::Interpreted(interpreted) => assert_eq!(interpreted.engine().name(), "simple"),
        Prepared::Native(_) => panic!("tensor expression compiled"),
    }
    assert_eq!(tensor.eval(&[1.0]).unwrap(), 6.0);

    let native = prepare_from_config(&["a", "b"], "a^b", PassParams::Separate, &EvalConfig::default())
        .unwrap();
    assert!(native.is_native());
    assert_eq!(native.eval(&[2.0, 10.0]).unwrap(), 1024.0);
}

#[cfg(feature = "logging")]
#[test]
fn test_logging_init_is_idempotent() {
    logging::init();
    logging::init_with_level(tracing_subscriber::filter::LevelFilter::TRACE);
    assert!(logging::is_initialized());
    // Logging on the compile path must not disturb results.
    let prepared = prepare(&["a"], "a*a", PassParams::Array, engine(EngineKind::Production)).unwrap();
    assert_eq!(prepared.eval(&[3.0]).unwrap(), 9.0);
}
