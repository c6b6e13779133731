//! Runs the [`EvalSpec`] catalog through the classify-then-compile-or-
//! interpret pipeline and counts what matches.
//!
//! Mismatches are collected into a [`ConformanceReport`]; the harness never
//! panics on a wrong result.

use std::fmt;

use evalforge_config::{ConformanceConfig, EvalConfig, JitConfig};
use evalforge_core::{Function, TensorOpKind};
use evalforge_jit::{detect_issues, CompiledFunction, PassParams};
use evalforge_tensor::{InterpretedFunction, TensorEngine};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::eval_spec::{EvalCase, EvalExpression, EvalSpec};

/// Compares an expected and an actual result.
///
/// NaN only matches NaN and infinities only match the same infinity. Finite
/// values match when within `absolute_epsilon` of each other or within
/// `relative_epsilon` of the larger magnitude.
pub fn is_same(expected: f64, actual: f64, relative_epsilon: f64, absolute_epsilon: f64) -> bool {
    if expected.is_nan() || actual.is_nan() {
        return expected.is_nan() && actual.is_nan();
    }
    if expected.is_infinite() || actual.is_infinite() {
        return expected == actual;
    }
    let diff = (expected - actual).abs();
    diff <= absolute_epsilon || diff <= relative_epsilon * expected.abs().max(actual.abs())
}

/// True when `expression` is written as a tensor operation at top level.
///
/// Such expressions are expected to be rejected by [`detect_issues`], and
/// every other expression in the catalog is expected to compile.
pub fn is_unsupported(expression: &str) -> bool {
    let expression = expression.trim_start();
    TensorOpKind::ALL.iter().any(|kind| {
        expression
            .strip_prefix(kind.name())
            .is_some_and(|rest| rest.starts_with('('))
    })
}

/// How a case was evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalPath {
    Native,
    Interpreted,
}

impl fmt::Display for EvalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalPath::Native => write!(f, "native"),
            EvalPath::Interpreted => write!(f, "interpreted"),
        }
    }
}

/// A single deviation from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// The result differs from the expected value.
    Mismatch {
        case: EvalCase,
        actual: f64,
        path: EvalPath,
    },

    /// The case could not be evaluated at all.
    Error { case: EvalCase, message: String },

    /// The expression does not parse.
    Parse { expression: String, message: String },

    /// The classifier disagrees with the expression's top-level form.
    Classification {
        expression: String,
        expected_issues: bool,
        issues: Vec<String>,
    },
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Mismatch { case, actual, path } => {
                write!(f, "{case} but {path} evaluation gave {actual}")
            }
            Failure::Error { case, message } => write!(f, "{case} failed: {message}"),
            Failure::Parse {
                expression,
                message,
            } => write!(f, "'{expression}' does not parse: {message}"),
            Failure::Classification {
                expression,
                expected_issues,
                issues,
            } => {
                if *expected_issues {
                    write!(f, "'{expression}' should not be compilable but has no issues")
                } else {
                    write!(f, "'{expression}' should be compilable but has issues: {issues:?}")
                }
            }
        }
    }
}

/// Outcome of a conformance run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConformanceReport {
    pub pass_count: usize,
    pub fail_count: usize,
    pub native_count: usize,
    pub interpreted_count: usize,
    pub classification_mismatches: usize,
    pub failures: Vec<Failure>,
}

impl ConformanceReport {
    /// No failures of any kind and at least `min_pass` passing cases.
    pub fn is_conformant(&self, min_pass: usize) -> bool {
        self.fail_count == 0 && self.classification_mismatches == 0 && self.pass_count >= min_pass
    }
}

enum Outcome {
    Pass(EvalPath),
    Fail(Failure),
}

/// Evaluates the catalog with the native compiler where possible and the
/// injected engine everywhere else.
pub struct EvalConformance<'e> {
    engine: &'e dyn TensorEngine,
    config: ConformanceConfig,
    jit: JitConfig,
}

impl<'e> EvalConformance<'e> {
    pub fn new(engine: &'e dyn TensorEngine, config: ConformanceConfig) -> Self {
        Self {
            engine,
            config,
            jit: JitConfig::default(),
        }
    }

    /// Takes both the conformance and the compiler settings from `config`.
    pub fn from_config(engine: &'e dyn TensorEngine, config: &EvalConfig) -> Self {
        Self::new(engine, config.conformance.clone()).with_jit_config(config.jit)
    }

    pub fn with_jit_config(mut self, jit: JitConfig) -> Self {
        self.jit = jit;
        self
    }

    pub fn config(&self) -> &ConformanceConfig {
        &self.config
    }

    pub fn run(&self, spec: &EvalSpec) -> ConformanceReport {
        let mut report = ConformanceReport::default();

        for expression in spec.expressions() {
            if let Some(failure) = self.classify(expression) {
                if self.config.print_fail {
                    warn!(engine = self.engine.name(), "{failure}");
                }
                report.classification_mismatches += 1;
                report.failures.push(failure);
            }
        }

        let outcomes: Vec<Outcome> = if self.config.parallel {
            spec.cases().par_iter().map(|case| self.run_case(case)).collect()
        } else {
            spec.cases().iter().map(|case| self.run_case(case)).collect()
        };

        for (case, outcome) in spec.cases().iter().zip(outcomes) {
            match outcome {
                Outcome::Pass(path) => {
                    if self.config.print_pass {
                        info!(%path, "pass: {case}");
                    }
                    report.pass_count += 1;
                    match path {
                        EvalPath::Native => report.native_count += 1,
                        EvalPath::Interpreted => report.interpreted_count += 1,
                    }
                }
                Outcome::Fail(failure) => {
                    if self.config.print_fail {
                        warn!(engine = self.engine.name(), "{failure}");
                    }
                    report.fail_count += 1;
                    report.failures.push(failure);
                }
            }
        }

        info!(
            engine = self.engine.name(),
            pass = report.pass_count,
            fail = report.fail_count,
            native = report.native_count,
            interpreted = report.interpreted_count,
            classification_mismatches = report.classification_mismatches,
            "conformance run finished"
        );
        report
    }

    fn classify(&self, expression: &EvalExpression) -> Option<Failure> {
        let function = Function::parse_with_params(&expression.param_names, &expression.expression);
        if function.has_error() {
            // Reported once per case by run_case.
            return None;
        }
        let expected_issues = is_unsupported(&expression.expression);
        let issues = detect_issues(&function);
        if issues.has_issues() == expected_issues {
            return None;
        }
        Some(Failure::Classification {
            expression: expression.expression.clone(),
            expected_issues,
            issues: issues.list,
        })
    }

    fn run_case(&self, case: &EvalCase) -> Outcome {
        let function = Function::parse_with_params(&case.param_names, &case.expression);
        if let Some(error) = function.error() {
            return Outcome::Fail(Failure::Parse {
                expression: case.expression.clone(),
                message: error.to_string(),
            });
        }
        if function.num_params() != case.param_values.len() {
            return Outcome::Fail(Failure::Error {
                case: case.clone(),
                message: format!(
                    "expression has {} parameters, case supplies {}",
                    function.num_params(),
                    case.param_values.len()
                ),
            });
        }

        let (path, actual) = if detect_issues(&function).has_issues() {
            let interpreted = InterpretedFunction::new(function, self.engine);
            match interpreted.eval_double(&case.param_values) {
                Ok(value) => (EvalPath::Interpreted, value),
                Err(err) => {
                    return Outcome::Fail(Failure::Error {
                        case: case.clone(),
                        message: err.to_string(),
                    })
                }
            }
        } else {
            let compiled = CompiledFunction::with_config(&function, PassParams::Array, &self.jit);
            let value = match compiled.get_array_function() {
                Some(f) => f.call(&case.param_values),
                None => {
                    return Outcome::Fail(Failure::Error {
                        case: case.clone(),
                        message: "compiled function has no code".to_string(),
                    })
                }
            };
            (EvalPath::Native, value)
        };

        if is_same(
            case.expected,
            actual,
            self.config.relative_epsilon,
            self.config.absolute_epsilon,
        ) {
            Outcome::Pass(path)
        } else {
            Outcome::Fail(Failure::Mismatch {
                case: case.clone(),
                actual,
                path,
            })
        }
    }
}
