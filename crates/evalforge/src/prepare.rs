//! The gate between native compilation and interpretation.

use evalforge_config::{EngineKind, EvalConfig, JitConfig};
use evalforge_core::{Function, ParseError};
use evalforge_jit::{detect_issues, CompiledFunction, PassParams, MAX_SEPARATE_PARAMS};
use evalforge_tensor::{
    DefaultTensorEngine, EvalError, InterpretedFunction, SimpleTensorEngine, TensorEngine,
};
use thiserror::Error;
use tracing::debug;

/// Why an expression could not be prepared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("PassParams::Separate supports at most {max} parameters, got {got}")]
    TooManyParams { got: usize, max: usize },
}

/// An expression ready for repeated evaluation.
pub enum Prepared<'e> {
    /// Compiled to machine code.
    Native(CompiledFunction),
    /// Walked by the interpreter with an injected engine.
    Interpreted(InterpretedFunction<'e>),
}

impl Prepared<'_> {
    pub fn is_native(&self) -> bool {
        matches!(self, Prepared::Native(_))
    }

    pub fn num_params(&self) -> usize {
        match self {
            Prepared::Native(compiled) => compiled.num_params(),
            Prepared::Interpreted(interpreted) => interpreted.num_params(),
        }
    }

    /// Evaluates with `params[i]` bound to parameter `i`.
    ///
    /// An empty native handle evaluates to NaN.
    ///
    /// # Errors
    ///
    /// `ParamCount` if fewer than [`num_params`](Self::num_params) values are
    /// given, and any interpreter error.
    pub fn eval(&self, params: &[f64]) -> Result<f64, EvalError> {
        let compiled = match self {
            Prepared::Native(compiled) => compiled,
            Prepared::Interpreted(interpreted) => return interpreted.eval_double(params),
        };
        if params.len() < compiled.num_params() {
            return Err(EvalError::ParamCount {
                expected: compiled.num_params(),
                got: params.len(),
            });
        }
        let value = match compiled.pass_params() {
            Some(PassParams::Array) => compiled.get_array_function().map(|f| f.call(params)),
            Some(PassParams::Separate) => call_separate(compiled, params),
            None => None,
        };
        Ok(value.unwrap_or(f64::NAN))
    }
}

macro_rules! dispatch_separate {
    ($compiled:expr, $params:expr; $($n:literal)*) => {
        match $compiled.num_params() {
            $($n => {
                let args: [f64; $n] = std::array::from_fn(|i| $params[i]);
                $compiled.get_function::<$n>().map(|f| f.call(args))
            })*
            _ => None,
        }
    };
}

fn call_separate(compiled: &CompiledFunction, params: &[f64]) -> Option<f64> {
    dispatch_separate!(compiled, params; 0 1 2 3 4 5 6 7 8 9 10)
}

/// Parses `text` over `params` and prepares it for evaluation.
///
/// Expressions without issues are compiled with `pass_params`; everything
/// else is interpreted with `engine`.
///
/// # Errors
///
/// `Parse` if the text does not parse, `TooManyParams` if a compilable
/// expression has more parameters than `Separate` allows.
///
/// # Examples
///
/// ```
/// use evalforge::{prepare, DefaultTensorEngine, PassParams};
///
/// let engine = DefaultTensorEngine::new();
/// let native = prepare(&["a"], "a * 2", PassParams::Separate, &engine).unwrap();
/// assert!(native.is_native());
/// assert_eq!(native.eval(&[4.0]).unwrap(), 8.0);
///
/// let tensor = prepare(&["a"], "sum(tensor(x[3])(x+a))", PassParams::Array, &engine).unwrap();
/// assert!(!tensor.is_native());
/// assert_eq!(tensor.eval(&[2.0]).unwrap(), 9.0);
/// ```
pub fn prepare<'e, S: AsRef<str>>(
    params: &[S],
    text: &str,
    pass_params: PassParams,
    engine: &'e dyn TensorEngine,
) -> Result<Prepared<'e>, PrepareError> {
    prepare_with_config(params, text, pass_params, engine, &JitConfig::default())
}

/// Like [`prepare`], with explicit compiler settings.
pub fn prepare_with_config<'e, S: AsRef<str>>(
    params: &[S],
    text: &str,
    pass_params: PassParams,
    engine: &'e dyn TensorEngine,
    config: &JitConfig,
) -> Result<Prepared<'e>, PrepareError> {
    let function = Function::parse_with_params(params, text);
    if let Some(error) = function.error() {
        return Err(error.clone().into());
    }
    let issues = detect_issues(&function);
    if issues.has_issues() {
        debug!(engine = engine.name(), issues = ?issues.list, "interpreting expression");
        return Ok(Prepared::Interpreted(InterpretedFunction::new(function, engine)));
    }
    if pass_params == PassParams::Separate && function.num_params() > MAX_SEPARATE_PARAMS {
        return Err(PrepareError::TooManyParams {
            got: function.num_params(),
            max: MAX_SEPARATE_PARAMS,
        });
    }
    Ok(Prepared::Native(CompiledFunction::with_config(
        &function,
        pass_params,
        config,
    )))
}

/// Like [`prepare`], with the engine and compiler settings taken from
/// `config`.
///
/// ```
/// use evalforge::{prepare_from_config, EvalConfig, PassParams};
///
/// let config = EvalConfig::from_toml_str("engine = \"reference\"").unwrap();
/// let prepared = prepare_from_config(&["a"], "sum(tensor(x[2])(x*a))", PassParams::Array, &config)
///     .unwrap();
/// assert_eq!(prepared.eval(&[3.0]).unwrap(), 3.0);
/// ```
pub fn prepare_from_config<S: AsRef<str>>(
    params: &[S],
    text: &str,
    pass_params: PassParams,
    config: &EvalConfig,
) -> Result<Prepared<'static>, PrepareError> {
    prepare_with_config(params, text, pass_params, engine(config.engine), &config.jit)
}

static SIMPLE: SimpleTensorEngine = SimpleTensorEngine::new();
static DEFAULT: DefaultTensorEngine = DefaultTensorEngine::new();

/// The shared engine instance for a configured engine kind.
pub fn engine(kind: EngineKind) -> &'static dyn TensorEngine {
    match kind {
        EngineKind::Reference => &SIMPLE,
        EngineKind::Production => &DEFAULT,
    }
}
