//! EvalForge - native compilation and tensor evaluation of ranking expressions
//!
//! Scalar expressions are compiled to machine code with Cranelift. Anything
//! using tensor operations is evaluated by an interpreter backed by a
//! pluggable [`TensorEngine`]. [`prepare`] picks the right path.
//!
//! # Example
//!
//! ```rust
//! use evalforge::prelude::*;
//!
//! let prepared = prepare(&["a", "b"], "max(a, b) + 1", PassParams::Array, engine(EngineKind::Production))
//!     .unwrap();
//! assert!(prepared.is_native());
//! assert_eq!(prepared.eval(&[2.0, 5.0]).unwrap(), 6.0);
//! ```

// Expression model
pub use evalforge_core::{
    Aggr, BinaryOp, DimensionSpec, Function, Lambda, LiteralSet, Node, ParseError, TensorNode,
    TensorOpKind, UnaryOp,
};

// Configuration
pub use evalforge_config::{
    ConfigError, ConformanceConfig, EngineKind, EvalConfig, JitConfig, OptLevel,
};

// Native compilation
pub use evalforge_jit::{
    detect_issues, ArrayFn, CompiledFunction, FunctionIssues, PassParams, SeparateFn,
    MAX_SEPARATE_PARAMS,
};

// Tensors and interpretation
pub use evalforge_tensor::{
    DefaultTensorEngine, EvalError, InterpretedFunction, SimpleTensorEngine, Tensor,
    TensorEngine, TensorError, TensorType, Value,
};

mod prepare;
pub use prepare::{
    engine, prepare, prepare_from_config, prepare_with_config, PrepareError, Prepared,
};

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use super::{engine, prepare, prepare_from_config, PrepareError, Prepared};
    pub use super::{EngineKind, EvalConfig, Function, PassParams};
    pub use super::{DefaultTensorEngine, SimpleTensorEngine, TensorEngine, Value};
}
