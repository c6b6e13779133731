//! EvalForge Tensor - tensor values, engines and the interpreter
//!
//! - [`Value`] is either a double or a dense [`Tensor`] with named indexed
//!   dimensions.
//! - [`TensorEngine`] is the pluggable strategy for the seven tensor
//!   operations. [`SimpleTensorEngine`] is the reference implementation and
//!   [`DefaultTensorEngine`] the production one.
//! - [`InterpretedFunction`] evaluates any expression by walking its tree
//!   and delegating tensor work to an engine.
//!
//! # Examples
//!
//! ```
//! use evalforge_core::Function;
//! use evalforge_tensor::{DefaultTensorEngine, InterpretedFunction};
//!
//! let engine = DefaultTensorEngine::new();
//! let function = Function::parse("sum(tensor(x[3])(x+a))");
//! let interpreted = InterpretedFunction::new(function, &engine);
//! assert_eq!(interpreted.eval_double(&[2.0]).unwrap(), 9.0);
//! ```

mod aggr;
pub mod default;
pub mod engine;
pub mod error;
pub mod interpreted;
pub mod simple;
pub mod value;


pub use default::DefaultTensorEngine;
pub use engine::{CellFn, CreateFn, JoinFn, TensorEngine};
pub use error::{EvalError, Result, TensorError};
pub use interpreted::InterpretedFunction;
pub use simple::SimpleTensorEngine;
pub use value::{Tensor, TensorType, Value};
