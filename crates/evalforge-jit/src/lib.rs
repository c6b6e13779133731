//! EvalForge JIT - native compilation of scalar expressions via Cranelift
//!
//! Two pieces work together:
//! - [`detect_issues`] decides whether an expression can be compiled at all.
//!   Anything containing a tensor operation cannot.
//! - [`CompiledFunction`] turns an issue-free expression into machine code
//!   callable with one argument per parameter ([`PassParams::Separate`]) or
//!   with a pointer to a parameter array ([`PassParams::Array`]).
//!
//! Compilation is safe from many threads at once. The only shared state is
//! a per-configuration ISA cache and a pool of reusable Cranelift contexts.
//!
//! # Examples
//!
//! ```
//! use evalforge_core::Function;
//! use evalforge_jit::{detect_issues, CompiledFunction, PassParams};
//!
//! let function = Function::parse("x * x + y");
//! assert!(!detect_issues(&function).has_issues());
//!
//! let compiled = CompiledFunction::new(&function, PassParams::Array);
//! let f = compiled.get_array_function().unwrap();
//! assert_eq!(f.call(&[3.0, 1.0]), 10.0);
//!
//! let tensor = Function::parse("sum(tensor(x[3])(x))");
//! assert!(detect_issues(&tensor).has_issues());
//! ```

mod backend;
mod compiled;
mod compiler;
mod issues;
mod libcalls;

#[cfg(test)]
mod tests;

pub use compiled::{
    ArrayFn, CompiledFunction, Params, PassParams, SeparateArity, SeparateFn, MAX_SEPARATE_PARAMS,
};
pub use issues::{detect_issues, FunctionIssues};
