//! Shared conformance fixtures and harnesses for EvalForge crates.
//!
//! - [`eval_spec`] - the catalog of expressions with expected results
//! - [`conformance`] - runs the catalog through classification, native
//!   compilation and interpretation
//! - [`tensor_conformance`] - direct checks of a tensor engine against
//!   hand-computed results and the reference engine
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! evalforge-test = { workspace = true }
//! ```
//!
//! Then run the harness against an engine:
//!
//! ```no_run
//! use evalforge_config::ConformanceConfig;
//! use evalforge_tensor::DefaultTensorEngine;
//! use evalforge_test::{EvalConformance, EvalSpec};
//!
//! let engine = DefaultTensorEngine::new();
//! let report = EvalConformance::new(&engine, ConformanceConfig::default()).run(&EvalSpec::all());
//! assert!(report.is_conformant(1000));
//! ```

pub mod conformance;
pub mod eval_spec;
pub mod tensor_conformance;

#[cfg(test)]
mod tests;

pub use conformance::{
    is_same, is_unsupported, ConformanceReport, EvalConformance, EvalPath, Failure,
};
pub use eval_spec::{EvalCase, EvalExpression, EvalSpec};
pub use tensor_conformance::{TensorConformance, TensorReport};
