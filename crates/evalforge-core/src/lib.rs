//! EvalForge Core - expression trees and their scalar semantics
//!
//! This crate provides the shared vocabulary of EvalForge:
//! - [`Node`] trees for arithmetic, boolean, conditional, membership and tensor expressions
//! - [`Function`], a parsed expression with its parameter names
//! - [`operation`], the reference semantics of every scalar operator
//!
//! # Examples
//!
//! ```
//! use evalforge_core::{Function, Node};
//!
//! let function = Function::parse_with_params(&["a", "b"], "if(a < b, a, b) + 1");
//! assert!(!function.has_error());
//! assert_eq!(function.num_params(), 2);
//! assert!(!function.root().contains_tensor());
//! ```

pub mod error;
pub mod function;
pub mod node;
pub mod operation;
mod parse;


pub use error::ParseError;
pub use function::Function;
pub use node::{
    Aggr, BinaryOp, DimensionSpec, Lambda, LiteralSet, Node, TensorNode, TensorOpKind, UnaryOp,
};
