//! Tree-walking evaluation of expressions that may contain tensors.

use evalforge_core::operation::{from_bool, is_true};
use evalforge_core::{BinaryOp, Function, Lambda, Node, TensorNode};
use smallvec::SmallVec;
use tracing::debug;

use crate::engine::TensorEngine;
use crate::error::EvalError;
use crate::value::{TensorType, Value};

/// An expression evaluated by walking its tree, with tensor operations
/// delegated to an injected engine.
///
/// Parameters are always doubles. Arithmetic on tensors is carried out with
/// the engine's `map` and `join`. Conditions, `&&`, `||` and `in` probes must
/// evaluate to doubles, and lambda bodies must be scalar.
pub struct InterpretedFunction<'e> {
    function: Function,
    engine: &'e dyn TensorEngine,
}

impl<'e> InterpretedFunction<'e> {
    /// # Panics
    ///
    /// Panics if `function` has a parse error.
    pub fn new(function: Function, engine: &'e dyn TensorEngine) -> Self {
        assert!(
            !function.has_error(),
            "cannot interpret a function with a parse error: {:?}",
            function.error()
        );
        debug!(engine = engine.name(), num_params = function.num_params(), "interpreting function");
        Self { function, engine }
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn num_params(&self) -> usize {
        self.function.num_params()
    }

    pub fn engine(&self) -> &'e dyn TensorEngine {
        self.engine
    }

    /// Evaluates with `params[i]` bound to parameter `i`.
    ///
    /// # Errors
    ///
    /// `ParamCount` if too few parameters are given, `ExpectedDouble` if a
    /// tensor reaches a scalar-only position, and any engine error.
    pub fn eval(&self, params: &[f64]) -> Result<Value, EvalError> {
        if params.len() < self.num_params() {
            return Err(EvalError::ParamCount {
                expected: self.num_params(),
                got: params.len(),
            });
        }
        Scope {
            engine: self.engine,
            params,
        }
        .eval(self.function.root())
    }

    /// Like [`eval`](Self::eval), but the result must be a double.
    pub fn eval_double(&self, params: &[f64]) -> Result<f64, EvalError> {
        let value = self.eval(params)?;
        value
            .as_double()
            .ok_or_else(|| EvalError::ExpectedDouble(format!("result is {}", value.tensor_type())))
    }
}

struct Scope<'a> {
    engine: &'a dyn TensorEngine,
    params: &'a [f64],
}

impl Scope<'_> {
    fn eval(&self, node: &Node) -> Result<Value, EvalError> {
        match node {
            Node::Number(v) => Ok(Value::Double(*v)),
            Node::Symbol(idx) => self.params.get(*idx).map(|v| Value::Double(*v)).ok_or(
                EvalError::ParamCount {
                    expected: idx + 1,
                    got: self.params.len(),
                },
            ),
            Node::Unary(op, child) => match self.eval(child)? {
                Value::Double(a) => Ok(Value::Double(op.apply(a))),
                tensor => Ok(self.engine.map(&tensor, &|a| op.apply(a))?),
            },
            Node::Binary(op, l, r) if op.is_short_circuit() => {
                let lhs = is_true(self.double(l, "boolean operand")?);
                let decided = match op {
                    BinaryOp::And => !lhs,
                    _ => lhs,
                };
                if decided {
                    return Ok(Value::Double(from_bool(lhs)));
                }
                let rhs = self.double(r, "boolean operand")?;
                Ok(Value::Double(from_bool(is_true(rhs))))
            }
            Node::Binary(op, l, r) => {
                let lhs = self.eval(l)?;
                let rhs = self.eval(r)?;
                match (&lhs, &rhs) {
                    (Value::Double(a), Value::Double(b)) => Ok(Value::Double(op.apply(*a, *b))),
                    _ => Ok(self.engine.join(&lhs, &rhs, &|a, b| op.apply(a, b))?),
                }
            }
            Node::If {
                cond,
                true_expr,
                false_expr,
            } => {
                if is_true(self.double(cond, "if condition")?) {
                    self.eval(true_expr)
                } else {
                    self.eval(false_expr)
                }
            }
            Node::In(probe, set) => {
                let p = self.double(probe, "'in' probe")?;
                Ok(Value::Double(from_bool(set.contains(p))))
            }
            Node::Tensor(tensor) => self.tensor(tensor),
        }
    }

    fn double(&self, node: &Node, what: &str) -> Result<f64, EvalError> {
        match self.eval(node)? {
            Value::Double(v) => Ok(v),
            Value::Tensor(t) => Err(EvalError::ExpectedDouble(format!(
                "{what} is {}",
                t.tensor_type()
            ))),
        }
    }

    fn tensor(&self, node: &TensorNode) -> Result<Value, EvalError> {
        let engine = self.engine;
        let value = match node {
            TensorNode::Sum { child, dimension } => {
                engine.sum(&self.eval(child)?, dimension.as_deref())?
            }
            TensorNode::Map { child, lambda } => {
                check_scalar(lambda)?;
                let child = self.eval(child)?;
                engine.map(&child, &|a| call_lambda(lambda, &[a], self.params))?
            }
            TensorNode::Join { lhs, rhs, lambda } => {
                check_scalar(lambda)?;
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                engine.join(&lhs, &rhs, &|a, b| call_lambda(lambda, &[a, b], self.params))?
            }
            TensorNode::Reduce {
                child,
                aggr,
                dimensions,
            } => engine.reduce(&self.eval(child)?, *aggr, dimensions)?,
            TensorNode::Rename { child, from, to } => {
                engine.rename(&self.eval(child)?, from, to)?
            }
            TensorNode::Create { dimensions, lambda } => {
                check_scalar(lambda)?;
                let ty = TensorType::new(dimensions.clone())?;
                // Lambda parameters follow the written order; addresses follow
                // the sorted order of the type.
                let order: SmallVec<[usize; 4]> = dimensions
                    .iter()
                    .map(|d| dimensions.iter().filter(|o| o.name < d.name).count())
                    .collect();
                engine.create(&ty, &|address| {
                    let args: SmallVec<[f64; 4]> =
                        order.iter().map(|&k| address[k] as f64).collect();
                    call_lambda(lambda, &args, self.params)
                })?
            }
            TensorNode::Concat {
                lhs,
                rhs,
                dimension,
            } => engine.concat(&self.eval(lhs)?, &self.eval(rhs)?, dimension)?,
        };
        Ok(value)
    }
}

fn check_scalar(lambda: &Lambda) -> Result<(), EvalError> {
    if lambda.body.contains_tensor() {
        return Err(EvalError::ExpectedDouble(
            "lambda body contains a tensor operation".to_string(),
        ));
    }
    Ok(())
}

/// Evaluates a scalar lambda body with `args` followed by the enclosing
/// parameters.
fn call_lambda(lambda: &Lambda, args: &[f64], outer: &[f64]) -> f64 {
    let mut params: SmallVec<[f64; 8]> = SmallVec::with_capacity(args.len() + outer.len());
    params.extend_from_slice(args);
    params.extend_from_slice(outer);
    eval_scalar(&lambda.body, &params)
}

fn eval_scalar(node: &Node, params: &[f64]) -> f64 {
    match node {
        Node::Number(v) => *v,
        Node::Symbol(idx) => params.get(*idx).copied().unwrap_or(f64::NAN),
        Node::Unary(op, child) => op.apply(eval_scalar(child, params)),
        Node::Binary(BinaryOp::And, l, r) => {
            from_bool(is_true(eval_scalar(l, params)) && is_true(eval_scalar(r, params)))
        }
        Node::Binary(BinaryOp::Or, l, r) => {
            from_bool(is_true(eval_scalar(l, params)) || is_true(eval_scalar(r, params)))
        }
        Node::Binary(op, l, r) => op.apply(eval_scalar(l, params), eval_scalar(r, params)),
        Node::If {
            cond,
            true_expr,
            false_expr,
        } => {
            if is_true(eval_scalar(cond, params)) {
                eval_scalar(true_expr, params)
            } else {
                eval_scalar(false_expr, params)
            }
        }
        Node::In(probe, set) => from_bool(set.contains(eval_scalar(probe, params))),
        // Rejected by check_scalar before any lambda runs.
        Node::Tensor(_) => f64::NAN,
    }
}
