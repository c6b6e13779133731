//! Capability classification: which expressions can be compiled natively.

use std::fmt;

use evalforge_core::{Function, Node, TensorNode};

/// Reasons an expression cannot be compiled, one per offending node in
/// pre-order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionIssues {
    pub list: Vec<String>,
}

impl FunctionIssues {
    pub fn has_issues(&self) -> bool {
        !self.list.is_empty()
    }
}

impl fmt::Display for FunctionIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.list.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            f.write_str(issue)?;
        }
        Ok(())
    }
}

/// Walks the whole tree and reports every tensor operation, including those
/// nested inside other tensor operands and lambda bodies.
pub fn detect_issues(function: &Function) -> FunctionIssues {
    let mut issues = FunctionIssues::default();
    collect(function.root(), &mut issues.list);
    issues
}

fn collect(node: &Node, out: &mut Vec<String>) {
    match node {
        Node::Number(_) | Node::Symbol(_) => {}
        Node::Unary(_, child) | Node::In(child, _) => collect(child, out),
        Node::Binary(_, l, r) => {
            collect(l, out);
            collect(r, out);
        }
        Node::If {
            cond,
            true_expr,
            false_expr,
        } => {
            collect(cond, out);
            collect(true_expr, out);
            collect(false_expr, out);
        }
        Node::Tensor(tensor) => {
            out.push(format!("unsupported node type: {}", tensor.kind()));
            match tensor {
                TensorNode::Sum { child, .. }
                | TensorNode::Reduce { child, .. }
                | TensorNode::Rename { child, .. } => collect(child, out),
                TensorNode::Map { child, lambda } => {
                    collect(child, out);
                    collect(&lambda.body, out);
                }
                TensorNode::Join { lhs, rhs, lambda } => {
                    collect(lhs, out);
                    collect(rhs, out);
                    collect(&lambda.body, out);
                }
                TensorNode::Create { lambda, .. } => collect(&lambda.body, out),
                TensorNode::Concat { lhs, rhs, .. } => {
                    collect(lhs, out);
                    collect(rhs, out);
                }
            }
        }
    }
}
