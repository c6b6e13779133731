//! Expression trees produced by the parser.
//!
//! A [`Node`] tree is immutable once built. Scalar nodes (numbers, symbols,
//! operators, `if`, set membership) can be compiled to native code; tensor
//! nodes can only be evaluated by a tensor engine.

use std::fmt::{self, Write};
use std::ops::{Add, Div, Mul, Neg, Not, Sub};

/// An expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(f64),
    /// Parameter reference by index into the enclosing parameter list.
    Symbol(usize),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    If {
        cond: Box<Node>,
        true_expr: Box<Node>,
        false_expr: Box<Node>,
    },
    /// Membership of a probe value in a set of literal values.
    In(Box<Node>, LiteralSet),
    Tensor(TensorNode),
}

/// Single-operand operators and functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    Cos,
    Sin,
    Tan,
    Cosh,
    Sinh,
    Tanh,
    Acos,
    Asin,
    Atan,
    Exp,
    Log10,
    Log,
    Sqrt,
    Ceil,
    Fabs,
    Floor,
    IsNan,
    Relu,
    Sigmoid,
}

impl UnaryOp {
    /// Every unary operation that is written with call syntax.
    pub const CALLS: [UnaryOp; 19] = [
        UnaryOp::Cos,
        UnaryOp::Sin,
        UnaryOp::Tan,
        UnaryOp::Cosh,
        UnaryOp::Sinh,
        UnaryOp::Tanh,
        UnaryOp::Acos,
        UnaryOp::Asin,
        UnaryOp::Atan,
        UnaryOp::Exp,
        UnaryOp::Log10,
        UnaryOp::Log,
        UnaryOp::Sqrt,
        UnaryOp::Ceil,
        UnaryOp::Fabs,
        UnaryOp::Floor,
        UnaryOp::IsNan,
        UnaryOp::Relu,
        UnaryOp::Sigmoid,
    ];

    /// Operator symbol or function name.
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Cos => "cos",
            UnaryOp::Sin => "sin",
            UnaryOp::Tan => "tan",
            UnaryOp::Cosh => "cosh",
            UnaryOp::Sinh => "sinh",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Acos => "acos",
            UnaryOp::Asin => "asin",
            UnaryOp::Atan => "atan",
            UnaryOp::Exp => "exp",
            UnaryOp::Log10 => "log10",
            UnaryOp::Log => "log",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Fabs => "fabs",
            UnaryOp::Floor => "floor",
            UnaryOp::IsNan => "isNan",
            UnaryOp::Relu => "relu",
            UnaryOp::Sigmoid => "sigmoid",
        }
    }

    /// Looks up a unary function by its call name.
    pub fn from_call(name: &str) -> Option<Self> {
        Self::CALLS.iter().copied().find(|op| op.name() == name)
    }

    fn is_call(self) -> bool {
        !matches!(self, UnaryOp::Neg | UnaryOp::Not)
    }
}

/// Two-operand operators and functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Equal,
    NotEqual,
    Approx,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Atan2,
    Ldexp,
    Min,
    Max,
}

impl BinaryOp {
    /// Infix operators, longest symbols first so that `<=` wins over `<`.
    pub const OPERATORS: [BinaryOp; 15] = [
        BinaryOp::Equal,
        BinaryOp::NotEqual,
        BinaryOp::Approx,
        BinaryOp::LessEqual,
        BinaryOp::GreaterEqual,
        BinaryOp::And,
        BinaryOp::Or,
        BinaryOp::Less,
        BinaryOp::Greater,
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::Pow,
    ];

    /// Infix symbol, if the operation has one.
    pub fn symbol(self) -> Option<&'static str> {
        match self {
            BinaryOp::Add => Some("+"),
            BinaryOp::Sub => Some("-"),
            BinaryOp::Mul => Some("*"),
            BinaryOp::Div => Some("/"),
            BinaryOp::Mod => Some("%"),
            BinaryOp::Pow => Some("^"),
            BinaryOp::Equal => Some("=="),
            BinaryOp::NotEqual => Some("!="),
            BinaryOp::Approx => Some("~="),
            BinaryOp::Less => Some("<"),
            BinaryOp::LessEqual => Some("<="),
            BinaryOp::Greater => Some(">"),
            BinaryOp::GreaterEqual => Some(">="),
            BinaryOp::And => Some("&&"),
            BinaryOp::Or => Some("||"),
            BinaryOp::Atan2 | BinaryOp::Ldexp | BinaryOp::Min | BinaryOp::Max => None,
        }
    }

    /// Function name, if the operation can be written with call syntax.
    pub fn call_name(self) -> Option<&'static str> {
        match self {
            BinaryOp::Pow => Some("pow"),
            BinaryOp::Mod => Some("fmod"),
            BinaryOp::Atan2 => Some("atan2"),
            BinaryOp::Ldexp => Some("ldexp"),
            BinaryOp::Min => Some("min"),
            BinaryOp::Max => Some("max"),
            _ => None,
        }
    }

    /// Looks up a binary function by its call name.
    pub fn from_call(name: &str) -> Option<Self> {
        [
            BinaryOp::Pow,
            BinaryOp::Mod,
            BinaryOp::Atan2,
            BinaryOp::Ldexp,
            BinaryOp::Min,
            BinaryOp::Max,
        ]
        .into_iter()
        .find(|op| op.call_name() == Some(name))
    }

    /// Binding strength of an infix operator; lower binds tighter.
    pub fn priority(self) -> u8 {
        match self {
            BinaryOp::Pow => 1,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 2,
            BinaryOp::Add | BinaryOp::Sub => 3,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Approx
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => 4,
            BinaryOp::And => 5,
            BinaryOp::Or => 6,
            BinaryOp::Atan2 | BinaryOp::Ldexp | BinaryOp::Min | BinaryOp::Max => 0,
        }
    }

    pub fn is_right_associative(self) -> bool {
        self == BinaryOp::Pow
    }
}

/// Ordered literal values used as the right-hand side of `in`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LiteralSet(Vec<f64>);

impl LiteralSet {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact IEEE equality against every member; NaN never matches.
    pub fn contains(&self, probe: f64) -> bool {
        self.0.iter().any(|&v| v == probe)
    }
}

impl FromIterator<f64> for LiteralSet {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Aggregators accepted by `reduce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggr {
    Avg,
    Count,
    Prod,
    Sum,
    Max,
    Min,
}

impl Aggr {
    pub const ALL: [Aggr; 6] = [
        Aggr::Avg,
        Aggr::Count,
        Aggr::Prod,
        Aggr::Sum,
        Aggr::Max,
        Aggr::Min,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Aggr::Avg => "avg",
            Aggr::Count => "count",
            Aggr::Prod => "prod",
            Aggr::Sum => "sum",
            Aggr::Max => "max",
            Aggr::Min => "min",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.name() == name)
    }
}

/// An indexed dimension in a `tensor(...)` type, e.g. `x[3]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimensionSpec {
    pub name: String,
    pub size: usize,
}

impl DimensionSpec {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Inline sub-expression `f(x,y)(body)`.
///
/// Symbols in `body` index `params` first, then the enclosing scope's
/// parameters shifted by `params.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Box<Node>,
}

impl Lambda {
    pub fn new(params: Vec<String>, body: Node) -> Self {
        Self {
            params,
            body: Box::new(body),
        }
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }
}

/// The seven tensor-algebra operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorOpKind {
    Sum,
    Map,
    Join,
    Reduce,
    Rename,
    Create,
    Concat,
}

impl TensorOpKind {
    pub const ALL: [TensorOpKind; 7] = [
        TensorOpKind::Sum,
        TensorOpKind::Map,
        TensorOpKind::Join,
        TensorOpKind::Reduce,
        TensorOpKind::Rename,
        TensorOpKind::Create,
        TensorOpKind::Concat,
    ];

    /// Call name used in expression text.
    pub fn name(self) -> &'static str {
        match self {
            TensorOpKind::Sum => "sum",
            TensorOpKind::Map => "map",
            TensorOpKind::Join => "join",
            TensorOpKind::Reduce => "reduce",
            TensorOpKind::Rename => "rename",
            TensorOpKind::Create => "tensor",
            TensorOpKind::Concat => "concat",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl fmt::Display for TensorOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tensor-algebra operations. Never compiled natively.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorNode {
    Sum {
        child: Box<Node>,
        dimension: Option<String>,
    },
    Map {
        child: Box<Node>,
        lambda: Lambda,
    },
    Join {
        lhs: Box<Node>,
        rhs: Box<Node>,
        lambda: Lambda,
    },
    Reduce {
        child: Box<Node>,
        aggr: Aggr,
        dimensions: Vec<String>,
    },
    Rename {
        child: Box<Node>,
        from: Vec<String>,
        to: Vec<String>,
    },
    Create {
        dimensions: Vec<DimensionSpec>,
        lambda: Lambda,
    },
    Concat {
        lhs: Box<Node>,
        rhs: Box<Node>,
        dimension: String,
    },
}

impl TensorNode {
    pub fn kind(&self) -> TensorOpKind {
        match self {
            TensorNode::Sum { .. } => TensorOpKind::Sum,
            TensorNode::Map { .. } => TensorOpKind::Map,
            TensorNode::Join { .. } => TensorOpKind::Join,
            TensorNode::Reduce { .. } => TensorOpKind::Reduce,
            TensorNode::Rename { .. } => TensorOpKind::Rename,
            TensorNode::Create { .. } => TensorOpKind::Create,
            TensorNode::Concat { .. } => TensorOpKind::Concat,
        }
    }
}

impl Node {
    // Constructors for common expressions

    pub fn number(value: f64) -> Self {
        Node::Number(value)
    }

    pub fn symbol(idx: usize) -> Self {
        Node::Symbol(idx)
    }

    pub fn unary(op: UnaryOp, child: Node) -> Self {
        Node::Unary(op, Box::new(child))
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Self {
        Node::Binary(op, Box::new(left), Box::new(right))
    }

    pub fn if_then_else(cond: Node, true_expr: Node, false_expr: Node) -> Self {
        Node::If {
            cond: Box::new(cond),
            true_expr: Box::new(true_expr),
            false_expr: Box::new(false_expr),
        }
    }

    pub fn is_in(probe: Node, set: LiteralSet) -> Self {
        Node::In(Box::new(probe), set)
    }

    pub fn eq(left: Node, right: Node) -> Self {
        Node::binary(BinaryOp::Equal, left, right)
    }

    pub fn lt(left: Node, right: Node) -> Self {
        Node::binary(BinaryOp::Less, left, right)
    }

    pub fn and(left: Node, right: Node) -> Self {
        Node::binary(BinaryOp::And, left, right)
    }

    pub fn or(left: Node, right: Node) -> Self {
        Node::binary(BinaryOp::Or, left, right)
    }

    pub fn max(left: Node, right: Node) -> Self {
        Node::binary(BinaryOp::Max, left, right)
    }

    pub fn min(left: Node, right: Node) -> Self {
        Node::binary(BinaryOp::Min, left, right)
    }

    pub fn sum(child: Node) -> Self {
        Node::Tensor(TensorNode::Sum {
            child: Box::new(child),
            dimension: None,
        })
    }

    pub fn map(child: Node, lambda: Lambda) -> Self {
        Node::Tensor(TensorNode::Map {
            child: Box::new(child),
            lambda,
        })
    }

    pub fn join(lhs: Node, rhs: Node, lambda: Lambda) -> Self {
        Node::Tensor(TensorNode::Join {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            lambda,
        })
    }

    /// True if this node or any node below it is a tensor operation.
    pub fn contains_tensor(&self) -> bool {
        match self {
            Node::Number(_) | Node::Symbol(_) => false,
            Node::Unary(_, child) | Node::In(child, _) => child.contains_tensor(),
            Node::Binary(_, l, r) => l.contains_tensor() || r.contains_tensor(),
            Node::If {
                cond,
                true_expr,
                false_expr,
            } => {
                cond.contains_tensor() || true_expr.contains_tensor() || false_expr.contains_tensor()
            }
            Node::Tensor(_) => true,
        }
    }

    /// Renders the expression back to text. `names` resolves symbol indices.
    pub fn dump(&self, names: &[String]) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = dump_node(&mut out, self, names);
        out
    }
}

fn dump_number(out: &mut String, value: f64) -> fmt::Result {
    write!(out, "{value}")
}

fn dump_lambda(out: &mut String, lambda: &Lambda, outer: &[String]) -> fmt::Result {
    let mut names = lambda.params.clone();
    names.extend_from_slice(outer);
    write!(out, "f({})(", lambda.params.join(","))?;
    dump_node(out, &lambda.body, &names)?;
    out.push(')');
    Ok(())
}

fn dump_dims(out: &mut String, dims: &[String]) -> fmt::Result {
    if dims.len() == 1 {
        out.push_str(&dims[0]);
    } else {
        write!(out, "({})", dims.join(","))?;
    }
    Ok(())
}

fn dump_node(out: &mut String, node: &Node, names: &[String]) -> fmt::Result {
    match node {
        Node::Number(v) => dump_number(out, *v),
        Node::Symbol(idx) => match names.get(*idx) {
            Some(name) => write!(out, "{name}"),
            None => write!(out, "${idx}"),
        },
        Node::Unary(op, child) => {
            if op.is_call() {
                write!(out, "{}(", op.name())?;
                dump_node(out, child, names)?;
                out.push(')');
            } else {
                out.push_str(op.name());
                dump_node(out, child, names)?;
            }
            Ok(())
        }
        Node::Binary(op, l, r) => {
            if let Some(symbol) = op.symbol() {
                out.push('(');
                dump_node(out, l, names)?;
                out.push_str(symbol);
                dump_node(out, r, names)?;
                out.push(')');
            } else {
                write!(out, "{}(", op.call_name().unwrap_or("?"))?;
                dump_node(out, l, names)?;
                out.push(',');
                dump_node(out, r, names)?;
                out.push(')');
            }
            Ok(())
        }
        Node::If {
            cond,
            true_expr,
            false_expr,
        } => {
            out.push_str("if(");
            dump_node(out, cond, names)?;
            out.push(',');
            dump_node(out, true_expr, names)?;
            out.push(',');
            dump_node(out, false_expr, names)?;
            out.push(')');
            Ok(())
        }
        Node::In(probe, set) => {
            out.push('(');
            dump_node(out, probe, names)?;
            out.push_str(" in [");
            for (i, v) in set.values().iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                dump_number(out, *v)?;
            }
            out.push_str("])");
            Ok(())
        }
        Node::Tensor(tensor) => dump_tensor(out, tensor, names),
    }
}

fn dump_tensor(out: &mut String, node: &TensorNode, names: &[String]) -> fmt::Result {
    write!(out, "{}(", node.kind().name())?;
    match node {
        TensorNode::Sum { child, dimension } => {
            dump_node(out, child, names)?;
            if let Some(dim) = dimension {
                write!(out, ",{dim}")?;
            }
        }
        TensorNode::Map { child, lambda } => {
            dump_node(out, child, names)?;
            out.push(',');
            dump_lambda(out, lambda, names)?;
        }
        TensorNode::Join { lhs, rhs, lambda } => {
            dump_node(out, lhs, names)?;
            out.push(',');
            dump_node(out, rhs, names)?;
            out.push(',');
            dump_lambda(out, lambda, names)?;
        }
        TensorNode::Reduce {
            child,
            aggr,
            dimensions,
        } => {
            dump_node(out, child, names)?;
            write!(out, ",{}", aggr.name())?;
            for dim in dimensions {
                write!(out, ",{dim}")?;
            }
        }
        TensorNode::Rename { child, from, to } => {
            dump_node(out, child, names)?;
            out.push(',');
            dump_dims(out, from)?;
            out.push(',');
            dump_dims(out, to)?;
        }
        TensorNode::Create { dimensions, lambda } => {
            let dims: Vec<String> = dimensions
                .iter()
                .map(|d| format!("{}[{}]", d.name, d.size))
                .collect();
            out.push_str(&dims.join(","));
            out.push_str(")(");
            let mut inner = lambda.params.clone();
            inner.extend_from_slice(names);
            dump_node(out, &lambda.body, &inner)?;
        }
        TensorNode::Concat {
            lhs,
            rhs,
            dimension,
        } => {
            dump_node(out, lhs, names)?;
            out.push(',');
            dump_node(out, rhs, names)?;
            write!(out, ",{dimension}")?;
        }
    }
    out.push(')');
    Ok(())
}

// Operator syntax for building trees in code

impl Not for Node {
    type Output = Node;

    fn not(self) -> Self::Output {
        Node::unary(UnaryOp::Not, self)
    }
}

impl Neg for Node {
    type Output = Node;

    fn neg(self) -> Self::Output {
        Node::unary(UnaryOp::Neg, self)
    }
}

impl Add for Node {
    type Output = Node;

    fn add(self, rhs: Self) -> Self::Output {
        Node::binary(BinaryOp::Add, self, rhs)
    }
}

impl Sub for Node {
    type Output = Node;

    fn sub(self, rhs: Self) -> Self::Output {
        Node::binary(BinaryOp::Sub, self, rhs)
    }
}

impl Mul for Node {
    type Output = Node;

    fn mul(self, rhs: Self) -> Self::Output {
        Node::binary(BinaryOp::Mul, self, rhs)
    }
}

impl Div for Node {
    type Output = Node;

    fn div(self, rhs: Self) -> Self::Output {
        Node::binary(BinaryOp::Div, self, rhs)
    }
}
