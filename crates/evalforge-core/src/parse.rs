//! Recursive-descent parser for expression text.
//!
//! Operators are parsed by precedence climbing over [`BinaryOp::priority`].
//! `in` is a postfix on a single value: `a in [1,2,3]`; use parentheses for
//! compound probes.

use crate::error::{ParseError, Result};
use crate::node::{Aggr, BinaryOp, DimensionSpec, Lambda, LiteralSet, Node, TensorNode, TensorOpKind, UnaryOp};

const LOWEST_PRIORITY: u8 = 6;

pub(crate) struct Parser<'a> {
    text: &'a str,
    pos: usize,
    params: Vec<String>,
    fixed_params: bool,
    // Innermost lambda last.
    lambdas: Vec<Vec<String>>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(text: &'a str, params: Option<Vec<String>>) -> Self {
        let fixed_params = params.is_some();
        Self {
            text,
            pos: 0,
            params: params.unwrap_or_default(),
            fixed_params,
            lambdas: Vec::new(),
        }
    }

    /// Parses the whole text, returning the tree and the final parameter list.
    pub(crate) fn parse(mut self) -> Result<(Node, Vec<String>)> {
        let root = self.parse_expr()?;
        self.skip_ws();
        if self.pos < self.text.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok((root, self.params))
    }

    // -----------------------------------------------------------------------
    // Lexing helpers
    // -----------------------------------------------------------------------

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.pos, message)
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{token}'")))
        }
    }

    fn peek_ident(&self) -> Option<&'a str> {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return None,
        }
        let end = chars
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        Some(&rest[..end])
    }

    fn ident(&mut self) -> Result<String> {
        self.skip_ws();
        match self.peek_ident() {
            Some(name) => {
                self.pos += name.len();
                Ok(name.to_string())
            }
            None => Err(self.error("expected identifier")),
        }
    }

    fn number(&mut self) -> Result<f64> {
        self.skip_ws();
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut end = 0;
        while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
            end += 1;
        }
        if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut exp_end = end + 1;
            if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
                exp_end += 1;
            }
            let digits_start = exp_end;
            while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            if exp_end > digits_start {
                end = exp_end;
            }
        }
        let value = rest[..end]
            .parse::<f64>()
            .map_err(|_| self.error(format!("invalid number '{}'", &rest[..end])))?;
        self.pos += end;
        Ok(value)
    }

    fn size(&mut self) -> Result<usize> {
        self.skip_ws();
        let rest = self.rest();
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let value = rest[..end]
            .parse::<usize>()
            .map_err(|_| self.error("expected dimension size"))?;
        self.pos += end;
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Symbols and scopes
    // -----------------------------------------------------------------------

    fn resolve(&mut self, name: &str) -> Result<usize> {
        let mut offset = 0;
        for frame in self.lambdas.iter().rev() {
            if let Some(idx) = frame.iter().position(|p| p == name) {
                return Ok(offset + idx);
            }
            offset += frame.len();
        }
        if let Some(idx) = self.params.iter().position(|p| p == name) {
            return Ok(offset + idx);
        }
        if self.fixed_params {
            return Err(self.error(format!("unknown symbol '{name}'")));
        }
        self.params.push(name.to_string());
        Ok(offset + self.params.len() - 1)
    }

    fn with_lambda<T>(
        &mut self,
        params: Vec<String>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.lambdas.push(params);
        let result = f(self);
        self.lambdas.pop();
        result
    }

    // -----------------------------------------------------------------------
    // Grammar
    // -----------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Node> {
        self.parse_binary(LOWEST_PRIORITY)
    }

    fn peek_operator(&mut self) -> Option<BinaryOp> {
        self.skip_ws();
        let rest = self.rest();
        BinaryOp::OPERATORS
            .into_iter()
            .find(|op| op.symbol().is_some_and(|s| rest.starts_with(s)))
    }

    fn parse_binary(&mut self, level: u8) -> Result<Node> {
        if level == 0 {
            return self.parse_value();
        }
        let mut lhs = self.parse_binary(level - 1)?;
        while let Some(op) = self.peek_operator() {
            if op.priority() != level {
                break;
            }
            self.pos += op.symbol().map_or(0, str::len);
            let rhs = if op.is_right_associative() {
                self.parse_binary(level)?
            } else {
                self.parse_binary(level - 1)?
            };
            lhs = Node::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// A prefixed operand with an optional `in` suffix; `-a in [1]` tests `-a`.
    fn parse_value(&mut self) -> Result<Node> {
        let value = self.parse_prefixed()?;
        self.parse_in(value)
    }

    fn parse_prefixed(&mut self) -> Result<Node> {
        self.skip_ws();
        let value = match self.peek() {
            Some('-') => {
                self.pos += 1;
                Node::unary(UnaryOp::Neg, self.parse_prefixed()?)
            }
            Some('!') => {
                self.pos += 1;
                Node::unary(UnaryOp::Not, self.parse_prefixed()?)
            }
            Some('(') => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(")")?;
                inner
            }
            Some(c) if c.is_ascii_digit() || c == '.' => Node::Number(self.number()?),
            Some(_) => self.parse_named()?,
            None => return Err(self.error("unexpected end of expression")),
        };
        Ok(value)
    }

    fn parse_in(&mut self, probe: Node) -> Result<Node> {
        self.skip_ws();
        if self.peek_ident() != Some("in") {
            return Ok(probe);
        }
        self.pos += 2;
        let set = self.parse_set()?;
        Ok(Node::is_in(probe, set))
    }

    fn parse_set(&mut self) -> Result<LiteralSet> {
        let close = if self.eat("[") {
            "]"
        } else if self.eat("{") {
            "}"
        } else {
            return Err(self.error("expected '[' or '{' after 'in'"));
        };
        let mut values = Vec::new();
        if self.eat(close) {
            return Ok(LiteralSet::new(values));
        }
        loop {
            let negative = self.eat("-");
            let value = self.number()?;
            values.push(if negative { -value } else { value });
            if self.eat(close) {
                return Ok(LiteralSet::new(values));
            }
            self.expect(",")?;
        }
    }

    fn parse_named(&mut self) -> Result<Node> {
        let start = self.pos;
        let name = self.ident()?;
        self.skip_ws();
        let is_call = self.peek() == Some('(');
        match name.as_str() {
            "true" => return Ok(Node::Number(1.0)),
            "false" => return Ok(Node::Number(0.0)),
            _ => {}
        }
        if !is_call {
            return Ok(Node::Symbol(self.resolve(&name)?));
        }
        if name == "if" {
            return self.parse_if();
        }
        if let Some(kind) = TensorOpKind::from_name(&name) {
            return self.parse_tensor(kind).map(Node::Tensor);
        }
        if let Some(op) = UnaryOp::from_call(&name) {
            self.expect("(")?;
            let arg = self.parse_expr()?;
            self.expect(")")?;
            return Ok(Node::unary(op, arg));
        }
        if let Some(op) = BinaryOp::from_call(&name) {
            self.expect("(")?;
            let a = self.parse_expr()?;
            self.expect(",")?;
            let b = self.parse_expr()?;
            self.expect(")")?;
            return Ok(Node::binary(op, a, b));
        }
        Err(ParseError::new(start, format!("unknown function '{name}'")))
    }

    fn parse_if(&mut self) -> Result<Node> {
        self.expect("(")?;
        let cond = self.parse_expr()?;
        self.expect(",")?;
        let true_expr = self.parse_expr()?;
        self.expect(",")?;
        let false_expr = self.parse_expr()?;
        // Optional branch probability hint; accepted and ignored.
        if self.eat(",") {
            self.number()?;
        }
        self.expect(")")?;
        Ok(Node::if_then_else(cond, true_expr, false_expr))
    }

    fn parse_lambda(&mut self, arity: usize) -> Result<Lambda> {
        let start = self.pos;
        let f = self.ident()?;
        if f != "f" {
            return Err(ParseError::new(start, "expected lambda 'f(...)(...)'"));
        }
        self.expect("(")?;
        let mut params = Vec::new();
        if !self.eat(")") {
            loop {
                params.push(self.ident()?);
                if self.eat(")") {
                    break;
                }
                self.expect(",")?;
            }
        }
        if params.len() != arity {
            return Err(ParseError::new(
                start,
                format!("lambda must take {arity} parameter(s), got {}", params.len()),
            ));
        }
        self.expect("(")?;
        let body = self.with_lambda(params.clone(), |p| p.parse_expr())?;
        self.expect(")")?;
        Ok(Lambda::new(params, body))
    }

    fn parse_dim_list(&mut self) -> Result<Vec<String>> {
        if !self.eat("(") {
            return Ok(vec![self.ident()?]);
        }
        let mut dims = vec![self.ident()?];
        while self.eat(",") {
            dims.push(self.ident()?);
        }
        self.expect(")")?;
        Ok(dims)
    }

    fn parse_tensor(&mut self, kind: TensorOpKind) -> Result<TensorNode> {
        self.expect("(")?;
        let node = match kind {
            TensorOpKind::Sum => {
                let child = Box::new(self.parse_expr()?);
                let dimension = if self.eat(",") {
                    Some(self.ident()?)
                } else {
                    None
                };
                TensorNode::Sum { child, dimension }
            }
            TensorOpKind::Map => {
                let child = Box::new(self.parse_expr()?);
                self.expect(",")?;
                let lambda = self.parse_lambda(1)?;
                TensorNode::Map { child, lambda }
            }
            TensorOpKind::Join => {
                let lhs = Box::new(self.parse_expr()?);
                self.expect(",")?;
                let rhs = Box::new(self.parse_expr()?);
                self.expect(",")?;
                let lambda = self.parse_lambda(2)?;
                TensorNode::Join { lhs, rhs, lambda }
            }
            TensorOpKind::Reduce => {
                let child = Box::new(self.parse_expr()?);
                self.expect(",")?;
                let aggr_pos = self.pos;
                let aggr_name = self.ident()?;
                let aggr = Aggr::from_name(&aggr_name).ok_or_else(|| {
                    ParseError::new(aggr_pos, format!("unknown aggregator '{aggr_name}'"))
                })?;
                let mut dimensions = Vec::new();
                while self.eat(",") {
                    dimensions.push(self.ident()?);
                }
                TensorNode::Reduce {
                    child,
                    aggr,
                    dimensions,
                }
            }
            TensorOpKind::Rename => {
                let child = Box::new(self.parse_expr()?);
                self.expect(",")?;
                let from = self.parse_dim_list()?;
                self.expect(",")?;
                let to = self.parse_dim_list()?;
                if from.len() != to.len() {
                    return Err(self.error("rename needs the same number of 'from' and 'to' dimensions"));
                }
                TensorNode::Rename { child, from, to }
            }
            TensorOpKind::Create => {
                let mut dimensions = Vec::new();
                loop {
                    let name = self.ident()?;
                    self.expect("[")?;
                    let size = self.size()?;
                    self.expect("]")?;
                    dimensions.push(DimensionSpec::new(name, size));
                    if !self.eat(",") {
                        break;
                    }
                }
                self.expect(")")?;
                self.expect("(")?;
                let params: Vec<String> = dimensions.iter().map(|d| d.name.clone()).collect();
                let body = self.with_lambda(params.clone(), |p| p.parse_expr())?;
                let lambda = Lambda::new(params, body);
                TensorNode::Create { dimensions, lambda }
            }
            TensorOpKind::Concat => {
                let lhs = Box::new(self.parse_expr()?);
                self.expect(",")?;
                let rhs = Box::new(self.parse_expr()?);
                self.expect(",")?;
                let dimension = self.ident()?;
                TensorNode::Concat {
                    lhs,
                    rhs,
                    dimension,
                }
            }
        };
        self.expect(")")?;
        Ok(node)
    }
}
