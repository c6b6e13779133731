//! A parsed expression together with its parameter names.

use std::fmt;

use crate::error::ParseError;
use crate::node::Node;
use crate::parse::Parser;

/// A parsed expression.
///
/// Parsing never panics; malformed text yields a function whose
/// [`has_error`](Function::has_error) is true and whose root is a NaN literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    root: Node,
    params: Vec<String>,
    error: Option<ParseError>,
}

impl Function {
    /// Wraps an already built tree. `params` names the symbol indices.
    pub fn new(params: Vec<String>, root: Node) -> Self {
        Self {
            root,
            params,
            error: None,
        }
    }

    /// Parses `expression`, collecting parameters in order of first use.
    pub fn parse(expression: &str) -> Self {
        Self::from_parser(Parser::new(expression, None), Vec::new())
    }

    /// Parses `expression` against a fixed parameter list. Referencing a
    /// name outside the list is a parse error.
    pub fn parse_with_params<S: AsRef<str>>(params: &[S], expression: &str) -> Self {
        let names: Vec<String> = params.iter().map(|p| p.as_ref().to_string()).collect();
        Self::from_parser(Parser::new(expression, Some(names.clone())), names)
    }

    fn from_parser(parser: Parser<'_>, fallback_params: Vec<String>) -> Self {
        match parser.parse() {
            Ok((root, params)) => Self {
                root,
                params,
                error: None,
            },
            Err(error) => Self {
                root: Node::Number(f64::NAN),
                params: fallback_params,
                error: Some(error),
            },
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn param_name(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).map(String::as_str)
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Renders the expression back to text.
    pub fn dump(&self) -> String {
        self.root.dump(&self.params)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}
