//! Error types for EvalForge core.

use thiserror::Error;

/// A failure to parse expression text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at position {pos}: {message}")]
pub struct ParseError {
    /// Byte offset into the expression text.
    pub pos: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(pos: usize, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

/// Result type alias for parsing.
pub type Result<T> = std::result::Result<T, ParseError>;
