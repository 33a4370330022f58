use chumsky::error::{Simple, SimpleReason};
use std::fmt::Display;

use crate::span::{LineIndex, Span};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

impl std::error::Error for ParseError {}

pub(crate) fn to_parse_error<T: Display + std::hash::Hash + std::cmp::Eq>(
    err: Simple<T>,
    file: &str,
    line_index: &LineIndex,
) -> ParseError {
    let message = match err.reason() {
        SimpleReason::Custom(msg) => msg.clone(),
        _ => err.to_string(),
    };
    ParseError {
        message,
        span: line_index.span(file, err.span()),
    }
}
