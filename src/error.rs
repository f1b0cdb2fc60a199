//! Public error types surfaced by `driver::parse` (spec.md §4.9, §7).
//!
//! Formatted the way the teacher formats `ParseError` in
//! `parse_context.rs::format_with_context`: a line/column lookup against
//! the original input plus a windowed context snippet around the
//! failure position.

use std::fmt;

use crate::input::CharBuf;
use crate::result::FailDetail;

/// An ordinary parse failure: the input didn't match the grammar.
#[derive(Debug, Clone)]
pub struct SimpleParseError {
    pub position: usize,
    pub line: usize,
    pub column: usize,
    pub context: String,
    pub expected: String,
}

impl fmt::Display for SimpleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error at line {}, column {} (position {}): expected {}\n  near: {:?}",
            self.line, self.column, self.position, self.expected, self.context
        )
    }
}

impl std::error::Error for SimpleParseError {}

impl SimpleParseError {
    pub(crate) fn build(input: CharBuf<'_>, at: usize, detail: &FailDetail) -> Self {
        let (line, column) = input.line_col(at);
        let context = input.context_window(at, 20);
        let deepest = detail.deepest();
        let expected = match &deepest.message {
            Some(m) => m.to_string(),
            None => format!("{:?}", deepest.expr),
        };
        SimpleParseError { position: at, line, column, context, expected }
    }
}

/// A rule never converged: left recursion was detected but the involved
/// rule(s) never produced a seed that would let growth proceed (e.g. a
/// rule that is left-recursive with no non-recursive alternative at
/// all, so even the first seed attempt fails).
#[derive(Debug, Clone)]
pub struct LeftRecursionError {
    pub nonterminal: String,
    pub path: Vec<String>,
}

impl fmt::Display for LeftRecursionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "left recursion on '{}' never produced a seed match", self.nonterminal)
        } else {
            write!(
                f,
                "left recursion on '{}' never produced a seed match (via {})",
                self.nonterminal,
                self.path.join(" -> ")
            )
        }
    }
}

impl std::error::Error for LeftRecursionError {}

/// The expression given to `driver::parse` failed validation
/// (`Expr::validate`).
#[derive(Debug, Clone)]
pub struct InvalidExpressionError {
    pub reason: String,
}

impl fmt::Display for InvalidExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid expression: {}", self.reason)
    }
}

impl std::error::Error for InvalidExpressionError {}

/// The top-level error type a caller of `driver::parse` sees.
#[derive(Debug, Clone)]
pub enum ParseFailure {
    Simple(SimpleParseError),
    LeftRecursion(LeftRecursionError),
    InvalidExpression(InvalidExpressionError),
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailure::Simple(e) => e.fmt(f),
            ParseFailure::LeftRecursion(e) => e.fmt(f),
            ParseFailure::InvalidExpression(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ParseFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_error_formats_with_position() {
        let chars: Vec<char> = "abc\ndef".chars().collect();
        let buf = CharBuf::new(&chars, chars.len());
        let detail = FailDetail::leaf(std::rc::Rc::new(crate::expr::Expr::Character));
        let err = SimpleParseError::build(buf, 5, &detail);
        assert_eq!(err.line, 2);
        let rendered = err.to_string();
        assert!(rendered.contains("line 2"));
    }
}
