//! The internal parse result model (spec.md §3 "Result").
//!
//! Kept separate from the public error types in `error.rs`: `PResult` is
//! what the evaluator and cache pass around internally, cheap to build and
//! discard millions of times during a parse; `error.rs` is what a caller
//! of `driver::parse` actually sees.

use std::rc::Rc;

use crate::expr::Expr;
use crate::value::Production;

/// Outcome of evaluating one expression at one position.
#[derive(Clone, Debug)]
pub enum PResult {
    Ok { position: usize, production: Production },
    Err(ErrKind),
}

impl PResult {
    pub fn ok(position: usize, production: Production) -> Self {
        PResult::Ok { position, production }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, PResult::Ok { .. })
    }

    pub fn end_position(&self) -> Option<usize> {
        match self {
            PResult::Ok { position, .. } => Some(*position),
            PResult::Err(_) => None,
        }
    }
}

/// Why an expression failed to match.
#[derive(Clone, Debug)]
pub enum ErrKind {
    /// The referenced rule has no attached `Rule` (a declared-but-undefined
    /// nonterminal).
    InactiveRule { rule: Rc<str> },
    /// An ordinary match failure, with a detail chain pointing at the
    /// deepest sub-expression that failed and the position it failed at.
    FailedParse { at: usize, detail: FailDetail },
    /// Returned while growing a left-recursive seed: this position is
    /// still being computed, so reuse the current seed rather than
    /// recursing again (spec.md §4.4).
    LeftRecursionMarker { rule: Rc<str> },
}

/// One node of the failure detail chain, pointing back at the expression
/// that produced it so error formatting can render a "expected X" message.
/// `message` carries a function terminal's own failure detail (spec.md
/// §4.5's `flag` value, when it names a reason) in preference to the
/// generic `{:?}` rendering of `expr`.
#[derive(Clone, Debug)]
pub struct FailDetail {
    pub expr: Rc<Expr>,
    pub message: Option<Rc<str>>,
    pub cause: Option<Box<FailDetail>>,
}

impl FailDetail {
    pub fn leaf(expr: Rc<Expr>) -> Self {
        FailDetail { expr, message: None, cause: None }
    }

    pub fn leaf_with_message(expr: Rc<Expr>, message: impl Into<Rc<str>>) -> Self {
        FailDetail { expr, message: Some(message.into()), cause: None }
    }

    pub fn wrap(expr: Rc<Expr>, cause: FailDetail) -> Self {
        FailDetail { expr, message: None, cause: Some(Box::new(cause)) }
    }

    /// Walks to the deepest (most specific) failure in the chain.
    pub fn deepest(&self) -> &FailDetail {
        match &self.cause {
            Some(inner) => inner.deepest(),
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn ok_result_reports_position() {
        let r = PResult::ok(3, crate::value::Production::ready(Value::Empty));
        assert!(r.is_ok());
        assert_eq!(r.end_position(), Some(3));
    }

    #[test]
    fn err_result_has_no_end_position() {
        let r = PResult::Err(ErrKind::InactiveRule { rule: Rc::from("foo") });
        assert!(!r.is_ok());
        assert_eq!(r.end_position(), None);
    }

    #[test]
    fn detail_chain_walks_to_deepest() {
        let leaf = FailDetail::leaf(Rc::new(Expr::Character));
        let mid = FailDetail::wrap(Rc::new(Expr::Character), leaf);
        let top = FailDetail::wrap(Rc::new(Expr::Character), mid);
        assert!(top.deepest().cause.is_none());
    }
}
