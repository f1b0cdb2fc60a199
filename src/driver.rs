//! Parse entry point (spec.md §4.1): validates the expression, builds a
//! fresh `ParseCtx`, evaluates once, and converts the internal result
//! into the public error types of `error.rs`.

use std::rc::Rc;

use crate::cache::ParseCtx;
use crate::error::{InvalidExpressionError, LeftRecursionError, ParseFailure, SimpleParseError};
use crate::eval;
use crate::expr::Expr;
use crate::input::CharBuf;
use crate::registry::Registry;
use crate::result::{ErrKind, FailDetail, PResult};
use crate::value::Value;

/// The `(production, rest, ok)` tuple of spec.md §4.1, as a named struct
/// rather than a bare tuple so the three spec-described shapes stay
/// distinguishable at the call site:
///
/// - a full match to `end`: `{ production: Some(_), rest: None, ok: true }`
/// - a match that stopped short of `end` with `junk_allowed`:
///   `{ production: Some(_), rest: Some(position), ok: true }`
/// - no match at all with `junk_allowed`:
///   `{ production: None, rest: Some(start), ok: false }`
///
/// The last shape is not an error: `junk_allowed` asks the driver to
/// report "didn't match" as an ordinary result rather than raising.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub production: Option<Value>,
    pub rest: Option<usize>,
    pub ok: bool,
}

/// Parses `text[start..end_or_full]` against `expression`, resolving any
/// nonterminals it contains against `registry`.
///
/// `end` bounds every terminal match during evaluation, not just the
/// post-hoc completeness check — a sub-range parse (`end` short of the
/// full text) cannot consume past `end` even transiently.
///
/// When `junk_allowed` is `false` (the common case), a match that stops
/// short of `end` is reported as an incomplete-parse error, and a total
/// failure to match (or a reference to an undefined rule) is also
/// reported as an error. When `junk_allowed` is `true`, neither of those
/// outcomes raises: both come back as an `Ok(ParseOutcome)` with
/// `ok: false` (no match) or `ok: true, rest: Some(position)` (partial
/// match) — see spec.md §4.1.
pub fn parse(
    registry: &Registry,
    expression: &Expr,
    text: &str,
    start: usize,
    end: Option<usize>,
    junk_allowed: bool,
) -> Result<ParseOutcome, ParseFailure> {
    expression.validate().map_err(|e| {
        ParseFailure::InvalidExpression(InvalidExpressionError { reason: e.to_string() })
    })?;

    let chars: Vec<char> = text.chars().collect();
    let limit = end.unwrap_or(chars.len()).min(chars.len());
    let buf = CharBuf::new(&chars, limit);
    let ctx = ParseCtx::new(buf, registry);
    let expr_rc = Rc::new(expression.clone());

    match eval::eval(&expr_rc, &ctx, start) {
        PResult::Ok { position, production } => {
            if position == limit {
                Ok(ParseOutcome { production: Some(production.force()), rest: None, ok: true })
            } else if junk_allowed {
                Ok(ParseOutcome {
                    production: Some(production.force()),
                    rest: Some(position),
                    ok: true,
                })
            } else {
                let detail = FailDetail::leaf(expr_rc.clone());
                log::debug!("incomplete parse: stopped at {position}, input continues to {limit}");
                Err(ParseFailure::Simple(SimpleParseError::build(buf, position, &detail)))
            }
        }
        PResult::Err(ErrKind::FailedParse { at, detail }) => {
            if junk_allowed {
                Ok(ParseOutcome { production: None, rest: Some(start), ok: false })
            } else {
                Err(ParseFailure::Simple(SimpleParseError::build(buf, at, &detail)))
            }
        }
        PResult::Err(ErrKind::InactiveRule { rule }) => {
            if junk_allowed {
                Ok(ParseOutcome { production: None, rest: Some(start), ok: false })
            } else {
                Err(ParseFailure::InvalidExpression(InvalidExpressionError {
                    reason: format!("rule '{rule}' is not defined"),
                }))
            }
        }
        PResult::Err(ErrKind::LeftRecursionMarker { rule }) => Err(ParseFailure::LeftRecursion(
            LeftRecursionError { nonterminal: rule.to_string(), path: Vec::new() },
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_and_reports_end_position() {
        let reg = Registry::new();
        let outcome = parse(&reg, &Expr::literal("hi"), "hi", 0, None, false).unwrap();
        assert_eq!(outcome.production.unwrap().as_text(), Some("hi"));
        assert_eq!(outcome.rest, None);
        assert!(outcome.ok);
    }

    #[test]
    fn trailing_junk_rejected_unless_allowed() {
        let reg = Registry::new();
        let err = parse(&reg, &Expr::literal("hi"), "hi!", 0, None, false).unwrap_err();
        assert!(matches!(err, ParseFailure::Simple(_)));
        let outcome = parse(&reg, &Expr::literal("hi"), "hi!", 0, None, true).unwrap();
        assert_eq!(outcome.rest, Some(2));
        assert!(outcome.ok);
        assert_eq!(outcome.production.unwrap().as_text(), Some("hi"));
    }

    #[test]
    fn invalid_expression_rejected_before_parsing() {
        let reg = Registry::new();
        let bad = Expr::CharRanges(Rc::from(Vec::new()));
        let err = parse(&reg, &bad, "x", 0, None, false).unwrap_err();
        assert!(matches!(err, ParseFailure::InvalidExpression(_)));
    }

    #[test]
    fn undefined_nonterminal_reported() {
        let reg = Registry::new();
        let err = parse(&reg, &Expr::nonterminal("missing"), "x", 0, None, false).unwrap_err();
        assert!(matches!(err, ParseFailure::InvalidExpression(_)));
    }

    #[test]
    fn total_mismatch_with_junk_allowed_is_a_non_error_no_match() {
        let reg = Registry::new();
        let outcome = parse(&reg, &Expr::literal("hi"), "nope", 0, None, true).unwrap();
        assert!(!outcome.ok);
        assert!(outcome.production.is_none());
        assert_eq!(outcome.rest, Some(0));
    }

    #[test]
    fn undefined_nonterminal_with_junk_allowed_is_a_non_error_no_match() {
        let reg = Registry::new();
        let outcome = parse(&reg, &Expr::nonterminal("missing"), "x", 0, None, true).unwrap();
        assert!(!outcome.ok);
        assert!(outcome.production.is_none());
        assert_eq!(outcome.rest, Some(0));
    }

    #[test]
    fn end_bound_prevents_matching_past_the_requested_range() {
        // "hi" is present in the text but starts after the requested end.
        let reg = Registry::new();
        let outcome = parse(&reg, &Expr::literal("hi"), "xxhiyy", 0, Some(2), true).unwrap();
        assert!(!outcome.ok);

        // A literal that only partly fits inside the requested end must
        // not match just because the full buffer continues past it.
        let outcome2 = parse(&reg, &Expr::literal("hi"), "hixx", 0, Some(1), true).unwrap();
        assert!(!outcome2.ok);

        // Exactly filling the requested sub-range succeeds.
        let outcome3 = parse(&reg, &Expr::literal("hi"), "hixx", 0, Some(2), false).unwrap();
        assert!(outcome3.ok);
        assert_eq!(outcome3.rest, None);
    }
}
