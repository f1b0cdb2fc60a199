//! The parsing expression tree (spec.md §3 "Expression").
//!
//! A tagged-variant tree, same idea as the teacher's `ast::BaseFactor` /
//! `Factor` split, flattened into one enum since this engine's combinators
//! don't need the factor/repetition-suffix split iXML's surface grammar
//! has — `Star`/`Plus`/`Optional` are first-class variants here rather
//! than a repetition field bolted onto every base case.

use std::fmt;
use std::rc::Rc;

use crate::charset::RangeItem;
use crate::value::{FunctionTerminalFn, PredicateFn};

/// A parsing expression. Immutable once constructed and validated;
/// shared via `Rc` so rule bodies and error-detail chains can reference
/// the same subtree without cloning it.
#[derive(Clone)]
pub enum Expr {
    /// Wildcard: matches any single code point.
    Character,
    /// A literal string terminal.
    Literal { text: Rc<str>, case_sensitive: bool },
    /// Internal form used by the compiler for `(string N)`: match any `n`
    /// characters unconditionally (subject to enough input remaining).
    LengthString(usize),
    /// One character covered by any of the given ranges.
    CharRanges(Rc<[RangeItem]>),
    /// Semantic predicate: match `inner`, then ask `predicate` whether to
    /// keep the match.
    Predicate { name: Rc<str>, predicate: PredicateFn, inner: Rc<Expr> },
    /// Delegate entirely to a user function (the terminal-function
    /// protocol, spec.md §4.5).
    FunctionTerminal(FunctionTerminalFn),
    /// Reference to a named rule.
    Nonterminal(Rc<str>),
    /// Ordered sequence.
    And(Rc<[Expr]>),
    /// Ordered choice — first success wins.
    Or(Rc<[Expr]>),
    /// Consumes one character if `inner` fails to match, else fails.
    Not(Rc<Expr>),
    /// Zero-width negative lookahead: `!inner`.
    NegAhead(Rc<Expr>),
    /// Zero-width positive lookahead: `&inner`.
    Ahead(Rc<Expr>),
    /// Greedy repetition, zero or more.
    Star(Rc<Expr>),
    /// Greedy repetition, one or more.
    Plus(Rc<Expr>),
    /// Zero-width success if `inner` fails, else `inner`'s result.
    Optional(Rc<Expr>),
}

/// Combinator names reserved against use as a semantic-predicate symbol
/// (spec.md §3: "predicate names must be symbols outside a reserved set
/// of combinator names").
pub const RESERVED_PREDICATE_NAMES: &[&str] = &[
    "character", "literal", "string", "char-ranges", "predicate", "function-terminal",
    "nonterminal", "and", "or", "not", "neg-ahead", "ahead", "star", "plus", "optional",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidExpr {
    EmptyCharRanges,
    ReservedPredicateName(String),
    EmptyLiteral,
}

impl fmt::Display for InvalidExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidExpr::EmptyCharRanges => write!(f, "char-ranges expression has no ranges"),
            InvalidExpr::ReservedPredicateName(name) => {
                write!(f, "predicate name '{name}' collides with a reserved combinator name")
            }
            InvalidExpr::EmptyLiteral => write!(f, "literal expression has empty text"),
        }
    }
}

impl std::error::Error for InvalidExpr {}

impl Expr {
    /// Type-check well-formedness (spec.md §3: "Every expression must
    /// type-check"). Structural arity is already enforced by the enum
    /// shape in Rust, so this walk only needs to check the two
    /// value-level constraints spec.md calls out: non-empty char ranges,
    /// and predicate names outside the reserved set.
    pub fn validate(&self) -> Result<(), InvalidExpr> {
        match self {
            Expr::CharRanges(items) if items.is_empty() => Err(InvalidExpr::EmptyCharRanges),
            Expr::Literal { text, .. } if text.is_empty() => Err(InvalidExpr::EmptyLiteral),
            Expr::Predicate { name, inner, .. } => {
                if RESERVED_PREDICATE_NAMES.contains(&name.as_ref()) {
                    return Err(InvalidExpr::ReservedPredicateName(name.to_string()));
                }
                inner.validate()
            }
            Expr::And(subs) | Expr::Or(subs) => {
                for sub in subs.iter() {
                    sub.validate()?;
                }
                Ok(())
            }
            Expr::Not(inner)
            | Expr::NegAhead(inner)
            | Expr::Ahead(inner)
            | Expr::Star(inner)
            | Expr::Plus(inner)
            | Expr::Optional(inner) => inner.validate(),
            _ => Ok(()),
        }
    }

    pub fn literal(text: impl Into<Rc<str>>) -> Self {
        Expr::Literal { text: text.into(), case_sensitive: true }
    }

    pub fn literal_ci(text: impl Into<Rc<str>>) -> Self {
        Expr::Literal { text: text.into(), case_sensitive: false }
    }

    pub fn nonterminal(name: impl Into<Rc<str>>) -> Self {
        Expr::Nonterminal(name.into())
    }

    pub fn seq(subs: impl Into<Vec<Expr>>) -> Self {
        Expr::And(subs.into().into())
    }

    pub fn choice(subs: impl Into<Vec<Expr>>) -> Self {
        Expr::Or(subs.into().into())
    }

    pub fn star(inner: Expr) -> Self {
        Expr::Star(Rc::new(inner))
    }

    pub fn plus(inner: Expr) -> Self {
        Expr::Plus(Rc::new(inner))
    }

    pub fn optional(inner: Expr) -> Self {
        Expr::Optional(Rc::new(inner))
    }

    pub fn not(inner: Expr) -> Self {
        Expr::Not(Rc::new(inner))
    }

    pub fn neg_ahead(inner: Expr) -> Self {
        Expr::NegAhead(Rc::new(inner))
    }

    pub fn ahead(inner: Expr) -> Self {
        Expr::Ahead(Rc::new(inner))
    }

    pub fn char_ranges(items: impl Into<Vec<RangeItem>>) -> Self {
        Expr::CharRanges(items.into().into())
    }

    pub fn length_string(n: usize) -> Self {
        Expr::LengthString(n)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::analysis::write_expr(f, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_char_ranges_is_invalid() {
        let e = Expr::CharRanges(Rc::from(Vec::<RangeItem>::new()));
        assert_eq!(e.validate(), Err(InvalidExpr::EmptyCharRanges));
    }

    #[test]
    fn reserved_predicate_name_rejected() {
        let e = Expr::Predicate {
            name: Rc::from("and"),
            predicate: Rc::new(|_| true),
            inner: Rc::new(Expr::Character),
        };
        assert!(matches!(e.validate(), Err(InvalidExpr::ReservedPredicateName(_))));
    }

    #[test]
    fn ordinary_predicate_name_accepted() {
        let e = Expr::Predicate {
            name: Rc::from("even-length"),
            predicate: Rc::new(|_| true),
            inner: Rc::new(Expr::Character),
        };
        assert!(e.validate().is_ok());
    }

    #[test]
    fn nested_validation_propagates() {
        let bad = Expr::CharRanges(Rc::from(Vec::<RangeItem>::new()));
        let wrapped = Expr::star(bad);
        assert!(wrapped.validate().is_err());
    }
}
