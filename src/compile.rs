//! Rule compiler: a small optimizing rewrite pass over a validated
//! `Expr` tree (spec.md §4.3, §8 property 8).
//!
//! Two rewrites, both purely structural — they change how fast a rule
//! matches, never what it matches:
//!
//! - An `Or` whose every branch is a single-character `Literal` collapses
//!   into one `CharRanges` lookup instead of trying each branch in turn.
//! - An `Or` whose branches are `Literal` strings is left as an `Or` (the
//!   evaluator already tries literals in order), but a branch that is a
//!   strict prefix of an earlier, still-reachable branch can never be
//!   reached — that shadowing is logged as a warning so a grammar author
//!   notices a probably-unintended rule.

use std::rc::Rc;

use crate::charset::RangeItem;
use crate::expr::Expr;
use crate::result::{ErrKind, FailDetail, PResult};
use crate::rule::Rule;
use crate::value::Production;

/// A rule's compiled parsing closure (spec.md §3: "attachment installs a
/// compiled parsing closure in the rule's cell"; §4.3's rule compiler).
/// Built once at attach time from the rule's optimized expression, guard,
/// and transform, rather than re-derived from the `Rule` value on every
/// `Nonterminal` evaluation.
pub type RuleFn = Rc<dyn Fn(&crate::cache::ParseCtx<'_>, usize) -> PResult>;

/// The cell closure installed for a symbol with no attached rule — always
/// live, so a `Nonterminal` evaluation never has to special-case an
/// absent closure.
pub fn undefined_closure(symbol: Rc<str>) -> RuleFn {
    Rc::new(move |_ctx, _pos| PResult::Err(ErrKind::InactiveRule { rule: symbol.clone() }))
}

/// Compiles `rule`'s expression, guard, and transform into the closure
/// its cell will hold: evaluates the expression, then applies the guard
/// (forcing the value) and the transform (preserving laziness by
/// rewrapping in a fresh thunk), mirroring spec.md §4.3's description of
/// a rule's top-level closure wrapping its expression closure.
pub fn compiled_closure(rule: &Rule) -> RuleFn {
    let expr = rule.raw_expr().clone();
    let guard = rule.guard.clone();
    let transform = rule.transform.clone();
    Rc::new(move |ctx: &crate::cache::ParseCtx<'_>, pos: usize| {
        match crate::eval::eval(&expr, ctx, pos) {
            PResult::Ok { position, production } => {
                if let Some(guard) = &guard {
                    let v = production.force();
                    if !guard(&v) {
                        PResult::Err(ErrKind::FailedParse { at: pos, detail: FailDetail::leaf(expr.clone()) })
                    } else if let Some(transform) = &transform {
                        let transform = transform.clone();
                        PResult::ok(position, Production::lazy(move || transform(&v)))
                    } else {
                        PResult::ok(position, Production::ready(v))
                    }
                } else if let Some(transform) = &transform {
                    let transform = transform.clone();
                    PResult::ok(
                        position,
                        Production::lazy(move || {
                            let v = production.force();
                            transform(&v)
                        }),
                    )
                } else {
                    PResult::ok(position, production)
                }
            }
            err => err,
        }
    })
}

/// Recursively rewrites `expr`, applying the `Or`-of-literals
/// optimizations at every level.
pub fn compile_expression(expr: Rc<Expr>) -> Rc<Expr> {
    match expr.as_ref() {
        Expr::Or(subs) => {
            let rewritten: Vec<Expr> = subs.iter().map(|s| (*compile_expression(Rc::new(s.clone()))).clone()).collect();
            warn_on_shadowed_prefixes(&rewritten);
            if let Some(ranges) = as_single_char_ranges(&rewritten) {
                return Rc::new(Expr::CharRanges(ranges.into()));
            }
            Rc::new(Expr::Or(rewritten.into()))
        }
        Expr::And(subs) => {
            let rewritten: Vec<Expr> = subs.iter().map(|s| (*compile_expression(Rc::new(s.clone()))).clone()).collect();
            Rc::new(Expr::And(rewritten.into()))
        }
        Expr::Not(inner) => Rc::new(Expr::Not(compile_expression(inner.clone()))),
        Expr::NegAhead(inner) => Rc::new(Expr::NegAhead(compile_expression(inner.clone()))),
        Expr::Ahead(inner) => Rc::new(Expr::Ahead(compile_expression(inner.clone()))),
        Expr::Star(inner) => Rc::new(Expr::Star(compile_expression(inner.clone()))),
        Expr::Plus(inner) => Rc::new(Expr::Plus(compile_expression(inner.clone()))),
        Expr::Optional(inner) => Rc::new(Expr::Optional(compile_expression(inner.clone()))),
        Expr::Predicate { name, predicate, inner } => Rc::new(Expr::Predicate {
            name: name.clone(),
            predicate: predicate.clone(),
            inner: compile_expression(inner.clone()),
        }),
        _ => expr,
    }
}

/// If every branch is a case-sensitive one-character `Literal`, returns
/// the equivalent `CharRanges` items; otherwise `None`.
fn as_single_char_ranges(branches: &[Expr]) -> Option<Vec<RangeItem>> {
    let mut items = Vec::with_capacity(branches.len());
    for b in branches {
        match b {
            Expr::Literal { text, case_sensitive: true } => {
                let mut chars = text.chars();
                let (Some(c), None) = (chars.next(), chars.next()) else { return None };
                items.push(RangeItem::One(c));
            }
            _ => return None,
        }
    }
    Some(items)
}

/// Warns when a literal-string branch can never be reached because an
/// earlier branch is a strict prefix of it under ordered choice — PEG's
/// first-success semantics mean the earlier, shorter branch always wins.
fn warn_on_shadowed_prefixes(branches: &[Expr]) {
    let literals: Vec<(usize, &str)> = branches
        .iter()
        .enumerate()
        .filter_map(|(i, b)| match b {
            Expr::Literal { text, case_sensitive: true } => Some((i, text.as_ref())),
            _ => None,
        })
        .collect();
    for &(i, earlier) in &literals {
        for &(j, later) in &literals {
            if j > i && later.starts_with(earlier) && later != earlier {
                log::warn!(
                    "branch {j} (\"{later}\") is unreachable: shadowed by earlier prefix branch {i} (\"{earlier}\")"
                );
            }
        }
    }
}
