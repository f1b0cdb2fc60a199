//! The direct-interpreted evaluator (spec.md §4.2).
//!
//! One function per expression shape, dispatched over the `Expr` tree.
//! `Or` is strict first-success ordered choice — unlike the teacher's
//! `native_parser.rs::parse_alternatives`, which keeps the *longest*
//! match across every alternative, this evaluator commits to the first
//! alternative that matches at all, per PEG semantics. That longest-match
//! behavior belongs to the teacher's Earley-flavored grammar, not here.

use std::rc::Rc;

use crate::cache::apply_rule;
use crate::cache::ParseCtx;
use crate::charset::CharSet;
use crate::expr::Expr;
use crate::result::{ErrKind, FailDetail, PResult};
use crate::value::{Production, TerminalFlag, Value};

pub fn eval(expr: &Rc<Expr>, ctx: &ParseCtx<'_>, pos: usize) -> PResult {
    match expr.as_ref() {
        Expr::Character => match ctx.input.at(pos) {
            Some(c) => PResult::ok(pos + 1, Production::ready(Value::Char(c))),
            None => fail(expr, pos),
        },
        Expr::Literal { text, case_sensitive } => {
            if ctx.input.matches_literal(pos, text, *case_sensitive) {
                let end = pos + text.chars().count();
                PResult::ok(end, Production::ready(Value::text(text.clone())))
            } else {
                fail(expr, pos)
            }
        }
        Expr::LengthString(n) => match ctx.input.substring(pos, *n) {
            Some(s) => PResult::ok(pos + n, Production::ready(Value::text(s))),
            None => fail(expr, pos),
        },
        Expr::CharRanges(items) => {
            let set = CharSet::from_items(items);
            match ctx.input.at(pos) {
                Some(c) if set.contains(c) => PResult::ok(pos + 1, Production::ready(Value::Char(c))),
                _ => fail(expr, pos),
            }
        }
        Expr::Predicate { predicate, inner, .. } => match eval(inner, ctx, pos) {
            PResult::Ok { position, production } => {
                let v = production.force();
                if predicate(&v) {
                    PResult::ok(position, Production::ready(v))
                } else {
                    fail(expr, pos)
                }
            }
            err => err,
        },
        Expr::FunctionTerminal(f) => eval_function_terminal(f(ctx.input, pos), expr, pos),
        Expr::Nonterminal(name) => apply_rule(ctx, name, pos),
        Expr::And(subs) => eval_and(subs, ctx, pos, expr),
        Expr::Or(subs) => eval_or(subs, ctx, pos, expr),
        Expr::Not(inner) => match eval(inner, ctx, pos) {
            PResult::Ok { .. } => fail(expr, pos),
            PResult::Err(ErrKind::LeftRecursionMarker { rule }) => {
                PResult::Err(ErrKind::LeftRecursionMarker { rule })
            }
            PResult::Err(_) => match ctx.input.at(pos) {
                Some(c) => PResult::ok(pos + 1, Production::ready(Value::Char(c))),
                None => fail(expr, pos),
            },
        },
        Expr::NegAhead(inner) => match eval(inner, ctx, pos) {
            PResult::Ok { .. } => fail(expr, pos),
            PResult::Err(ErrKind::LeftRecursionMarker { rule }) => {
                PResult::Err(ErrKind::LeftRecursionMarker { rule })
            }
            PResult::Err(_) => PResult::ok(pos, Production::ready(Value::Empty)),
        },
        Expr::Ahead(inner) => match eval(inner, ctx, pos) {
            PResult::Ok { production, .. } => PResult::ok(pos, production),
            err => err,
        },
        Expr::Star(inner) => {
            let (end, items) = eval_repeat(inner, ctx, pos);
            PResult::ok(
                end,
                Production::lazy(move || Value::list(items.iter().map(|p| p.force()).collect::<Vec<_>>())),
            )
        }
        Expr::Plus(inner) => {
            let (end, items) = eval_repeat(inner, ctx, pos);
            if items.is_empty() {
                fail(expr, pos)
            } else {
                PResult::ok(
                    end,
                    Production::lazy(move || {
                        Value::list(items.iter().map(|p| p.force()).collect::<Vec<_>>())
                    }),
                )
            }
        }
        Expr::Optional(inner) => match eval(inner, ctx, pos) {
            ok @ PResult::Ok { .. } => ok,
            PResult::Err(ErrKind::LeftRecursionMarker { rule }) => {
                PResult::Err(ErrKind::LeftRecursionMarker { rule })
            }
            PResult::Err(_) => PResult::ok(pos, Production::ready(Value::Empty)),
        },
    }
}

fn fail(expr: &Rc<Expr>, at: usize) -> PResult {
    PResult::Err(ErrKind::FailedParse { at, detail: FailDetail::leaf(expr.clone()) })
}

/// Resolves a `FunctionTerminal` call's 2-or-3-value outcome into a
/// `PResult` per the function-terminal protocol (spec.md §4.5): success
/// iff `flag == Some(Success)`, or (`flag` absent and `end_position` is
/// `None` or strictly past `pos`); otherwise a failure at `end_position`
/// (or `pos`), carrying `flag`'s detail when it is `Some(Failure(_))`.
fn eval_function_terminal(outcome: crate::value::TerminalOutcome, expr: &Rc<Expr>, pos: usize) -> PResult {
    let crate::value::TerminalOutcome { production, end_position, flag } = outcome;
    let succeeds = match &flag {
        Some(TerminalFlag::Success) => true,
        Some(TerminalFlag::Failure(_)) => false,
        None => match end_position {
            Some(end) => end > pos,
            None => true,
        },
    };
    if succeeds {
        let end = end_position.unwrap_or(pos);
        PResult::ok(end, Production::ready(production))
    } else {
        let at = end_position.unwrap_or(pos);
        match flag {
            Some(TerminalFlag::Failure(detail)) => {
                PResult::Err(ErrKind::FailedParse { at, detail: FailDetail::leaf_with_message(expr.clone(), detail) })
            }
            _ => fail(expr, at),
        }
    }
}

fn eval_and(subs: &Rc<[Expr]>, ctx: &ParseCtx<'_>, pos: usize, whole: &Rc<Expr>) -> PResult {
    let mut cur = pos;
    let mut productions = Vec::with_capacity(subs.len());
    for sub in subs.iter() {
        let sub_rc = Rc::new(sub.clone());
        match eval(&sub_rc, ctx, cur) {
            PResult::Ok { position, production } => {
                cur = position;
                productions.push(production);
            }
            PResult::Err(ErrKind::LeftRecursionMarker { rule }) => {
                return PResult::Err(ErrKind::LeftRecursionMarker { rule });
            }
            PResult::Err(ErrKind::FailedParse { at, detail }) => {
                return PResult::Err(ErrKind::FailedParse {
                    at,
                    detail: FailDetail::wrap(whole.clone(), detail),
                });
            }
            err @ PResult::Err(_) => return err,
        }
    }
    let end = cur;
    PResult::ok(
        end,
        Production::lazy(move || Value::list(productions.iter().map(|p| p.force()).collect::<Vec<_>>())),
    )
}

fn eval_or(subs: &Rc<[Expr]>, ctx: &ParseCtx<'_>, pos: usize, whole: &Rc<Expr>) -> PResult {
    // Tie-break policy (spec.md §4.2): try every alternative (an inactive
    // rule in one branch does not abort the others), then report the
    // deepest FailedParse by position, ties kept at the earliest branch;
    // an InactiveRule is reported only when no branch produced a
    // FailedParse at all.
    let mut deepest: Option<(usize, FailDetail)> = None;
    let mut inactive: Option<Rc<str>> = None;
    for sub in subs.iter() {
        let sub_rc = Rc::new(sub.clone());
        match eval(&sub_rc, ctx, pos) {
            ok @ PResult::Ok { .. } => return ok,
            PResult::Err(ErrKind::LeftRecursionMarker { rule }) => {
                return PResult::Err(ErrKind::LeftRecursionMarker { rule });
            }
            PResult::Err(ErrKind::FailedParse { at, detail }) => {
                let is_deeper = match &deepest {
                    Some((best_at, _)) => at > *best_at,
                    None => true,
                };
                if is_deeper {
                    deepest = Some((at, detail));
                }
            }
            PResult::Err(ErrKind::InactiveRule { rule }) => {
                if inactive.is_none() {
                    inactive = Some(rule);
                }
            }
        }
    }
    match deepest {
        Some((at, detail)) => {
            PResult::Err(ErrKind::FailedParse { at, detail: FailDetail::wrap(whole.clone(), detail) })
        }
        None => match inactive {
            Some(rule) => PResult::Err(ErrKind::InactiveRule { rule }),
            None => PResult::Err(ErrKind::FailedParse { at: pos, detail: FailDetail::leaf(whole.clone()) }),
        },
    }
}

/// Greedily matches `inner` zero or more times starting at `pos`,
/// returning the end position and the matched productions in order.
/// Stops (without erroring) on the first failure or on a zero-width
/// match, which would otherwise loop forever.
fn eval_repeat(inner: &Rc<Expr>, ctx: &ParseCtx<'_>, pos: usize) -> (usize, Vec<Production>) {
    let mut cur = pos;
    let mut items = Vec::new();
    loop {
        match eval(inner, ctx, cur) {
            PResult::Ok { position, production } => {
                if position == cur {
                    break;
                }
                cur = position;
                items.push(production);
            }
            PResult::Err(_) => break,
        }
    }
    (cur, items)
}
