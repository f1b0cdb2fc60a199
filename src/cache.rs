//! Memoization and the Warth et al. left-recursion algorithm (spec.md
//! §4.4) — the algorithmic core of the engine.
//!
//! Grounded on the teacher's left-recursion *detection* in
//! `parse_context.rs` (`ParseContext::enter_rule` rejects immediately on
//! re-entry), generalized here into full left-recursion *support*: a
//! left-recursive rule is allowed to seed a provisional failure, then
//! grow that seed by re-evaluating itself against its own improving
//! memoized answer until a grow iteration stops advancing the end
//! position.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::input::CharBuf;
use crate::registry::Registry;
use crate::result::{ErrKind, FailDetail, PResult};

/// Tracks, for one position, which rule is growing and which rules have
/// been involved in its left-recursive cycle so far.
struct Head {
    rule: Rc<str>,
    involved: HashSet<Rc<str>>,
    /// Rules still owed a re-evaluation this grow iteration. A multiset:
    /// `recall` removes one occurrence per visit, not the whole entry, so
    /// a rule visited twice in one growth round is re-evaluated twice.
    eval_set: Vec<Rc<str>>,
}

/// The memo slot for one `(rule, position)` pair.
enum MemoEntry {
    Answer(PResult),
    /// A left-recursion marker: `seed` is the best answer found so far
    /// (starts as a failure, improves as growth proceeds), `head` is set
    /// the first time another in-flight call recurses back into this
    /// rule at this position.
    LeftRecursion { seed: PResult, head: Option<Rc<RefCell<Head>>> },
}

struct StackFrame {
    rule: Rc<str>,
    pos: usize,
    entry: Rc<RefCell<MemoEntry>>,
}

/// Per-parse mutable state: the memo table, the position-indexed head
/// map, and the call stack used to wire up `setupLR`. Deliberately not
/// `Send`/`Sync` — a fresh `ParseCtx` is built per `parse()` call and
/// never shared across threads (spec.md §5).
pub struct ParseCtx<'a> {
    pub(crate) input: CharBuf<'a>,
    registry: &'a Registry,
    cache: RefCell<HashMap<(Rc<str>, usize), Rc<RefCell<MemoEntry>>>>,
    heads: RefCell<HashMap<usize, Rc<RefCell<Head>>>>,
    stack: RefCell<Vec<StackFrame>>,
}

impl<'a> ParseCtx<'a> {
    pub fn new(input: CharBuf<'a>, registry: &'a Registry) -> Self {
        ParseCtx {
            input,
            registry,
            cache: RefCell::new(HashMap::new()),
            heads: RefCell::new(HashMap::new()),
            stack: RefCell::new(Vec::new()),
        }
    }
}

enum Recall {
    NotFound,
    Found(Rc<RefCell<MemoEntry>>),
    ForceFail,
}

fn recall(ctx: &ParseCtx<'_>, rule: &Rc<str>, pos: usize) -> Recall {
    let existing = ctx.cache.borrow().get(&(rule.clone(), pos)).cloned();
    let head = ctx.heads.borrow().get(&pos).cloned();
    let Some(head) = head else {
        return match existing {
            Some(e) => Recall::Found(e),
            None => Recall::NotFound,
        };
    };
    if existing.is_none() && *rule != head.borrow().rule && !head.borrow().involved.contains(rule) {
        return Recall::ForceFail;
    }
    let should_reeval = {
        let mut h = head.borrow_mut();
        if let Some(idx) = h.eval_set.iter().position(|r| r == rule) {
            h.eval_set.swap_remove(idx);
            true
        } else {
            false
        }
    };
    if should_reeval {
        let ans = eval_rule_body(ctx, rule, pos);
        let entry = Rc::new(RefCell::new(MemoEntry::Answer(ans)));
        ctx.cache.borrow_mut().insert((rule.clone(), pos), entry.clone());
        return Recall::Found(entry);
    }
    match existing {
        Some(e) => Recall::Found(e),
        None => Recall::NotFound,
    }
}

fn setup_lr(ctx: &ParseCtx<'_>, rule: &Rc<str>, pos: usize, lr_entry: &Rc<RefCell<MemoEntry>>) {
    let head = {
        let mut entry = lr_entry.borrow_mut();
        let MemoEntry::LeftRecursion { head, .. } = &mut *entry else { return };
        head.get_or_insert_with(|| {
            Rc::new(RefCell::new(Head { rule: rule.clone(), involved: HashSet::new(), eval_set: Vec::new() }))
        })
        .clone()
    };
    let stack = ctx.stack.borrow();
    for frame in stack.iter().rev() {
        if let MemoEntry::LeftRecursion { head: frame_head, .. } = &mut *frame.entry.borrow_mut() {
            *frame_head = Some(head.clone());
        }
        head.borrow_mut().involved.insert(frame.rule.clone());
        if frame.rule == *rule && frame.pos == pos {
            break;
        }
    }
}

fn grow_lr(ctx: &ParseCtx<'_>, rule: &Rc<str>, pos: usize, lr_entry: &Rc<RefCell<MemoEntry>>, head: Rc<RefCell<Head>>) -> PResult {
    ctx.heads.borrow_mut().insert(pos, head.clone());
    loop {
        {
            let mut h = head.borrow_mut();
            h.eval_set = h.involved.iter().cloned().collect();
        }
        let candidate = eval_rule_body(ctx, rule, pos);
        let seed = match &*lr_entry.borrow() {
            MemoEntry::LeftRecursion { seed, .. } => seed.clone(),
            MemoEntry::Answer(a) => a.clone(),
        };
        let improved = match (&candidate, &seed) {
            (PResult::Ok { position: p2, .. }, PResult::Ok { position: p1, .. }) => p2 > p1,
            (PResult::Ok { .. }, PResult::Err(_)) => true,
            _ => false,
        };
        if !improved {
            break;
        }
        log::trace!("left-recursive grow for '{rule}' at {pos} advanced");
        *lr_entry.borrow_mut() = MemoEntry::LeftRecursion { seed: candidate, head: Some(head.clone()) };
    }
    ctx.heads.borrow_mut().remove(&pos);
    let final_ans = match &*lr_entry.borrow() {
        MemoEntry::LeftRecursion { seed, .. } => seed.clone(),
        MemoEntry::Answer(a) => a.clone(),
    };
    ctx.cache
        .borrow_mut()
        .insert((rule.clone(), pos), Rc::new(RefCell::new(MemoEntry::Answer(final_ans.clone()))));
    final_ans
}

fn lr_answer(ctx: &ParseCtx<'_>, rule: &Rc<str>, pos: usize, lr_entry: Rc<RefCell<MemoEntry>>) -> PResult {
    let (seed, head) = match &*lr_entry.borrow() {
        MemoEntry::LeftRecursion { seed, head } => (seed.clone(), head.clone()),
        MemoEntry::Answer(a) => return a.clone(),
    };
    let Some(head) = head else { return seed };
    if head.borrow().rule != *rule {
        return seed;
    }
    if !seed.is_ok() {
        ctx.cache
            .borrow_mut()
            .insert((rule.clone(), pos), Rc::new(RefCell::new(MemoEntry::Answer(seed.clone()))));
        return seed;
    }
    grow_lr(ctx, rule, pos, &lr_entry, head)
}

/// Evaluates `rule`'s attached body at `pos` by invoking the compiled
/// parsing closure installed on its cell (spec.md §3, §4.3) — the cell's
/// `function` already captures the optimized expression, guard, and
/// transform from the rule that was attached, so this is a single
/// indirect call rather than a re-walk of the `Rule` value on every
/// invocation.
fn eval_rule_body(ctx: &ParseCtx<'_>, rule: &Rc<str>, pos: usize) -> PResult {
    let Some(cell) = ctx.registry.cell(rule) else {
        return PResult::Err(ErrKind::InactiveRule { rule: rule.clone() });
    };
    let compiled = cell.borrow().function.clone();
    let result = compiled(ctx, pos);
    cell.borrow_mut().trace.record(pos, &result);
    result
}

/// Memoized application of a named rule at `pos` — the entry point every
/// `Nonterminal` evaluation goes through.
pub fn apply_rule(ctx: &ParseCtx<'_>, rule: &str, pos: usize) -> PResult {
    let rule_rc: Rc<str> = Rc::from(rule);
    match recall(ctx, &rule_rc, pos) {
        Recall::ForceFail => {
            return PResult::Err(ErrKind::FailedParse {
                at: pos,
                detail: FailDetail::leaf(Rc::new(crate::expr::Expr::Nonterminal(rule_rc.clone()))),
            });
        }
        Recall::Found(entry) => {
            let is_lr = matches!(&*entry.borrow(), MemoEntry::LeftRecursion { .. });
            if is_lr {
                setup_lr(ctx, &rule_rc, pos, &entry);
                let seed = match &*entry.borrow() {
                    MemoEntry::LeftRecursion { seed, .. } => seed.clone(),
                    MemoEntry::Answer(a) => a.clone(),
                };
                // A still-uninitialized marker means this rule has no seed
                // yet at this position: per spec.md §4.4, a recursive
                // self-reference in that state must fail ordinarily so an
                // enclosing `Or` can fall through to a base-case
                // alternative, rather than seeing the raw marker and
                // aborting the whole choice. Once growing has produced a
                // real seed, that seed is returned as-is for reuse.
                return match seed {
                    PResult::Err(ErrKind::LeftRecursionMarker { .. }) => PResult::Err(ErrKind::FailedParse {
                        at: pos,
                        detail: FailDetail::leaf(Rc::new(crate::expr::Expr::Nonterminal(rule_rc.clone()))),
                    }),
                    other => other,
                };
            }
            return match &*entry.borrow() {
                MemoEntry::Answer(a) => a.clone(),
                MemoEntry::LeftRecursion { seed, .. } => seed.clone(),
            };
        }
        Recall::NotFound => {}
    }

    let marker = Rc::new(RefCell::new(MemoEntry::LeftRecursion {
        seed: PResult::Err(ErrKind::LeftRecursionMarker { rule: rule_rc.clone() }),
        head: None,
    }));
    ctx.cache.borrow_mut().insert((rule_rc.clone(), pos), marker.clone());
    ctx.stack.borrow_mut().push(StackFrame { rule: rule_rc.clone(), pos, entry: marker.clone() });

    let ans = eval_rule_body(ctx, &rule_rc, pos);

    ctx.stack.borrow_mut().pop();

    let captured_head = match &*marker.borrow() {
        MemoEntry::LeftRecursion { head, .. } => head.clone(),
        MemoEntry::Answer(_) => None,
    };
    if let Some(head) = captured_head {
        *marker.borrow_mut() = MemoEntry::LeftRecursion { seed: ans, head: Some(head) };
        lr_answer(ctx, &rule_rc, pos, marker)
    } else {
        ctx.cache
            .borrow_mut()
            .insert((rule_rc.clone(), pos), Rc::new(RefCell::new(MemoEntry::Answer(ans.clone()))));
        ans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    fn parse_all(reg: &Registry, text: &str, start: &str) -> PResult {
        let chars: Vec<char> = text.chars().collect();
        let ctx = ParseCtx::new(CharBuf::new(&chars, chars.len()), reg);
        apply_rule(&ctx, start, 0)
    }

    #[test]
    fn non_recursive_rule_memoizes_through_nonterminal() {
        let reg = Registry::new();
        reg.add_rule("digit", Expr::char_ranges(vec![crate::charset::RangeItem::Pair('0', '9')])).unwrap();
        reg.add_rule("two", Expr::seq(vec![Expr::nonterminal("digit"), Expr::nonterminal("digit")])).unwrap();
        let r = parse_all(&reg, "42", "two");
        assert_eq!(r.end_position(), Some(2));
    }

    #[test]
    fn direct_left_recursion_grows_to_longest_match() {
        // expr <- expr "+" digit / digit
        let reg = Registry::new();
        reg.add_rule("digit", Expr::char_ranges(vec![crate::charset::RangeItem::Pair('0', '9')])).unwrap();
        reg.add_rule(
            "expr",
            Expr::choice(vec![
                Expr::seq(vec![
                    Expr::nonterminal("expr"),
                    Expr::literal("+"),
                    Expr::nonterminal("digit"),
                ]),
                Expr::nonterminal("digit"),
            ]),
        )
        .unwrap();
        let r = parse_all(&reg, "1+2+3", "expr");
        assert_eq!(r.end_position(), Some(5));
    }

    #[test]
    fn undefined_nonterminal_is_inactive_rule() {
        let reg = Registry::new();
        reg.add_rule("top", Expr::nonterminal("missing")).unwrap();
        let r = parse_all(&reg, "x", "top");
        assert!(matches!(r, PResult::Err(ErrKind::InactiveRule { .. })));
    }

    #[test]
    fn rule_transform_wraps_matched_value() {
        let reg = Registry::new();
        let rule = crate::rule::RuleBuilder::new(Expr::literal("ok")).text().build();
        reg.add_built_rule("tagged", rule).unwrap();
        let r = parse_all(&reg, "ok", "tagged");
        match r {
            PResult::Ok { production, .. } => {
                assert_eq!(production.force().as_text(), Some("ok"));
            }
            PResult::Err(_) => panic!("expected match"),
        }
    }
}
