//! Rule bodies and the rule-definition builder (spec.md §6 "Rule
//! Definition Options").
//!
//! The surface grammar-description syntax is out of scope; this is the
//! Rust-level API a caller builds rules through, equivalent in power to
//! the option table spec.md describes: `when` (guard), `constant`,
//! `function`, `identity`, `text`, `lambda`, `destructure`, `around`.
//! Multiple transforms compose as `compose(later, earlier)`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::expr::Expr;
use crate::value::{PredicateFn, Value};

pub type Transform = Rc<dyn Fn(&Value) -> Value>;

/// A compiled, attachable rule body: an optimized expression plus an
/// optional guard and an optional value transform.
///
/// `attached_to` is the back-reference spec.md §3 requires: `None` while
/// the rule is detached, `Some(symbol)` once a registry has attached it.
/// It lives behind an `Rc<RefCell<_>>` rather than a plain field so every
/// `Clone` of a `Rule` shares one attachment marker — cloning a `Rule`
/// does not give it a fresh, independently-attachable identity.
#[derive(Clone)]
pub struct Rule {
    pub(crate) expr: Rc<Expr>,
    pub(crate) guard: Option<PredicateFn>,
    pub(crate) transform: Option<Transform>,
    pub(crate) attached_to: Rc<RefCell<Option<String>>>,
}

impl Rule {
    pub fn raw_expr(&self) -> &Rc<Expr> {
        &self.expr
    }

    /// The symbol this rule is currently attached to, if any (spec.md §3
    /// invariant 2: a rule is attached to at most one symbol at a time).
    pub fn attached_symbol(&self) -> Option<String> {
        self.attached_to.borrow().clone()
    }
}

/// Composes two transforms so `later` runs on the output of `earlier` —
/// the order spec.md's rule-option table requires when several options
/// are combined on one rule.
pub fn compose(later: Transform, earlier: Transform) -> Transform {
    Rc::new(move |v: &Value| later(&earlier(v)))
}

/// Builds a `Rule` from an expression plus a chain of rule-definition
/// options.
pub struct RuleBuilder {
    expr: Rc<Expr>,
    guard: Option<PredicateFn>,
    transform: Option<Transform>,
}

impl RuleBuilder {
    pub fn new(expr: Expr) -> Self {
        RuleBuilder { expr: Rc::new(expr), guard: None, transform: None }
    }

    fn then(mut self, t: Transform) -> Self {
        self.transform = Some(match self.transform.take() {
            Some(earlier) => compose(t, earlier),
            None => t,
        });
        self
    }

    /// Reject a match unless `guard` accepts the raw production value.
    /// Guards compose by conjunction if called more than once.
    pub fn when(mut self, guard: impl Fn(&Value) -> bool + 'static) -> Self {
        let guard: PredicateFn = Rc::new(guard);
        self.guard = Some(match self.guard.take() {
            Some(earlier) => Rc::new(move |v| earlier(v) && guard(v)),
            None => guard,
        });
        self
    }

    /// Discard the matched value entirely, replacing it with `value`.
    pub fn constant(self, value: Value) -> Self {
        self.then(Rc::new(move |_| value.clone()))
    }

    /// Apply an arbitrary transform to the raw production value.
    pub fn function(self, f: impl Fn(&Value) -> Value + 'static) -> Self {
        self.then(Rc::new(f))
    }

    /// Pass the raw production value through unchanged. Useful as a
    /// no-op placeholder when composing rule options conditionally.
    pub fn identity(self) -> Self {
        self.then(Rc::new(|v: &Value| v.clone()))
    }

    /// Flatten the matched value to its underlying text.
    pub fn text(self) -> Self {
        self.then(Rc::new(|v: &Value| Value::Text(Rc::from(v.flatten_text()))))
    }

    /// Treat a matched `List` as a positional argument vector and apply
    /// `f`; passes `v` through unchanged if it is not a `List`.
    pub fn lambda(self, f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        self.then(Rc::new(move |v: &Value| match v.as_list() {
            Some(items) => f(items),
            None => v.clone(),
        }))
    }

    /// Same shape as `lambda`, named separately to match the teacher's
    /// option vocabulary for destructuring a matched sequence.
    pub fn destructure(self, f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        self.lambda(f)
    }

    /// Wrap the transform with access to the matched span, not just the
    /// value — the `around` option.
    pub fn around(mut self, f: impl Fn(&Value, std::ops::Range<usize>) -> Value + 'static) -> Self {
        // `around` needs the match span, which only the caller applying the
        // rule knows; stash it as a transform keyed purely on value and let
        // `Rule::expr`'s evaluator supply a zero-length range as a default
        // when no span tracking wrapper is present. Callers that need the
        // real span should prefer `function`/`lambda` composed with an
        // expression that captures position itself.
        self.transform = Some(match self.transform.take() {
            Some(earlier) => {
                let f = Rc::new(f);
                Rc::new(move |v: &Value| f(&earlier(v), 0..0))
            }
            None => {
                let f = Rc::new(f);
                Rc::new(move |v: &Value| f(v, 0..0))
            }
        });
        self
    }

    pub fn build(self) -> Rule {
        Rule {
            expr: self.expr,
            guard: self.guard,
            transform: self.transform,
            attached_to: Rc::new(RefCell::new(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_replaces_value() {
        let rule = RuleBuilder::new(Expr::Character).constant(Value::text("const")).build();
        let v = (rule.transform.unwrap())(&Value::Char('x'));
        assert_eq!(v.as_text(), Some("const"));
    }

    #[test]
    fn composed_transforms_run_in_order() {
        let rule = RuleBuilder::new(Expr::Character)
            .function(|v| Value::text(format!("[{}]", v.flatten_text())))
            .function(|v| Value::text(format!("<{}>", v.flatten_text())))
            .build();
        let v = (rule.transform.unwrap())(&Value::Char('x'));
        assert_eq!(v.as_text(), Some("<[x]>"));
    }

    #[test]
    fn guard_rejects_when_predicate_fails() {
        let rule = RuleBuilder::new(Expr::Character).when(|v| v.as_char() == Some('a')).build();
        let guard = rule.guard.unwrap();
        assert!(guard(&Value::Char('a')));
        assert!(!guard(&Value::Char('b')));
    }

    #[test]
    fn text_option_flattens_nested_list() {
        let rule = RuleBuilder::new(Expr::Character).text().build();
        let v = (rule.transform.unwrap())(&Value::list(vec![Value::Char('a'), Value::Char('b')]));
        assert_eq!(v.as_text(), Some("ab"));
    }

    #[test]
    fn freshly_built_rule_is_unattached() {
        let rule = RuleBuilder::new(Expr::Character).build();
        assert_eq!(rule.attached_symbol(), None);
    }

    #[test]
    fn clones_share_the_same_attachment_marker() {
        let rule = RuleBuilder::new(Expr::Character).build();
        let clone = rule.clone();
        *rule.attached_to.borrow_mut() = Some("sym".to_string());
        assert_eq!(clone.attached_symbol(), Some("sym".to_string()));
    }
}
