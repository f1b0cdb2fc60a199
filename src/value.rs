//! The dynamic production value and its lazy thunk wrapper (spec.md §3
//! "Value" / "Production").
//!
//! Mirrors the "dynamic tagged tree" design the teacher uses for parse
//! output (`xml_node::XmlNode`), but applied to arbitrary production
//! values rather than XML nodes specifically, plus an `Opaque` escape
//! hatch for whatever a `.function()`/`.lambda()`/`.around()` transform
//! returns.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A semantic predicate attached to a `Predicate` expression: given the
/// matched `Value`, decide whether to keep it.
pub type PredicateFn = Rc<dyn Fn(&Value) -> bool>;

/// The third, optional element of a function-terminal's return value
/// (spec.md §4.5): an explicit override of the success/failure call that
/// `end_position` alone would make, or a failure detail.
#[derive(Clone, Debug)]
pub enum TerminalFlag {
    /// Force success regardless of where `end_position` landed.
    Success,
    /// Force failure, carrying a human-readable reason.
    Failure(Rc<str>),
}

/// The 2-or-3-value result of calling a `FunctionTerminal`'s user
/// function (spec.md §4.5): `production` is only meaningful on success;
/// `end_position` is the position the match should advance to (`None`
/// means "stayed at the call position", a zero-width match); `flag`
/// overrides the success/failure call `end_position` alone would make.
///
/// Success iff `flag` is `Some(Success)`, or (`flag` is `None`/absent
/// and `end_position` is `None` or strictly greater than the call
/// position). Otherwise the call fails, at `end_position` if given or
/// else the call position, carrying `flag`'s detail if it was
/// `Some(Failure(_))`.
#[derive(Clone, Debug)]
pub struct TerminalOutcome {
    pub production: Value,
    pub end_position: Option<usize>,
    pub flag: Option<TerminalFlag>,
}

impl TerminalOutcome {
    /// Builds a plain two-value success: `(production, end_position)`.
    pub fn matched(production: Value, end_position: usize) -> Self {
        TerminalOutcome { production, end_position: Some(end_position), flag: None }
    }

    /// Builds a three-value failure carrying a detail message.
    pub fn failed(end_position: Option<usize>, detail: impl Into<Rc<str>>) -> Self {
        TerminalOutcome {
            production: Value::Empty,
            end_position,
            flag: Some(TerminalFlag::Failure(detail.into())),
        }
    }
}

/// A user function backing a `FunctionTerminal` expression — the
/// function-terminal protocol of spec.md §4.5. Given the input buffer
/// and a start position, returns a `TerminalOutcome` describing the
/// 2-or-3-value `(production, end_position, flag)` result.
pub type FunctionTerminalFn =
    Rc<dyn Fn(crate::input::CharBuf<'_>, usize) -> TerminalOutcome>;

/// The dynamic value produced by a successful match.
#[derive(Clone)]
pub enum Value {
    Char(char),
    Text(Rc<str>),
    List(Rc<[Value]>),
    Empty,
    /// Escape hatch for user transforms that build their own domain type.
    Opaque(Rc<dyn Any>),
}

impl Value {
    pub fn text(s: impl Into<Rc<str>>) -> Self {
        Value::Text(s.into())
    }

    pub fn list(items: impl Into<Vec<Value>>) -> Self {
        Value::List(items.into().into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Flattens a matched sequence into its underlying text, the way a
    /// `.text()` rule option does — concatenates `Char`/`Text` leaves
    /// depth-first, ignoring `Empty`.
    pub fn flatten_text(&self) -> String {
        let mut out = String::new();
        self.flatten_text_into(&mut out);
        out
    }

    fn flatten_text_into(&self, out: &mut String) {
        match self {
            Value::Char(c) => out.push(*c),
            Value::Text(s) => out.push_str(s),
            Value::List(items) => {
                for item in items.iter() {
                    item.flatten_text_into(out);
                }
            }
            Value::Empty | Value::Opaque(_) => {}
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Char(c) => write!(f, "Char({c:?})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Empty => write!(f, "Empty"),
            Value::Opaque(_) => write!(f, "Opaque(..)"),
        }
    }
}

enum ProdState {
    Thunk(Box<dyn FnOnce() -> Value>),
    Forced(Value),
}

/// A lazily-computed production. Cloning is a pointer clone; the
/// underlying transform runs at most once, the first time the value is
/// actually read — so discarded matches (inside `Not`, `NegAhead`,
/// `Ahead`, or a failed alternative) never pay the transform's cost.
#[derive(Clone)]
pub struct Production(Rc<RefCell<ProdState>>);

impl Production {
    pub fn ready(value: Value) -> Self {
        Production(Rc::new(RefCell::new(ProdState::Forced(value))))
    }

    pub fn lazy(thunk: impl FnOnce() -> Value + 'static) -> Self {
        Production(Rc::new(RefCell::new(ProdState::Thunk(Box::new(thunk)))))
    }

    /// Forces the thunk on first call; subsequent calls return the cached
    /// value without re-running user code.
    pub fn force(&self) -> Value {
        let mut state = self.0.borrow_mut();
        if let ProdState::Thunk(_) = &*state {
            let ProdState::Thunk(thunk) =
                std::mem::replace(&mut *state, ProdState::Forced(Value::Empty))
            else {
                unreachable!()
            };
            *state = ProdState::Forced(thunk());
        }
        match &*state {
            ProdState::Forced(v) => v.clone(),
            ProdState::Thunk(_) => unreachable!(),
        }
    }
}

impl fmt::Debug for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.borrow() {
            ProdState::Thunk(_) => write!(f, "Production(<thunk>)"),
            ProdState::Forced(v) => write!(f, "Production({v:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn forced_thunk_runs_at_most_once() {
        let calls = Rc::new(Cell::new(0));
        let calls2 = calls.clone();
        let prod = Production::lazy(move || {
            calls2.set(calls2.get() + 1);
            Value::text("x")
        });
        assert_eq!(calls.get(), 0);
        let _ = prod.force();
        let _ = prod.force();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn clone_shares_the_same_thunk() {
        let calls = Rc::new(Cell::new(0));
        let calls2 = calls.clone();
        let prod = Production::lazy(move || {
            calls2.set(calls2.get() + 1);
            Value::Empty
        });
        let clone = prod.clone();
        let _ = prod.force();
        let _ = clone.force();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn matched_outcome_carries_no_flag() {
        let outcome = TerminalOutcome::matched(Value::Char('x'), 1);
        assert!(outcome.flag.is_none());
        assert_eq!(outcome.end_position, Some(1));
    }

    #[test]
    fn failed_outcome_carries_a_failure_flag() {
        let outcome = TerminalOutcome::failed(Some(2), "expected a digit");
        assert!(matches!(outcome.flag, Some(TerminalFlag::Failure(ref m)) if &**m == "expected a digit"));
        assert_eq!(outcome.end_position, Some(2));
    }

    #[test]
    fn flatten_text_concatenates_depth_first() {
        let v = Value::list(vec![
            Value::Char('a'),
            Value::list(vec![Value::text("bc"), Value::Char('d')]),
            Value::Empty,
        ]);
        assert_eq!(v.flatten_text(), "abcd");
    }
}
