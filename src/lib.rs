//! pegrat — a packrat PEG parsing engine with Warth-style left recursion
//! support.
//!
//! # Quick Start
//!
//! ```rust
//! use pegrat::{Expr, Registry, parse};
//!
//! let registry = Registry::new();
//! registry.add_rule("digit", Expr::char_ranges(vec![
//!     pegrat::RangeItem::Pair('0', '9'),
//! ])).unwrap();
//! registry.add_rule("expr", Expr::choice(vec![
//!     Expr::seq(vec![
//!         Expr::nonterminal("expr"),
//!         Expr::literal("+"),
//!         Expr::nonterminal("digit"),
//!     ]),
//!     Expr::nonterminal("digit"),
//! ])).unwrap();
//!
//! let rule = registry.find_rule("expr").unwrap();
//! let outcome = parse(&registry, rule.raw_expr(), "1+2+3", 0, None, false).unwrap();
//! assert!(outcome.ok);
//! println!("{}", outcome.production.unwrap().flatten_text());
//! ```
//!
//! # Features
//!
//! - Strict first-success ordered choice (`Or`), not longest-match
//! - Full support for direct and indirect left recursion (Warth et al.)
//! - Lazy production values: transforms on discarded branches never run
//! - A small rule registry with guarded removal and rule tracing

pub mod analysis;
pub mod cache;
pub mod charset;
pub mod compile;
pub mod driver;
pub mod error;
pub mod eval;
pub mod expr;
pub mod input;
pub mod registry;
pub mod result;
pub mod rule;
pub mod trace;
pub mod value;

pub use analysis::GrammarAnalysis;
pub use charset::RangeItem;
pub use driver::{parse, ParseOutcome};
pub use error::{InvalidExpressionError, LeftRecursionError, ParseFailure, SimpleParseError};
pub use expr::{Expr, InvalidExpr};
pub use registry::{Registry, RegistryError};
pub use result::{ErrKind, PResult};
pub use rule::{Rule, RuleBuilder};
pub use value::{FunctionTerminalFn, PredicateFn, Production, TerminalFlag, TerminalOutcome, Value};
