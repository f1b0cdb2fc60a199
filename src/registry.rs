//! Name-to-rule table (spec.md §3 invariants, §4.6 Rule Registry).
//!
//! Grounded on the teacher's bookkeeping split across `native_parser.rs`
//! (a `HashMap<String, Rule>`) and `grammar_analysis.rs` (liveness /
//! dependency recomputation rather than incrementally maintained
//! back-references) — `remove_rule` here takes the same stance: it
//! refuses to drop a rule still referenced by others, but does not try
//! to keep every other cell's bookkeeping perfectly in sync afterwards.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::compile::{compile_expression, compiled_closure, undefined_closure, RuleFn};
use crate::expr::Expr;
use crate::rule::Rule;
use crate::trace::TraceInfo;

/// One named slot in the registry. A symbol can exist with `rule: None`
/// (declared but undefined, e.g. forward-referenced from another rule's
/// body); its `function` is then a closure that always raises
/// `ErrKind::InactiveRule`, so `Nonterminal` evaluation never has to
/// special-case an absent closure — the cell's closure is always live.
pub struct RuleCell {
    pub(crate) rule: Option<Rule>,
    pub(crate) function: RuleFn,
    pub(crate) trace: TraceInfo,
    /// Names of rules whose expression references this symbol.
    pub(crate) referents: std::collections::HashSet<String>,
}

impl RuleCell {
    fn empty(symbol: &str) -> Self {
        RuleCell {
            rule: None,
            function: undefined_closure(Rc::from(symbol)),
            trace: TraceInfo::default(),
            referents: Default::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    AlreadyDefined(String),
    /// `add_built_rule` was given a `Rule` that is already attached to a
    /// different symbol (spec.md §3 invariant 2, §6's `add_rule`).
    AlreadyAttached(String),
    StillReferenced { symbol: String, by: Vec<String> },
    Undefined(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::AlreadyDefined(s) => write!(f, "rule '{s}' is already defined"),
            RegistryError::AlreadyAttached(to) => {
                write!(f, "rule is already attached to '{to}'")
            }
            RegistryError::StillReferenced { symbol, by } => {
                write!(f, "rule '{symbol}' is still referenced by: {}", by.join(", "))
            }
            RegistryError::Undefined(s) => write!(f, "no such rule '{s}'"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Walks an expression tree collecting every `Nonterminal` name it
/// mentions.
fn referenced_symbols(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Nonterminal(name) => out.push(name.to_string()),
        Expr::Predicate { inner, .. }
        | Expr::Not(inner)
        | Expr::NegAhead(inner)
        | Expr::Ahead(inner)
        | Expr::Star(inner)
        | Expr::Plus(inner)
        | Expr::Optional(inner) => referenced_symbols(inner, out),
        Expr::And(subs) | Expr::Or(subs) => {
            for sub in subs.iter() {
                referenced_symbols(sub, out);
            }
        }
        _ => {}
    }
}

/// The mutable symbol table a `ParseCtx` parses against. Not thread-safe
/// by design (spec.md §5): a `Registry` is a plain owned structure and
/// serializing mutation against in-flight parses is the caller's job.
pub struct Registry {
    cells: RefCell<HashMap<String, Rc<RefCell<RuleCell>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { cells: RefCell::new(HashMap::new()) }
    }

    fn cell_for(&self, symbol: &str) -> Rc<RefCell<RuleCell>> {
        self.cells
            .borrow_mut()
            .entry(symbol.to_string())
            .or_insert_with(|| Rc::new(RefCell::new(RuleCell::empty(symbol))))
            .clone()
    }

    pub(crate) fn cell(&self, symbol: &str) -> Option<Rc<RefCell<RuleCell>>> {
        self.cells.borrow().get(symbol).cloned()
    }

    /// Attaches `expr` (compiled into a `Rule`) to `symbol`. Fails if the
    /// symbol already has an attached rule (spec.md §3 invariant: a rule
    /// is attached to at most one symbol at a time — re-attaching requires
    /// an explicit `remove_rule` or `change_rule`).
    pub fn add_rule(&self, symbol: &str, expr: Expr) -> Result<(), RegistryError> {
        let cell = self.cell_for(symbol);
        if cell.borrow().rule.is_some() {
            return Err(RegistryError::AlreadyDefined(symbol.to_string()));
        }
        self.attach(symbol, &cell, expr);
        Ok(())
    }

    fn attach(&self, symbol: &str, cell: &Rc<RefCell<RuleCell>>, expr: Expr) {
        let optimized = compile_expression(Rc::new(expr));
        let mut deps = Vec::new();
        referenced_symbols(&optimized, &mut deps);
        for dep in &deps {
            let dep_cell = self.cell_for(dep);
            dep_cell.borrow_mut().referents.insert(symbol.to_string());
        }
        let rule = Rule {
            expr: optimized,
            guard: None,
            transform: None,
            attached_to: Rc::new(RefCell::new(Some(symbol.to_string()))),
        };
        let function = compiled_closure(&rule);
        let mut cell_mut = cell.borrow_mut();
        cell_mut.rule = Some(rule);
        cell_mut.function = function;
    }

    /// Attaches a fully-built `Rule` (e.g. produced by `RuleBuilder`)
    /// directly, skipping re-compilation of guard/transform wiring —
    /// used by callers who built the rule through the builder rather
    /// than a bare `Expr`. Fails if `rule` is already attached to another
    /// symbol (spec.md §3 invariant 2, §6): since `Rule` is `Clone`, two
    /// registry slots could otherwise share a rule's identity with
    /// neither one the sole owner.
    pub fn add_built_rule(&self, symbol: &str, rule: Rule) -> Result<(), RegistryError> {
        let cell = self.cell_for(symbol);
        if cell.borrow().rule.is_some() {
            return Err(RegistryError::AlreadyDefined(symbol.to_string()));
        }
        if let Some(existing) = rule.attached_symbol() {
            return Err(RegistryError::AlreadyAttached(existing));
        }
        let optimized = compile_expression(rule.raw_expr().clone());
        let mut deps = Vec::new();
        referenced_symbols(&optimized, &mut deps);
        for dep in &deps {
            let dep_cell = self.cell_for(dep);
            dep_cell.borrow_mut().referents.insert(symbol.to_string());
        }
        let rule = Rule { expr: optimized, ..rule };
        *rule.attached_to.borrow_mut() = Some(symbol.to_string());
        let function = compiled_closure(&rule);
        let mut cell_mut = cell.borrow_mut();
        cell_mut.rule = Some(rule);
        cell_mut.function = function;
        Ok(())
    }

    pub fn find_rule(&self, symbol: &str) -> Option<Rule> {
        self.cell(symbol)?.borrow().rule.clone()
    }

    /// Removes the rule attached to `symbol`. Refuses when other rules
    /// still reference it, unless `force` is set.
    pub fn remove_rule(&self, symbol: &str, force: bool) -> Result<Option<Rule>, RegistryError> {
        let cell = self.cell(symbol).ok_or_else(|| RegistryError::Undefined(symbol.to_string()))?;
        let referents: Vec<String> = cell.borrow().referents.iter().cloned().collect();
        if !referents.is_empty() && !force {
            return Err(RegistryError::StillReferenced { symbol: symbol.to_string(), by: referents });
        }
        let taken = cell.borrow_mut().rule.take();
        if let Some(rule) = &taken {
            *rule.attached_to.borrow_mut() = None;
            let mut deps = Vec::new();
            referenced_symbols(rule.raw_expr(), &mut deps);
            for dep in deps {
                if let Some(dep_cell) = self.cell(&dep) {
                    dep_cell.borrow_mut().referents.remove(symbol);
                }
            }
        }
        cell.borrow_mut().function = undefined_closure(Rc::from(symbol));
        Ok(taken)
    }

    /// Atomically replaces `symbol`'s expression, preserving the cell
    /// (and therefore its trace log) across the change.
    pub fn change_rule(&self, symbol: &str, expr: Expr) -> Result<(), RegistryError> {
        let cell = self.cell(symbol).ok_or_else(|| RegistryError::Undefined(symbol.to_string()))?;
        if let Some(old) = &cell.borrow().rule {
            *old.attached_to.borrow_mut() = None;
            let mut deps = Vec::new();
            referenced_symbols(old.raw_expr(), &mut deps);
            for dep in deps {
                if let Some(dep_cell) = self.cell(&dep) {
                    dep_cell.borrow_mut().referents.remove(symbol);
                }
            }
        }
        cell.borrow_mut().rule = None;
        self.attach(symbol, &cell, expr);
        Ok(())
    }

    /// Partitions the nonterminals `rule`'s expression references into
    /// those currently defined in this registry and those that are not.
    pub fn rule_dependencies(&self, rule: &Rule) -> (Vec<String>, Vec<String>) {
        let mut deps = Vec::new();
        referenced_symbols(rule.raw_expr(), &mut deps);
        deps.sort();
        deps.dedup();
        let mut defined = Vec::new();
        let mut undefined = Vec::new();
        for dep in deps {
            match self.find_rule(&dep) {
                Some(_) => defined.push(dep),
                None => undefined.push(dep),
            }
        }
        (defined, undefined)
    }

    pub fn enable_trace(&self, symbol: &str) {
        self.cell_for(symbol).borrow_mut().trace.enabled = true;
    }

    pub fn trace_events(&self, symbol: &str) -> Vec<crate::trace::TraceEvent> {
        self.cell(symbol).map(|c| c.borrow().trace.events.clone()).unwrap_or_default()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.cells.borrow().keys().cloned().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
