//! Grammar description: dependency/recursion analysis and a
//! pretty-printer for `Expr` (spec.md §4.8).
//!
//! Grounded on the teacher's `grammar_analysis.rs::GrammarAnalysis`,
//! trimmed down to what this engine's data model actually needs —
//! recursive/left-recursive rule sets and a `start_terminals` walk, both
//! called out in spec.md §1 as having "no algorithmic depth".

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::expr::Expr;
use crate::registry::Registry;

/// Writes a parenthesized combinator-notation rendering of `expr` —
/// used by `Expr`'s `Debug` impl and by error formatting.
pub fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Character => write!(f, "."),
        Expr::Literal { text, case_sensitive } => {
            if *case_sensitive {
                write!(f, "{text:?}")
            } else {
                write!(f, "{text:?}i")
            }
        }
        Expr::LengthString(n) => write!(f, "(string {n})"),
        Expr::CharRanges(items) => {
            write!(f, "[")?;
            for item in items.iter() {
                match item {
                    crate::charset::RangeItem::One(c) => write!(f, "{c}")?,
                    crate::charset::RangeItem::Pair(lo, hi) => write!(f, "{lo}-{hi}")?,
                }
            }
            write!(f, "]")
        }
        Expr::Predicate { name, inner, .. } => write!(f, "{inner:?}?{name}"),
        Expr::FunctionTerminal(_) => write!(f, "<function-terminal>"),
        Expr::Nonterminal(name) => write!(f, "{name}"),
        Expr::And(subs) => {
            write!(f, "(")?;
            for (i, s) in subs.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{s:?}")?;
            }
            write!(f, ")")
        }
        Expr::Or(subs) => {
            write!(f, "(")?;
            for (i, s) in subs.iter().enumerate() {
                if i > 0 {
                    write!(f, " / ")?;
                }
                write!(f, "{s:?}")?;
            }
            write!(f, ")")
        }
        Expr::Not(inner) => write!(f, "-{inner:?}"),
        Expr::NegAhead(inner) => write!(f, "!{inner:?}"),
        Expr::Ahead(inner) => write!(f, "&{inner:?}"),
        Expr::Star(inner) => write!(f, "{inner:?}*"),
        Expr::Plus(inner) => write!(f, "{inner:?}+"),
        Expr::Optional(inner) => write!(f, "{inner:?}?"),
    }
}

/// The first-terminal set of an expression: the set of nonterminal
/// names that could be the very first thing consulted while matching
/// `expr` at some position, used to seed left-recursion diagnostics.
pub fn start_terminals(expr: &Expr, out: &mut HashSet<String>) {
    match expr {
        Expr::Nonterminal(name) => {
            out.insert(name.to_string());
        }
        Expr::And(subs) => {
            if let Some(first) = subs.first() {
                start_terminals(first, out);
            }
        }
        Expr::Or(subs) => {
            for sub in subs.iter() {
                start_terminals(sub, out);
            }
        }
        Expr::Star(inner) | Expr::Plus(inner) | Expr::Optional(inner) | Expr::Predicate { inner, .. } => {
            start_terminals(inner, out);
        }
        _ => {}
    }
}

/// A snapshot analysis of every rule currently defined in `registry`.
pub struct GrammarAnalysis {
    pub recursive: HashSet<String>,
    pub left_recursive: HashSet<String>,
}

impl GrammarAnalysis {
    pub fn analyze(registry: &Registry) -> Self {
        let symbols = registry.symbols();
        let mut starts: HashMap<String, HashSet<String>> = HashMap::new();
        for sym in &symbols {
            let mut set = HashSet::new();
            if let Some(rule) = registry.find_rule(sym) {
                start_terminals(rule.raw_expr(), &mut set);
            }
            starts.insert(sym.clone(), set);
        }

        let mut left_recursive = HashSet::new();
        loop {
            let mut changed = false;
            for sym in &symbols {
                if left_recursive.contains(sym) {
                    continue;
                }
                let reaches_self = reaches(sym, sym, &starts, &mut HashSet::new());
                if reaches_self {
                    left_recursive.insert(sym.clone());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut recursive = HashSet::new();
        for sym in &symbols {
            if reaches_any(sym, sym, registry, &mut HashSet::new(), true) {
                recursive.insert(sym.clone());
            }
        }

        GrammarAnalysis { recursive, left_recursive }
    }

    pub fn is_recursive(&self, symbol: &str) -> bool {
        self.recursive.contains(symbol)
    }

    pub fn is_left_recursive(&self, symbol: &str) -> bool {
        self.left_recursive.contains(symbol)
    }

    /// A short human-readable summary, in the teacher's
    /// `GrammarAnalysis::report()` vein.
    pub fn report(&self) -> String {
        let mut out = String::new();
        if self.left_recursive.is_empty() {
            out.push_str("no left-recursive rules\n");
        } else {
            let mut names: Vec<_> = self.left_recursive.iter().cloned().collect();
            names.sort();
            out.push_str(&format!("left-recursive rules: {}\n", names.join(", ")));
        }
        if self.recursive.is_empty() {
            out.push_str("no recursive rules\n");
        } else {
            let mut names: Vec<_> = self.recursive.iter().cloned().collect();
            names.sort();
            out.push_str(&format!("recursive rules: {}\n", names.join(", ")));
        }
        out
    }
}

fn reaches(
    from: &str,
    target: &str,
    starts: &HashMap<String, HashSet<String>>,
    seen: &mut HashSet<String>,
) -> bool {
    if !seen.insert(from.to_string()) {
        return false;
    }
    let Some(set) = starts.get(from) else { return false };
    for next in set {
        if next == target {
            return true;
        }
        if reaches(next, target, starts, seen) {
            return true;
        }
    }
    false
}

/// Full-tree (not just first-position) reachability, used for the
/// broader "is this rule recursive at all" question.
fn reaches_any(
    from: &str,
    target: &str,
    registry: &Registry,
    seen: &mut HashSet<String>,
    is_root: bool,
) -> bool {
    if !is_root && from == target {
        return true;
    }
    if !seen.insert(from.to_string()) {
        return false;
    }
    let Some(rule) = registry.find_rule(from) else { return false };
    let mut deps = Vec::new();
    collect_all_nonterminals(rule.raw_expr(), &mut deps);
    for dep in deps {
        if dep == target || reaches_any(&dep, target, registry, seen, false) {
            return true;
        }
    }
    false
}

fn collect_all_nonterminals(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Nonterminal(name) => out.push(name.to_string()),
        Expr::Predicate { inner, .. }
        | Expr::Not(inner)
        | Expr::NegAhead(inner)
        | Expr::Ahead(inner)
        | Expr::Star(inner)
        | Expr::Plus(inner)
        | Expr::Optional(inner) => collect_all_nonterminals(inner, out),
        Expr::And(subs) | Expr::Or(subs) => {
            for sub in subs.iter() {
                collect_all_nonterminals(sub, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_direct_left_recursion() {
        let reg = Registry::new();
        reg.add_rule("digit", Expr::char_ranges(vec![crate::charset::RangeItem::Pair('0', '9')])).unwrap();
        reg.add_rule(
            "expr",
            Expr::choice(vec![
                Expr::seq(vec![Expr::nonterminal("expr"), Expr::literal("+"), Expr::nonterminal("digit")]),
                Expr::nonterminal("digit"),
            ]),
        )
        .unwrap();
        let analysis = GrammarAnalysis::analyze(&reg);
        assert!(analysis.is_left_recursive("expr"));
        assert!(!analysis.is_left_recursive("digit"));
    }

    #[test]
    fn non_recursive_rule_is_not_flagged() {
        let reg = Registry::new();
        reg.add_rule("a", Expr::Character).unwrap();
        reg.add_rule("b", Expr::nonterminal("a")).unwrap();
        let analysis = GrammarAnalysis::analyze(&reg);
        assert!(!analysis.is_recursive("a"));
        assert!(!analysis.is_recursive("b"));
    }

    #[test]
    fn indirect_recursion_is_detected() {
        let reg = Registry::new();
        reg.add_rule("a", Expr::nonterminal("b")).unwrap();
        reg.add_rule("b", Expr::nonterminal("a")).unwrap();
        let analysis = GrammarAnalysis::analyze(&reg);
        assert!(analysis.is_recursive("a"));
        assert!(analysis.is_recursive("b"));
    }
}
