//! End-to-end scenarios exercising the engine through the public API:
//! direct and indirect left recursion, ordered-choice commit, negation,
//! the char-range compiler optimization, and incomplete-parse handling.

use pegrat::{parse, Expr, RangeItem, Registry};

fn digit_rule() -> Expr {
    Expr::char_ranges(vec![RangeItem::Pair('0', '9')])
}

#[test]
fn s1_direct_left_recursion_arithmetic() {
    // expr <- expr "+" digit / digit
    let registry = Registry::new();
    registry.add_rule("digit", digit_rule()).unwrap();
    registry
        .add_rule(
            "expr",
            Expr::choice(vec![
                Expr::seq(vec![Expr::nonterminal("expr"), Expr::literal("+"), Expr::nonterminal("digit")]),
                Expr::nonterminal("digit"),
            ]),
        )
        .unwrap();

    let rule = registry.find_rule("expr").unwrap();
    let outcome = parse(&registry, rule.raw_expr(), "1+2+3+4", 0, None, false).unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.rest, None);
    assert_eq!(outcome.production.unwrap().flatten_text(), "1+2+3+4");
}

#[test]
fn s2_indirect_left_recursion() {
    // a <- b "x" / "a"
    // b <- a "y" / "b"
    let registry = Registry::new();
    registry
        .add_rule("a", Expr::choice(vec![Expr::seq(vec![Expr::nonterminal("b"), Expr::literal("x")]), Expr::literal("a")]))
        .unwrap();
    registry
        .add_rule("b", Expr::choice(vec![Expr::seq(vec![Expr::nonterminal("a"), Expr::literal("y")]), Expr::literal("b")]))
        .unwrap();

    let rule = registry.find_rule("a").unwrap();
    let outcome = parse(&registry, rule.raw_expr(), "bxyx", 0, None, false).unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.rest, None);
    assert_eq!(outcome.production.unwrap().flatten_text(), "bxyx");
}

#[test]
fn s3_ordered_choice_commits_to_first_match() {
    // word <- "cat" / "catalog"   -- "catalog" is unreachable on input "catalog"
    let registry = Registry::new();
    registry.add_rule("word", Expr::choice(vec![Expr::literal("cat"), Expr::literal("catalog")])).unwrap();
    let rule = registry.find_rule("word").unwrap();

    let outcome = parse(&registry, rule.raw_expr(), "catalog", 0, None, true).unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.rest, Some(3));
    assert_eq!(outcome.production.unwrap().flatten_text(), "cat");
}

#[test]
fn s4_negation_rejects_and_consumes() {
    // not_close <- !")" .
    let registry = Registry::new();
    let expr = Expr::seq(vec![Expr::neg_ahead(Expr::literal(")")), Expr::Character]);
    let outcome = parse(&registry, &expr, "x)", 0, None, true).unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.rest, Some(1));
    assert_eq!(outcome.production.unwrap().flatten_text(), "x");

    // A total mismatch with junk_allowed is a non-error "no match", not
    // an `Err` (spec.md §4.1: "FailedParse and junk_allowed: return
    // (None, Some(start), false)").
    let no_match = parse(&registry, &expr, ")x", 0, None, true).unwrap();
    assert!(!no_match.ok);
    assert!(no_match.production.is_none());
    assert_eq!(no_match.rest, Some(0));

    // Without junk_allowed, the same mismatch does raise.
    let err = parse(&registry, &expr, ")x", 0, None, false);
    assert!(err.is_err());
}

#[test]
fn s5_char_range_optimization_still_matches_correctly() {
    // Or-of-single-chars collapses to CharRanges at compile time; the
    // observable matching behavior must be identical either way.
    let registry = Registry::new();
    registry
        .add_rule("vowel", Expr::choice(vec![
            Expr::literal("a"),
            Expr::literal("e"),
            Expr::literal("i"),
            Expr::literal("o"),
            Expr::literal("u"),
        ]))
        .unwrap();
    let rule = registry.find_rule("vowel").unwrap();
    assert!(matches!(rule.raw_expr().as_ref(), Expr::CharRanges(_)));

    let outcome = parse(&registry, rule.raw_expr(), "e", 0, None, false).unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.rest, None);
    assert_eq!(outcome.production.unwrap().as_char(), Some('e'));

    // Total mismatch, junk not allowed: still raises.
    assert!(parse(&registry, rule.raw_expr(), "x", 0, None, false).is_err());

    // Total mismatch, junk allowed: a non-error "no match".
    let no_match = parse(&registry, rule.raw_expr(), "x", 0, None, true).unwrap();
    assert!(!no_match.ok);
    assert!(no_match.production.is_none());
}

#[test]
fn s6_incomplete_parse_respects_junk_allowed() {
    let registry = Registry::new();
    let expr = Expr::literal("hi");

    let rejected = parse(&registry, &expr, "hi there", 0, None, false);
    assert!(rejected.is_err());

    let outcome = parse(&registry, &expr, "hi there", 0, None, true).unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.rest, Some(2));
    assert_eq!(outcome.production.unwrap().flatten_text(), "hi");
}

#[test]
fn s7_end_parameter_bounds_a_sub_range_parse() {
    // spec.md §4.1: evaluation runs against (text, start, end) — a
    // literal that would match if the full buffer were visible must not
    // match once `end` clips it out.
    let registry = Registry::new();
    let expr = Expr::literal("hello");

    let clipped = parse(&registry, &expr, "hello world", 0, Some(3), true).unwrap();
    assert!(!clipped.ok);

    let exact = parse(&registry, &expr, "hello world", 0, Some(5), false).unwrap();
    assert!(exact.ok);
    assert_eq!(exact.rest, None);
    assert_eq!(exact.production.unwrap().flatten_text(), "hello");
}
