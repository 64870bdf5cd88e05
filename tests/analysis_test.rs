mod common;

use common::Grammar;
use ll_grammar::model::*;
use ll_grammar::testing::Testable;
use ll_grammar::{AnalysisOptions, DiagnosticKind, ProductionStatus, Severity};
use syn::parse_quote;

// --- Test 1: Left recursion ---
#[test]
fn test_direct_left_recursion_is_reported_with_cycle() {
    // A -> A "x" | "y"
    let mut g = Grammar::new(&["x", "y"]);
    let rec = g.nt("A");
    let x = g.t("x");
    let first = g.seq(vec![rec, x]);
    let y = g.t("y");
    let root = g.alt(vec![first, y]);
    g.rule("A", root);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::LeftRecursion);

    let d = analysis
        .diagnostics
        .of_kind(DiagnosticKind::LeftRecursion)
        .next()
        .unwrap();
    assert_eq!(d.severity, Severity::Error);
    assert_eq!(d.production, "A");
    assert_eq!(d.message, "left recursion detected: A -> A");
    assert!(!analysis.lookahead_ran);
    assert!(analysis.decisions.is_empty());
}

#[test]
fn test_recursion_past_a_token_is_not_left_recursion() {
    // A -> "y" A "x" | "z"
    let mut g = Grammar::new(&["x", "y", "z"]);
    let y = g.t("y");
    let rec = g.nt("A");
    let x = g.t("x");
    let first = g.seq(vec![y, rec, x]);
    let z = g.t("z");
    let root = g.alt(vec![first, z]);
    g.rule("A", root);

    let analysis = g.analyze(&AnalysisOptions::default()).test().assert_clean();
    assert!(analysis.lookahead_ran);
    let decision = analysis.decisions.choice(root).unwrap();
    assert_eq!(decision.select(&["y"]), Some(0));
    assert_eq!(decision.select(&["z"]), Some(1));
}

#[test]
fn test_left_recursion_through_action_and_optional_prefix() {
    // Expr -> { start(); } [ "-" ] Term ;  Term -> Expr "+" | "n"
    let mut g = Grammar::new(&["-", "+", "n"]);
    let act = g.action(quote::quote!(start();));
    let minus = g.t("-");
    let sign = g.opt(minus);
    let term = g.nt("Term");
    let expr = g.seq(vec![act, sign, term]);
    g.rule("Expr", expr);
    let back = g.nt("Expr");
    let plus = g.t("+");
    let first = g.seq(vec![back, plus]);
    let n = g.t("n");
    let term_root = g.alt(vec![first, n]);
    g.rule("Term", term_root);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::LeftRecursion);
    let cycles: Vec<_> = analysis
        .diagnostics
        .of_kind(DiagnosticKind::LeftRecursion)
        .map(|d| d.message.clone())
        .collect();
    assert_eq!(cycles, vec!["left recursion detected: Expr -> Term -> Expr"]);
}

// --- Test 2: Empty repetition ---
#[test]
fn test_repetition_of_nullable_body_is_an_error() {
    // S -> ( ( ) | "x" )* "end"
    let mut g = Grammar::new(&["x", "end"]);
    let empty = g.empty();
    let x = g.t("x");
    let body = g.alt(vec![empty, x]);
    let star = g.star(body);
    let end = g.t("end");
    let root = g.seq(vec![star, end]);
    g.rule("S", root);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::EmptyRepetition);
    assert!(analysis.has_errors());
    assert_eq!(
        analysis.production_status("S"),
        Some(&ProductionStatus::EmptyRepetitionAt(vec![star]))
    );
    // Left recursion is absent, so the engine still ran.
    assert!(analysis.lookahead_ran);
}

// --- Test 3: Deterministic resolution ---
#[test]
fn test_common_prefix_is_ambiguous_at_k1() {
    // S -> ( "a" "b" ) | ( "a" "c" )
    let mut g = Grammar::new(&["a", "b", "c"]);
    let ab = g.tokens(&["a", "b"]);
    let ac = g.tokens(&["a", "c"]);
    let root = g.alt(vec![ab, ac]);
    g.rule("S", root);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::Ambiguity);
    assert!(!analysis.has_errors());

    let warning = analysis
        .diagnostics
        .of_kind(DiagnosticKind::Ambiguity)
        .next()
        .unwrap();
    assert_eq!(warning.severity, Severity::Warning);
    assert!(warning.message.contains("alternatives 1 and 2"));
    assert!(warning.message.contains("[a]"));

    let decision = analysis.decisions.choice(root).unwrap();
    assert_eq!(decision.entries[0].lookahead.to_string(), "{[a]}");
    assert_eq!(decision.entries[1].lookahead.to_string(), "{[a]}");
    for upcoming in [&["a"][..], &["a", "b"], &["a", "c"]] {
        assert_eq!(decision.select(upcoming), Some(0));
    }
}

#[test]
fn test_k2_resolves_common_prefix() {
    let mut g = Grammar::new(&["a", "b", "c"]);
    let ab = g.tokens(&["a", "b"]);
    let ac = g.tokens(&["a", "c"]);
    let root = g.alt(vec![ab, ac]);
    g.rule("S", root);

    let analysis = g
        .analyze(&AnalysisOptions::default().with_lookahead(2))
        .test()
        .assert_clean();
    let decision = analysis.decisions.choice(root).unwrap();
    assert_eq!(decision.select(&["a", "c"]), Some(1));
}

#[test]
fn test_ambiguity_through_productions() {
    // S -> A | B ;  A -> "x" "y" ;  B -> [ "z" ] "x"
    let mut g = Grammar::new(&["x", "y", "z"]);
    let a = g.nt("A");
    let b = g.nt("B");
    let root = g.alt(vec![a, b]);
    g.rule("S", root);
    let a_root = g.tokens(&["x", "y"]);
    g.rule("A", a_root);
    let z = g.t("z");
    let oz = g.opt(z);
    let x = g.t("x");
    let b_root = g.seq(vec![oz, x]);
    g.rule("B", b_root);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::Ambiguity);
    let decision = analysis.decisions.choice(root).unwrap();
    assert_eq!(decision.select(&["x"]), Some(0));
    assert_eq!(decision.select(&["z"]), Some(1));
}

// --- Test 4: Reachability ---
#[test]
fn test_unreferenced_production_warned_once() {
    // Start -> A ;  A -> "a" ;  B -> "b"
    let mut g = Grammar::new(&["a", "b"]);
    let a = g.nt("A");
    g.rule("Start", a);
    let a_root = g.t("a");
    g.rule("A", a_root);
    let b_root = g.t("b");
    g.rule("B", b_root);

    let analysis = g
        .analyze(&AnalysisOptions::default().with_start("Start"))
        .test()
        .assert_diagnostic(DiagnosticKind::UnreachableProduction);
    assert!(!analysis.has_errors());
    let unreachable: Vec<_> = analysis
        .diagnostics
        .of_kind(DiagnosticKind::UnreachableProduction)
        .collect();
    assert_eq!(unreachable.len(), 1);
    assert_eq!(unreachable[0].production, "B");
    assert_eq!(unreachable[0].line(), 3);
    assert_eq!(analysis.diagnostics.len(), 1);
}

#[test]
fn test_start_defaults_to_first_production() {
    let mut g = Grammar::new(&["a"]);
    let a = g.t("a");
    g.rule("First", a);
    let call = g.nt("First");
    g.rule("Second", call);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::UnreachableProduction);
    let d = analysis.diagnostics.as_slice();
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].production, "Second");
}

#[test]
fn test_undefined_start_is_an_error() {
    let mut g = Grammar::new(&["a"]);
    let a = g.t("a");
    g.rule("S", a);

    g.analyze(&AnalysisOptions::default().with_start("Main"))
        .test()
        .assert_diagnostic(DiagnosticKind::UndefinedStart);
}

// --- Test 5: Structural errors ---
#[test]
fn test_structural_errors_skip_only_their_production() {
    // S -> T | Missing ;  T -> "a" | "b"
    let mut g = Grammar::new(&["a", "b"]);
    let t = g.nt("T");
    let missing = g.nt("Missing");
    let s_root = g.alt(vec![t, missing]);
    g.rule("S", s_root);
    let a = g.t("a");
    let b = g.t("b");
    let t_root = g.alt(vec![a, b]);
    g.rule("T", t_root);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::UndefinedProduction);
    assert_eq!(analysis.production_status("S"), Some(&ProductionStatus::Blocked));
    assert_eq!(analysis.production_status("T"), Some(&ProductionStatus::Valid));
    assert!(analysis.decision(s_root).is_none());
    assert!(analysis.decision(t_root).is_some());
}

#[test]
fn test_undeclared_token() {
    let mut g = Grammar::new(&["a"]);
    let a = g.t("a");
    let q = g.t("?");
    let root = g.seq(vec![a, q]);
    g.rule("S", root);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::UndefinedToken);
    let d = analysis.diagnostics.as_slice();
    assert_eq!(d[0].message, "undeclared token '?'");
    assert_eq!((d[0].line(), d[0].column()), (1, 3));
}

#[test]
fn test_argument_count_must_match_parameters() {
    let mut g = Grammar::new(&["n"]);
    let call = g.call("Number", vec![parse_quote!(base)]);
    g.rule("S", call);
    let n = g.t("n");
    g.add(Production::new("Number", n, Location::new(2, 1)).with_params(vec![
        (parse_quote!(base), parse_quote!(u32)),
        (parse_quote!(signed), parse_quote!(bool)),
    ]));

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::ArityMismatch);
    let d = analysis
        .diagnostics
        .of_kind(DiagnosticKind::ArityMismatch)
        .next()
        .unwrap();
    assert_eq!(d.message, "production 'Number' expects 2 argument(s), but got 1");
}

#[test]
fn test_duplicate_production() {
    let mut g = Grammar::new(&["a", "b"]);
    let a = g.t("a");
    g.rule("S", a);
    let b = g.t("b");
    g.rule("S", b);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::DuplicateProduction);
    let d = analysis.diagnostics.as_slice();
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].line(), 2);
    assert_eq!(analysis.production_status("S"), Some(&ProductionStatus::Blocked));
}

// --- Test 6: Lookahead directives ---
#[test]
fn test_semantic_lookahead_can_be_disabled() {
    // S -> LOOKAHEAD({ is_type(0) }) "id" "id" | "id"
    let mut g = Grammar::new(&["id"]);
    let la = g.la(LookaheadSpec::semantic(parse_quote!(is_type(0))));
    let id1 = g.t("id");
    let id2 = g.t("id");
    let decl = g.seq(vec![la, id1, id2]);
    let id3 = g.t("id");
    let root = g.alt(vec![decl, id3]);
    g.rule("S", root);

    let analysis = g.analyze(&AnalysisOptions::default()).test().assert_clean();
    let decision = analysis.decisions.choice(root).unwrap();
    assert_eq!(decision.select_with(&["id"], |_| false), Some(1));
    assert_eq!(decision.select_with(&["id"], |_| true), Some(0));

    let analysis = g
        .analyze(&AnalysisOptions::default().with_semantic_lookahead(false))
        .test()
        .assert_diagnostic(DiagnosticKind::SemanticLookaheadDisabled);
    assert!(analysis.has_errors());
    assert_eq!(analysis.production_status("S"), Some(&ProductionStatus::Blocked));
}

#[test]
fn test_syntactic_guard_decides_before_computed_sets() {
    // S -> LOOKAHEAD(Decl) Decl | Stmt ;  Decl -> "id" "id" ;  Stmt -> "id" "="
    let mut g = Grammar::new(&["id", "="]);
    let guard_expr = g.nt("Decl");
    let la = g.la(LookaheadSpec::syntactic(guard_expr).with_amount(2));
    let decl = g.nt("Decl");
    let first = g.seq(vec![la, decl]);
    let stmt = g.nt("Stmt");
    let root = g.alt(vec![first, stmt]);
    g.rule("S", root);
    let decl_root = g.tokens(&["id", "id"]);
    g.rule("Decl", decl_root);
    let stmt_root = g.tokens(&["id", "="]);
    g.rule("Stmt", stmt_root);

    let analysis = g.analyze(&AnalysisOptions::default()).test().assert_clean();
    let decision = analysis.decisions.choice(root).unwrap();
    assert!(decision.entries[0].guard.is_some());
    assert_eq!(decision.select(&["id", "id"]), Some(0));
    assert_eq!(decision.select(&["id", "="]), Some(1));
}

#[test]
fn test_depth_override_does_not_hide_ambiguity() {
    // S -> LOOKAHEAD(2) "a" "b" | "a" "b"
    let mut g = Grammar::new(&["a", "b"]);
    let la = g.la(LookaheadSpec::amount(2));
    let a = g.t("a");
    let b = g.t("b");
    let first = g.seq(vec![la, a, b]);
    let second = g.tokens(&["a", "b"]);
    let root = g.alt(vec![first, second]);
    g.rule("S", root);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::Ambiguity);
    assert!(!analysis.has_errors());
}

#[test]
fn test_misplaced_lookahead_is_ignored() {
    let mut g = Grammar::new(&["a", "b"]);
    let a = g.t("a");
    let la = g.la(LookaheadSpec::amount(2));
    let b = g.t("b");
    let root = g.seq(vec![a, la, b]);
    g.rule("S", root);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::MisplacedLookahead);
    assert!(!analysis.has_errors());
}

// --- Test 7: Loops ---
#[test]
fn test_loop_swallowing_its_follow_is_reported() {
    // List -> "(" ( Item "," )* Item ")" ;  Item -> "x"
    let mut g = Grammar::new(&["(", ")", ",", "x"]);
    let open = g.t("(");
    let item = g.nt("Item");
    let comma = g.t(",");
    let body = g.seq(vec![item, comma]);
    let star = g.star(body);
    let last = g.nt("Item");
    let close = g.t(")");
    let root = g.seq(vec![open, star, last, close]);
    g.rule("List", root);
    let x = g.t("x");
    g.rule("Item", x);

    let analysis = g
        .analyze(&AnalysisOptions::default())
        .test()
        .assert_diagnostic(DiagnosticKind::LoopConflict);
    let decision = analysis.decisions.repetition(star).unwrap();
    assert!(decision.should_enter(&["x"]));

    // Two tokens tell "x ," from "x )".
    let analysis = g
        .analyze(&AnalysisOptions::default().with_lookahead(2))
        .test()
        .assert_clean();
    let decision = analysis.decisions.repetition(star).unwrap();
    assert!(decision.should_enter(&["x", ","]));
    assert!(!decision.should_enter(&["x", ")"]));
}

#[test]
fn test_optional_entry_decision() {
    // S -> [ "else" Block ] "end" ;  Block -> "b"
    let mut g = Grammar::new(&["else", "end", "b"]);
    let kw = g.t("else");
    let block = g.nt("Block");
    let body = g.seq(vec![kw, block]);
    let opt = g.opt(body);
    let end = g.t("end");
    let root = g.seq(vec![opt, end]);
    g.rule("S", root);
    let b = g.t("b");
    g.rule("Block", b);

    let analysis = g.analyze(&AnalysisOptions::default()).test().assert_clean();
    let decision = analysis.decisions.repetition(opt).unwrap();
    assert_eq!(decision.kind, RepetitionKind::ZeroOrOne);
    assert!(decision.should_enter(&["else"]));
    assert!(!decision.should_enter(&["end"]));
}

// --- Test 8: Fatal errors ---
#[test]
fn test_shared_node_aborts() {
    let mut g = Grammar::new(&["a"]);
    let a = g.t("a");
    let root = g.seq(vec![a, a]);
    g.rule("S", root);

    g.analyze(&AnalysisOptions::default())
        .test()
        .assert_failure_contains("owned by more than one parent");
}

#[test]
fn test_expansion_limit_aborts() {
    let mut g = Grammar::new(&["a", "b", "c"]);
    let alts = ["a", "b", "c"].iter().map(|t| g.t(t)).collect();
    let root = g.alt(alts);
    g.rule("S", root);

    g.analyze(&AnalysisOptions::default().with_expansion_limit(2))
        .test()
        .assert_failure_contains("expansion limit");
}

#[test]
fn test_zero_lookahead_is_rejected() {
    let mut g = Grammar::new(&["a"]);
    let a = g.t("a");
    g.rule("S", a);

    g.analyze(&AnalysisOptions::default().with_lookahead(0))
        .test()
        .assert_failure_contains("`lookahead`");
}

// --- Test 9: Idempotence ---
#[test]
fn test_pipeline_is_idempotent() {
    let mut g = Grammar::new(&["a", "b", "c", "x"]);
    let ab = g.tokens(&["a", "b"]);
    let ac = g.tokens(&["a", "c"]);
    let empty = g.empty();
    let choice = g.alt(vec![ab, ac, empty]);
    let x = g.t("x");
    let star = g.star(x);
    let tail = g.nt("Tail");
    let root = g.seq(vec![choice, star, tail]);
    g.rule("S", root);
    let xs = g.tokens(&["x", "a"]);
    g.rule("Tail", xs);
    let unused = g.t("c");
    g.rule("Unused", unused);

    let options = AnalysisOptions::default();
    let first = g.analyze(&options).test().assert_success();
    let second = g.analyze(&options).test().assert_success();

    assert!(!first.diagnostics.is_empty());
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(first.diagnostics.to_string(), second.diagnostics.to_string());
    assert_eq!(first.decisions.to_string(), second.decisions.to_string());
    assert_eq!(first.status, second.status);
}
