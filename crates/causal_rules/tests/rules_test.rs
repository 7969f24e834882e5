//! Integration tests for the rule representation.
//!
//! The condition list is the canonical form: construction normalizes order
//! and collapses redundant bounds, and the rendered expression is a pure
//! projection used for display and deduplication.

use causal_rules::rules::dedup_rules;
use causal_rules::{Condition, Op, Rule};
use polars::prelude::*;

fn frame(x1: Vec<Option<f64>>, x2: Vec<Option<f64>>) -> DataFrame {
    let columns: Vec<Column> = vec![
        Series::new(PlSmallStr::from_static("x1"), x1).into(),
        Series::new(PlSmallStr::from_static("x2"), x2).into(),
    ];
    DataFrame::new(columns).unwrap()
}

#[test]
fn conditions_evaluate_with_boundary_semantics() {
    let le = Condition::new("x", Op::Le, 0.5);
    assert!(le.holds(Some(0.5)));
    assert!(le.holds(Some(0.4)));
    assert!(!le.holds(Some(0.6)));
    assert!(!le.holds(None));

    let gt = Condition::new("x", Op::Gt, 0.5);
    assert!(!gt.holds(Some(0.5)));
    assert!(gt.holds(Some(0.6)));
    assert!(!gt.holds(None));
}

#[test]
fn construction_normalizes_condition_order() {
    let rule = Rule::new(vec![
        Condition::new("x2", Op::Le, 0.3),
        Condition::new("x1", Op::Gt, 0.5),
    ])
    .expect("rule");
    assert_eq!(rule.expression(), "x1>0.5 & x2<=0.3");
    assert_eq!(rule.len(), 2);
}

#[test]
fn redundant_bounds_collapse_to_the_tightest() {
    let rule = Rule::new(vec![
        Condition::new("x1", Op::Le, 0.5),
        Condition::new("x1", Op::Le, 0.3),
        Condition::new("x1", Op::Gt, 0.1),
        Condition::new("x1", Op::Gt, 0.2),
    ])
    .expect("rule");
    assert_eq!(rule.expression(), "x1<=0.3 & x1>0.2");
    assert_eq!(rule.len(), 2);
}

#[test]
fn empty_and_non_finite_rules_are_rejected() {
    assert!(Rule::new(vec![]).is_err());
    assert!(Rule::new(vec![Condition::new("x", Op::Le, f64::NAN)]).is_err());
    assert!(Rule::new(vec![Condition::new("x", Op::Gt, f64::INFINITY)]).is_err());
}

#[test]
fn evaluation_applies_the_conjunction_rowwise() {
    let df = frame(
        vec![Some(0.2), Some(0.8), Some(0.9), None],
        vec![Some(0.1), Some(0.4), Some(0.9), Some(0.2)],
    );
    let rule = Rule::new(vec![
        Condition::new("x1", Op::Gt, 0.5),
        Condition::new("x2", Op::Le, 0.5),
    ])
    .expect("rule");

    // Row 0 fails x1, row 2 fails x2, row 3 has a null x1
    assert_eq!(
        rule.evaluate(&df).expect("evaluate"),
        vec![false, true, false, false]
    );
}

#[test]
fn unknown_and_non_numeric_covariates_are_rejected() {
    let df = frame(vec![Some(0.2)], vec![Some(0.1)]);
    let rule = Rule::new(vec![Condition::new("nope", Op::Le, 1.0)]).expect("rule");
    assert!(rule.evaluate(&df).is_err());

    let columns: Vec<Column> = vec![Series::new(
        PlSmallStr::from_static("label"),
        vec!["a", "b"],
    )
    .into()];
    let text = DataFrame::new(columns).unwrap();
    let rule = Rule::new(vec![Condition::new("label", Op::Gt, 0.0)]).expect("rule");
    assert!(rule.evaluate(&text).is_err());
}

#[test]
fn dedup_keeps_the_first_occurrence() {
    let a = Rule::new(vec![Condition::new("x1", Op::Gt, 0.5)]).unwrap();
    let b = Rule::new(vec![
        Condition::new("x1", Op::Gt, 0.5),
        Condition::new("x2", Op::Le, 0.3),
    ])
    .unwrap();
    // same as `a` after canonicalization
    let a_again = Rule::new(vec![Condition::new("x1", Op::Gt, 0.5)]).unwrap();

    let unique = dedup_rules(vec![a.clone(), b.clone(), a_again]);
    assert_eq!(unique.len(), 2);
    assert_eq!(unique[0].expression(), a.expression());
    assert_eq!(unique[1].expression(), b.expression());
}
