//! Integration tests for the rule indicator matrix builder.

use causal_rules::{Condition, Op, Rule, RuleMatrix};
use polars::prelude::*;

fn frame() -> DataFrame {
    let x1: Vec<f64> = vec![0.1, 0.6, 0.9, 0.4];
    let x2: Vec<f64> = vec![0.8, 0.2, 0.7, 0.3];
    let columns: Vec<Column> = vec![
        Series::new(PlSmallStr::from_static("x1"), x1).into(),
        Series::new(PlSmallStr::from_static("x2"), x2).into(),
    ];
    DataFrame::new(columns).unwrap()
}

fn rules() -> Vec<Rule> {
    vec![
        Rule::new(vec![Condition::new("x1", Op::Gt, 0.5)]).unwrap(),
        Rule::new(vec![
            Condition::new("x1", Op::Gt, 0.5),
            Condition::new("x2", Op::Le, 0.5),
        ])
        .unwrap(),
    ]
}

#[test]
fn indicators_match_rule_semantics() {
    let matrix = RuleMatrix::build(&frame(), &rules()).expect("build");
    assert_eq!(matrix.nrows(), 4);
    assert_eq!(matrix.ncols(), 2);

    // x1 > 0.5 holds for rows 1 and 2
    let col0: Vec<f64> = matrix.values().column(0).iter().copied().collect();
    assert_eq!(col0, vec![0.0, 1.0, 1.0, 0.0]);
    // the conjunction additionally needs x2 <= 0.5, leaving row 1
    let col1: Vec<f64> = matrix.values().column(1).iter().copied().collect();
    assert_eq!(col1, vec![0.0, 1.0, 0.0, 0.0]);

    assert_eq!(matrix.names()[0], "x1>0.5");
    assert_eq!(matrix.names()[1], "x1>0.5 & x2<=0.5");
    assert_eq!(matrix.support(0), 0.5);
    assert_eq!(matrix.support(1), 0.25);
}

#[test]
fn building_is_idempotent() {
    let df = frame();
    let rules = rules();
    let a = RuleMatrix::build(&df, &rules).expect("build");
    let b = RuleMatrix::build(&df, &rules).expect("build");
    assert_eq!(a.values(), b.values(), "rebuild must be bit-identical");
    assert_eq!(a.names(), b.names());
}

#[test]
fn empty_rule_set_builds_an_empty_matrix() {
    let matrix = RuleMatrix::build(&frame(), &[]).expect("build");
    assert_eq!(matrix.nrows(), 4);
    assert_eq!(matrix.ncols(), 0);
}

#[test]
fn unknown_covariates_are_rejected() {
    let rule = Rule::new(vec![Condition::new("ghost", Op::Le, 1.0)]).unwrap();
    assert!(RuleMatrix::build(&frame(), &[rule]).is_err());
}

#[test]
fn column_selection_preserves_names_and_values() {
    let matrix = RuleMatrix::build(&frame(), &rules()).expect("build");
    let picked = matrix.select_columns(&[1]);
    assert_eq!(picked.ncols(), 1);
    assert_eq!(picked.names()[0], "x1>0.5 & x2<=0.5");
    let col: Vec<f64> = picked.values().column(0).iter().copied().collect();
    assert_eq!(col, vec![0.0, 1.0, 0.0, 0.0]);
}
