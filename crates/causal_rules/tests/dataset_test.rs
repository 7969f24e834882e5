//! Integration tests for the honest discovery/inference split.
//!
//! Row identity is encoded in an `id` covariate mirrored into the outcome,
//! so the tests can verify that the two subsamples are disjoint, exhaustive
//! and keep every field of a unit aligned.

use causal_rules::Dataset;
use polars::prelude::*;
use std::collections::HashSet;

fn tagged_dataset(n: usize) -> Dataset {
    let id: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let outcome = id.clone();
    let treatment: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();
    let ite: Vec<f64> = (0..n).map(|i| (i as f64) * 10.0).collect();

    let columns: Vec<Column> = vec![Series::new(PlSmallStr::from_static("id"), id).into()];
    let covariates = DataFrame::new(columns).unwrap();
    Dataset::new(outcome, treatment, covariates, Some(ite)).unwrap()
}

#[test]
fn split_is_disjoint_and_exhaustive_for_many_ratios() {
    let data = tagged_dataset(100);
    for ratio in [0.1, 0.25, 0.5, 0.75, 0.9] {
        let (dis, inf) = data.honest_split(ratio, 7).expect("split");
        assert_eq!(
            dis.len() + inf.len(),
            100,
            "ratio {}: subsample sizes must sum to n",
            ratio
        );

        let mut seen: HashSet<i64> = HashSet::new();
        for v in dis.outcome.iter().chain(inf.outcome.iter()) {
            assert!(seen.insert(*v as i64), "row {} assigned twice", v);
        }
        assert_eq!(seen.len(), 100, "every row must land in one subsample");
    }
}

#[test]
fn split_sizes_follow_the_ratio() {
    let data = tagged_dataset(100);
    let (dis, _) = data.honest_split(0.5, 1).expect("split");
    assert_eq!(dis.len(), 50);
    let (dis, _) = data.honest_split(0.25, 1).expect("split");
    assert_eq!(dis.len(), 25);
}

#[test]
fn split_keeps_rows_aligned_across_fields() {
    let data = tagged_dataset(80);
    let (dis, inf) = data.honest_split(0.4, 11).expect("split");

    for part in [&dis, &inf] {
        let ids = part
            .covariates
            .column("id")
            .unwrap()
            .as_series()
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect::<Vec<f64>>();
        let ite = part.ite.as_ref().expect("ite present");
        for k in 0..part.len() {
            assert_eq!(ids[k], part.outcome[k], "covariate row drifted");
            assert_eq!(ite[k], part.outcome[k] * 10.0, "ite row drifted");
            assert_eq!(part.treatment[k], (part.outcome[k] as usize % 2) as f64);
        }
    }
}

#[test]
fn split_is_reproducible_for_a_fixed_seed() {
    let data = tagged_dataset(60);
    let (a_dis, a_inf) = data.honest_split(0.5, 42).expect("split");
    let (b_dis, b_inf) = data.honest_split(0.5, 42).expect("split");
    assert_eq!(a_dis.outcome, b_dis.outcome);
    assert_eq!(a_inf.outcome, b_inf.outcome);
}

#[test]
fn invalid_ratios_are_rejected() {
    let data = tagged_dataset(10);
    for ratio in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
        assert!(
            data.honest_split(ratio, 0).is_err(),
            "ratio {} should be rejected",
            ratio
        );
    }
}

#[test]
fn misaligned_inputs_are_rejected() {
    let columns: Vec<Column> = vec![Series::new(
        PlSmallStr::from_static("x"),
        vec![1.0, 2.0, 3.0],
    )
    .into()];
    let covariates = DataFrame::new(columns).unwrap();

    // treatment shorter than outcome
    assert!(Dataset::new(
        vec![1.0, 2.0, 3.0],
        vec![0.0, 1.0],
        covariates.clone(),
        None
    )
    .is_err());

    // ite shorter than outcome
    assert!(Dataset::new(
        vec![1.0, 2.0, 3.0],
        vec![0.0, 1.0, 0.0],
        covariates.clone(),
        Some(vec![1.0])
    )
    .is_err());

    // treatment not binary
    assert!(Dataset::new(
        vec![1.0, 2.0, 3.0],
        vec![0.0, 0.5, 1.0],
        covariates,
        None
    )
    .is_err());
}
