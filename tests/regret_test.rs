//! Problem adapters and top-k regret

use trueno_tune::problem::{adapt, ProblemKind, Selection};
use trueno_tune::record::{Corpus, DatasetGroup, Metafeatures, PerformanceRecord};
use trueno_tune::regret::{oracle_top_k, regret};
use trueno_tune::Error;

fn dataset(scores: &[(&str, f64)]) -> Corpus {
    Corpus::from_records(
        scores
            .iter()
            .map(|(p, s)| PerformanceRecord::new("D", *p, Metafeatures::new(), *s)),
    )
    .unwrap()
}

fn group(corpus: &Corpus) -> &DatasetGroup {
    corpus.get("D").unwrap()
}

fn predictions(values: &[(&str, f64)]) -> Vec<(String, f64)> {
    values.iter().map(|(p, v)| ((*p).to_string(), *v)).collect()
}

// =============================================================================
// Scenario: D {A: 0.9, B: 0.8, C: 0.5}, predicted order C, A, B
// =============================================================================

#[test]
fn test_scenario_regret_for_every_formulation() {
    let corpus = dataset(&[("A", 0.9), ("B", 0.8), ("C", 0.5)]);
    let predicted = predictions(&[("A", 0.6), ("B", 0.1), ("C", 0.9)]);

    for kind in ProblemKind::ALL {
        let selection = adapt(kind, "D", &predicted, 2).unwrap();
        let value = regret(group(&corpus), &selection, 2).unwrap();
        assert!((value - 0.3).abs() < 1e-12, "{kind}: {value}");
    }
}

#[test]
fn test_scenario_ordering() {
    let predicted = predictions(&[("A", 0.6), ("B", 0.1), ("C", 0.9)]);
    let selection = adapt(ProblemKind::Rank, "D", &predicted, 2).unwrap();
    assert_eq!(
        selection,
        Selection::Ordering(vec!["C".into(), "A".into(), "B".into()])
    );
    assert_eq!(selection.top_k(2).unwrap(), vec!["C", "A"]);
}

// =============================================================================
// Regret properties
// =============================================================================

#[test]
fn test_perfect_ranking_has_zero_regret() {
    let corpus = dataset(&[("A", 0.3), ("B", 0.7), ("C", 0.1), ("E", 0.9)]);
    let oracle: Vec<String> = oracle_top_k(group(&corpus), 4)
        .unwrap()
        .into_iter()
        .map(str::to_string)
        .collect();

    for k in 1..=4 {
        let value = regret(group(&corpus), &Selection::Ordering(oracle.clone()), k).unwrap();
        assert!(value.abs() < f64::EPSILON, "k={k}: {value}");
    }
}

#[test]
fn test_worse_selection_never_has_lower_regret() {
    let corpus = dataset(&[("A", 0.9), ("B", 0.8), ("C", 0.5), ("E", 0.2)]);
    let better = Selection::Subset(vec!["A".into(), "C".into()]);
    let worse = Selection::Subset(vec!["C".into(), "E".into()]);

    let better_regret = regret(group(&corpus), &better, 2).unwrap();
    let worse_regret = regret(group(&corpus), &worse, 2).unwrap();
    assert!(worse_regret > better_regret);
}

#[test]
fn test_tied_scores_break_by_pipeline_id() {
    let corpus = dataset(&[("b", 0.5), ("a", 0.5), ("c", 0.5)]);
    assert_eq!(oracle_top_k(group(&corpus), 2).unwrap(), vec!["a", "b"]);

    let predicted = predictions(&[("c", 1.0), ("b", 1.0), ("a", 1.0)]);
    let subset = adapt(ProblemKind::Subset, "D", &predicted, 2).unwrap();
    assert_eq!(subset.top_k(2).unwrap(), vec!["a", "b"]);
}

#[test]
fn test_k_larger_than_dataset_is_insufficient_pipelines() {
    let corpus = dataset(&[("A", 0.9)]);
    let selection = Selection::Ordering(vec!["A".into()]);
    let err = regret(group(&corpus), &selection, 2).unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientPipelines { k: 2, available: 1, .. }
    ));
}

#[test]
fn test_foreign_pipeline_is_internal_consistency_error() {
    let corpus = dataset(&[("A", 0.9), ("B", 0.8)]);
    let selection = Selection::Subset(vec!["A".into(), "Z".into()]);
    let err = regret(group(&corpus), &selection, 2).unwrap_err();
    assert!(matches!(err, Error::InternalConsistency(_)));
}
