//! Top-k regret
//!
//! ```text
//! oracle_best_k = Σ true scores of the k truly best pipelines
//! model_best_k  = Σ true scores of the k pipelines the model selected
//! regret        = oracle_best_k − model_best_k   (≥ 0)
//! ```
//!
//! Values are **summed** over the `k` pipelines and **averaged** over the
//! datasets of a split. Sums of the same k values in a different order can
//! differ by a few ULPs, so anything within [`REGRET_TOLERANCE`] below zero
//! clamps to `0.0`. Anything lower is a defect and raises
//! [`Error::InternalConsistency`].

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::problem::Selection;
use crate::record::DatasetGroup;
use crate::topk::top_k_indices;
use crate::{Error, Result};

/// Largest negative regret attributed to floating-point summation order.
pub const REGRET_TOLERANCE: f64 = 1e-9;

/// Regret of one validation dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRegret {
    /// Dataset the regret was measured on
    pub dataset_id: String,
    /// Top-k regret (≥ 0)
    pub regret: f64,
}

fn require_k(group: &DatasetGroup, k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::config("k", "k must be greater than 0"));
    }
    if group.len() < k {
        return Err(Error::InsufficientPipelines {
            dataset: group.dataset_id().to_string(),
            k,
            available: group.len(),
        });
    }
    Ok(())
}

fn true_scores(group: &DatasetGroup) -> Vec<(&str, f64)> {
    group
        .pipelines()
        .iter()
        .map(|p| (p.pipeline_id.as_str(), p.score))
        .collect()
}

/// The `k` truly best pipeline ids of a dataset, best first.
///
/// # Errors
///
/// Returns [`Error::InsufficientPipelines`] if the dataset has fewer than `k`
/// pipelines.
pub fn oracle_top_k(group: &DatasetGroup, k: usize) -> Result<Vec<&str>> {
    require_k(group, k)?;
    let scores = true_scores(group);
    Ok(top_k_indices(&scores, k)?
        .into_iter()
        .map(|i| scores[i].0)
        .collect())
}

/// Sum of the `k` highest true scores of a dataset.
///
/// # Errors
///
/// Returns [`Error::InsufficientPipelines`] if the dataset has fewer than `k`
/// pipelines.
pub fn oracle_best_k(group: &DatasetGroup, k: usize) -> Result<f64> {
    require_k(group, k)?;
    let scores = true_scores(group);
    Ok(top_k_indices(&scores, k)?
        .into_iter()
        .map(|i| scores[i].1)
        .sum())
}

/// Sum of the true scores of the selected pipelines.
///
/// # Errors
///
/// Returns [`Error::InternalConsistency`] if a pipeline is selected twice or
/// does not belong to the dataset.
pub fn selection_value(group: &DatasetGroup, selected: &[&str]) -> Result<f64> {
    let mut seen = FxHashSet::default();
    let mut total = 0.0;
    for pipeline_id in selected {
        if !seen.insert(*pipeline_id) {
            return Err(Error::InternalConsistency(format!(
                "pipeline `{pipeline_id}` selected twice for dataset `{}`",
                group.dataset_id()
            )));
        }
        total += group.score_of(pipeline_id).ok_or_else(|| {
            Error::InternalConsistency(format!(
                "selected pipeline `{pipeline_id}` is not part of dataset `{}`",
                group.dataset_id()
            ))
        })?;
    }
    Ok(total)
}

/// Top-k regret of a model selection on one dataset.
///
/// # Errors
///
/// - [`Error::InsufficientPipelines`] if the dataset has fewer than `k` pipelines
/// - [`Error::InternalConsistency`] if the selection is malformed or the
///   regret comes out negative
///
/// # Examples
///
/// ```rust
/// use trueno_tune::problem::Selection;
/// use trueno_tune::record::{Corpus, Metafeatures, PerformanceRecord};
/// use trueno_tune::regret::regret;
///
/// let corpus = Corpus::from_records([("A", 0.9), ("B", 0.8), ("C", 0.5)].map(|(p, s)| {
///     PerformanceRecord::new("D", p, Metafeatures::new(), s)
/// }))?;
/// let group = corpus.get("D").unwrap();
///
/// let predicted = Selection::Ordering(vec!["C".into(), "A".into(), "B".into()]);
/// let value = regret(group, &predicted, 2)?;
/// assert!((value - 0.3).abs() < 1e-12);
/// # Ok::<(), trueno_tune::Error>(())
/// ```
pub fn regret(group: &DatasetGroup, selection: &Selection, k: usize) -> Result<f64> {
    let oracle = oracle_best_k(group, k)?;
    let model = selection_value(group, &selection.top_k(k)?)?;
    let value = oracle - model;

    if value < -REGRET_TOLERANCE {
        return Err(Error::InternalConsistency(format!(
            "negative top-{k} regret {value} on dataset `{}` (oracle {oracle}, model {model})",
            group.dataset_id()
        )));
    }
    Ok(value.max(0.0))
}

/// Mean regret across datasets, `None` for an empty slice.
#[must_use]
pub fn mean_regret(regrets: &[DatasetRegret]) -> Option<f64> {
    if regrets.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = regrets.len() as f64;
    Some(regrets.iter().map(|r| r.regret).sum::<f64>() / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Corpus, Metafeatures, PerformanceRecord};

    fn dataset(scores: &[(&str, f64)]) -> DatasetGroup {
        let corpus = Corpus::from_records(
            scores
                .iter()
                .map(|(p, s)| PerformanceRecord::new("D", *p, Metafeatures::new(), *s)),
        )
        .unwrap();
        corpus.get("D").unwrap().clone()
    }

    fn ordering(ids: &[&str]) -> Selection {
        Selection::Ordering(ids.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn test_scenario_subset_regret() {
        let group = dataset(&[("A", 0.9), ("B", 0.8), ("C", 0.5)]);
        assert!((oracle_best_k(&group, 2).unwrap() - 1.7).abs() < 1e-12);

        let subset = Selection::Subset(vec!["C".into(), "A".into()]);
        let value = regret(&group, &subset, 2).unwrap();
        assert!((value - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_ranking_has_zero_regret() {
        let group = dataset(&[("A", 0.9), ("B", 0.8), ("C", 0.5)]);
        for k in 1..=3 {
            assert!(regret(&group, &ordering(&["A", "B", "C"]), k).unwrap().abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_regression_selection_uses_implied_top_k() {
        let group = dataset(&[("A", 0.9), ("B", 0.8), ("C", 0.5)]);
        let scores = Selection::Scores(vec![
            ("A".into(), 0.1),
            ("B".into(), 0.3),
            ("C".into(), 0.2),
        ]);
        // implied top-1 is B: 0.9 - 0.8
        assert!((regret(&group, &scores, 1).unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_top_1_regret_matches_original_metric() {
        let group = dataset(&[("0", 0.0), ("1", 0.5), ("2", 1.0)]);
        assert!((regret(&group, &ordering(&["0", "1", "2"]), 1).unwrap() - 1.0).abs() < 1e-12);
        assert!(regret(&group, &ordering(&["2", "1", "0"]), 1).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_k_larger_than_dataset() {
        let group = dataset(&[("A", 0.9)]);
        let err = regret(&group, &ordering(&["A"]), 2).unwrap_err();
        assert!(matches!(err, Error::InsufficientPipelines { k: 2, available: 1, .. }));
    }

    #[test]
    fn test_foreign_pipeline_is_inconsistent() {
        let group = dataset(&[("A", 0.9), ("B", 0.1)]);
        let err = regret(&group, &ordering(&["Z", "A"]), 1).unwrap_err();
        assert!(matches!(err, Error::InternalConsistency(_)));
    }

    #[test]
    fn test_duplicate_selection_is_inconsistent() {
        let group = dataset(&[("A", 0.9), ("B", 0.1)]);
        let err = selection_value(&group, &["A", "A"]).unwrap_err();
        assert!(format!("{err}").contains("selected twice"));
    }

    #[test]
    fn test_oracle_top_k_ids() {
        let group = dataset(&[("A", 0.2), ("B", 0.8), ("C", 0.5)]);
        assert_eq!(oracle_top_k(&group, 2).unwrap(), vec!["B", "C"]);
    }

    #[test]
    fn test_mean_regret() {
        assert_eq!(mean_regret(&[]), None);
        let regrets = vec![
            DatasetRegret { dataset_id: "a".into(), regret: 0.2 },
            DatasetRegret { dataset_id: "b".into(), regret: 0.4 },
        ];
        assert!((mean_regret(&regrets).unwrap() - 0.3).abs() < 1e-12);
    }
}
