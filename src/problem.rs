//! Problem formulations over one scalar predictor
//!
//! A trained predictor scores every `(dataset, pipeline)` pair. Each
//! formulation is a stateless transform of those scores into a
//! [`Selection`] the regret evaluator can consume:
//!
//! | Formulation | Selection |
//! |---|---|
//! | `regression` | raw predicted scores |
//! | `rank` | all pipelines, best predicted first |
//! | `subset` | the predicted top-`k` pipelines |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::topk::{rank_order, top_k_ids};
use crate::{Error, Result};

/// Problem formulation requested with `--problem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    /// Predict a scalar score per pipeline
    Regression,
    /// Predict the ordering of pipelines within a dataset
    Rank,
    /// Predict the top-k pipelines of a dataset
    Subset,
}

impl ProblemKind {
    /// Every formulation, in canonical order.
    pub const ALL: [Self; 3] = [Self::Regression, Self::Rank, Self::Subset];

    /// CLI / JSON name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regression => "regression",
            Self::Rank => "rank",
            Self::Subset => "subset",
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                Error::config(
                    "problem",
                    format!("unknown problem `{s}` (expected regression, rank or subset)"),
                )
            })
    }
}

/// Formulation-specific output for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Raw predicted score per pipeline
    Scores(Vec<(String, f64)>),
    /// All pipelines, best predicted first
    Ordering(Vec<String>),
    /// Chosen pipelines, best predicted first
    Subset(Vec<String>),
}

impl Selection {
    /// The model's top-`k` pipelines implied by this selection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InternalConsistency`] if the selection holds fewer
    /// than `k` pipelines, or a subset of a different size.
    pub fn top_k(&self, k: usize) -> Result<Vec<&str>> {
        match self {
            Self::Scores(scores) => {
                if scores.len() < k {
                    return Err(short_selection(scores.len(), k));
                }
                top_k_ids(scores, k)
            }
            Self::Ordering(order) => {
                if order.len() < k {
                    return Err(short_selection(order.len(), k));
                }
                Ok(order[..k].iter().map(String::as_str).collect())
            }
            Self::Subset(chosen) => {
                if chosen.len() < k {
                    return Err(short_selection(chosen.len(), k));
                }
                // A subset is already best-first, so its prefix is the top-k
                Ok(chosen[..k].iter().map(String::as_str).collect())
            }
        }
    }
}

fn short_selection(len: usize, k: usize) -> Error {
    Error::InternalConsistency(format!("selection holds {len} pipelines, cannot extract top-{k}"))
}

/// Turn raw predictions for one dataset into a formulation-specific selection.
///
/// # Errors
///
/// Returns [`Error::InsufficientPipelines`] for [`ProblemKind::Subset`] when
/// the dataset has fewer than `k` pipelines. Callers exclude such datasets and
/// record the exclusion.
pub fn adapt(
    kind: ProblemKind,
    dataset_id: &str,
    predictions: &[(String, f64)],
    k: usize,
) -> Result<Selection> {
    match kind {
        ProblemKind::Regression => Ok(Selection::Scores(predictions.to_vec())),
        ProblemKind::Rank => Ok(Selection::Ordering(
            rank_order(predictions)
                .into_iter()
                .map(|i| predictions[i].0.clone())
                .collect(),
        )),
        ProblemKind::Subset => {
            if predictions.len() < k {
                return Err(Error::InsufficientPipelines {
                    dataset: dataset_id.to_string(),
                    k,
                    available: predictions.len(),
                });
            }
            Ok(Selection::Subset(
                top_k_ids(predictions, k)?
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictions() -> Vec<(String, f64)> {
        vec![
            ("A".to_string(), 0.2),
            ("B".to_string(), 0.1),
            ("C".to_string(), 0.9),
        ]
    }

    #[test]
    fn test_problem_kind_parse() {
        assert_eq!("rank".parse::<ProblemKind>().unwrap(), ProblemKind::Rank);
        let err = "ranking".parse::<ProblemKind>().unwrap_err();
        assert!(format!("{err}").contains("`problem`"));
        assert_eq!(ProblemKind::Subset.to_string(), "subset");
    }

    #[test]
    fn test_regression_passes_scores_through() {
        let selection = adapt(ProblemKind::Regression, "d", &predictions(), 2).unwrap();
        assert_eq!(selection, Selection::Scores(predictions()));
        assert_eq!(selection.top_k(2).unwrap(), vec!["C", "A"]);
    }

    #[test]
    fn test_rank_orders_by_prediction() {
        let selection = adapt(ProblemKind::Rank, "d", &predictions(), 2).unwrap();
        assert_eq!(
            selection,
            Selection::Ordering(vec!["C".into(), "A".into(), "B".into()])
        );
    }

    #[test]
    fn test_rank_tie_break_is_pipeline_id() {
        let tied = vec![("b".to_string(), 1.0), ("a".to_string(), 1.0)];
        let selection = adapt(ProblemKind::Rank, "d", &tied, 1).unwrap();
        assert_eq!(selection, Selection::Ordering(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_subset_selects_k() {
        let selection = adapt(ProblemKind::Subset, "d", &predictions(), 2).unwrap();
        assert_eq!(selection, Selection::Subset(vec!["C".into(), "A".into()]));
        assert_eq!(selection.top_k(1).unwrap(), vec!["C"]);
    }

    #[test]
    fn test_subset_insufficient_pipelines() {
        let err = adapt(ProblemKind::Subset, "tiny", &predictions(), 4).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientPipelines { ref dataset, k: 4, available: 3 } if dataset == "tiny"
        ));
    }

    #[test]
    fn test_top_k_beyond_selection_is_inconsistent() {
        let selection = Selection::Ordering(vec!["a".into()]);
        assert!(matches!(selection.top_k(2), Err(Error::InternalConsistency(_))));
    }
}
