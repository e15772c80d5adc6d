//! Scoring a fitted predictor on the validation split
//!
//! Predictions are computed once per dataset and shared by every requested
//! formulation. A dataset with fewer pipelines than the regret `k` has no
//! defined oracle; it is excluded from every formulation and the exclusion is
//! recorded so that all formulations average over the same datasets.

#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::metrics::{pearson, rmse, spearman, top_k_correct};
use crate::model::Predictor;
use crate::objective::Objective;
use crate::problem::{adapt, ProblemKind, Selection};
use crate::record::{Corpus, DatasetGroup};
use crate::regret::{mean_regret, regret, DatasetRegret};
use crate::{Error, Result};

/// A dataset skipped during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    /// Skipped dataset
    pub dataset_id: String,
    /// Why it was skipped
    pub reason: String,
}

/// Outcome of one formulation on the validation split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Formulation evaluated
    pub problem: ProblemKind,
    /// Objective the value measures
    pub objective: Objective,
    /// `k` the regret was measured at
    pub k: usize,
    /// Mean regret over the evaluated datasets (lower is better)
    pub value: f64,
    /// Regret of every evaluated dataset, in `dataset_id` order
    pub per_dataset: Vec<DatasetRegret>,
    /// Datasets that could not be evaluated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<Exclusion>,
    /// Informational metrics; never used for selection
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

/// Mean of the per-formulation objective values, `None` for no results.
#[must_use]
pub fn aggregate_objective(results: &[EvaluationResult]) -> Option<f64> {
    if results.is_empty() {
        return None;
    }
    Some(results.iter().map(|r| r.value).sum::<f64>() / results.len() as f64)
}

struct Scored<'a> {
    group: &'a DatasetGroup,
    predictions: Vec<(String, f64)>,
}

/// Evaluate a fitted predictor for each requested formulation.
///
/// # Errors
///
/// - [`Error::Training`] if the predictor produces a non-finite prediction
/// - [`Error::Data`] if no validation dataset has at least `k` pipelines
/// - [`Error::InternalConsistency`] on a negative regret
pub fn evaluate(
    predictor: &dyn Predictor,
    validation: &Corpus,
    problems: &[ProblemKind],
    objective: Objective,
    k: usize,
) -> Result<Vec<EvaluationResult>> {
    if k == 0 {
        return Err(Error::config("k", "k must be greater than 0"));
    }
    let k_eff = objective.effective_k(k);
    // Subset selections always hold k pipelines, so k drives exclusion too
    let required = k.max(k_eff);

    let mut excluded = Vec::new();
    let mut scored = Vec::with_capacity(validation.len());
    for group in validation.groups() {
        if group.len() < required {
            warn!(
                dataset = group.dataset_id(),
                pipelines = group.len(),
                k = required,
                "excluding dataset with too few pipelines"
            );
            excluded.push(Exclusion {
                dataset_id: group.dataset_id().to_string(),
                reason: format!("{} pipelines, fewer than k={required}", group.len()),
            });
            continue;
        }
        scored.push(Scored {
            group,
            predictions: predictor.predict_group(group)?,
        });
    }

    if scored.is_empty() {
        return Err(Error::data(
            "<validation>",
            format!("none of the {} datasets has at least k={required} pipelines", validation.len()),
        ));
    }

    problems
        .iter()
        .map(|&problem| {
            let mut per_dataset = Vec::with_capacity(scored.len());
            let mut selections = Vec::with_capacity(scored.len());
            for s in &scored {
                let selection = adapt(problem, s.group.dataset_id(), &s.predictions, k)?;
                per_dataset.push(DatasetRegret {
                    dataset_id: s.group.dataset_id().to_string(),
                    regret: regret(s.group, &selection, k_eff)?,
                });
                selections.push(selection);
            }
            let value = mean_regret(&per_dataset).ok_or_else(|| {
                Error::InternalConsistency("no regret recorded for a non-empty split".to_string())
            })?;

            Ok(EvaluationResult {
                problem,
                objective,
                k: k_eff,
                value,
                per_dataset,
                excluded: excluded.clone(),
                metrics: informational_metrics(problem, &scored, &selections, k)?,
            })
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn informational_metrics(
    problem: ProblemKind,
    scored: &[Scored<'_>],
    selections: &[Selection],
    k: usize,
) -> Result<BTreeMap<String, f64>> {
    let mut metrics = BTreeMap::new();
    match problem {
        ProblemKind::Regression => {
            let mut predicted = Vec::new();
            let mut actual = Vec::new();
            for s in scored {
                for ((_, p), truth) in s.predictions.iter().zip(s.group.pipelines()) {
                    predicted.push(*p);
                    actual.push(truth.score);
                }
            }
            if let Some(v) = rmse(&predicted, &actual) {
                metrics.insert("rmse".to_string(), v);
            }
            if let Some(v) = pearson(&predicted, &actual) {
                metrics.insert("pearson".to_string(), v);
            }
        }
        ProblemKind::Rank => {
            let correlations: Vec<f64> = scored
                .iter()
                .filter_map(|s| {
                    let predicted: Vec<f64> = s.predictions.iter().map(|(_, p)| *p).collect();
                    let actual: Vec<f64> = s.group.pipelines().iter().map(|p| p.score).collect();
                    spearman(&predicted, &actual)
                })
                .collect();
            if let Some(v) = mean(&correlations) {
                metrics.insert("spearman".to_string(), v);
            }
        }
        ProblemKind::Subset => {
            let mut top_1 = Vec::with_capacity(scored.len());
            let mut correct = Vec::with_capacity(scored.len());
            for (s, selection) in scored.iter().zip(selections) {
                top_1.push(regret(s.group, selection, 1)?);
                correct.push(top_k_correct(s.group, &selection.top_k(k)?, k)? as f64);
            }
            if let Some(v) = mean(&top_1) {
                metrics.insert("top_1_regret".to_string(), v);
            }
            if let Some(v) = mean(&correct) {
                metrics.insert("top_k_correct".to_string(), v);
            }
        }
    }
    Ok(metrics)
}
