//! Informational metrics reported next to the regret objective
//!
//! These never drive candidate selection; they are recorded in each
//! [`EvaluationResult`](crate::evaluate::EvaluationResult) for comparison and
//! debugging.

#![allow(clippy::cast_precision_loss)]

use rustc_hash::FxHashSet;

use crate::record::DatasetGroup;
use crate::regret::oracle_top_k;
use crate::Result;

/// Root mean squared error, `None` for empty or mismatched inputs.
#[must_use]
pub fn rmse(predictions: &[f64], targets: &[f64]) -> Option<f64> {
    if predictions.is_empty() || predictions.len() != targets.len() {
        return None;
    }
    let sse: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum();
    Some((sse / predictions.len() as f64).sqrt())
}

/// Pearson correlation coefficient.
///
/// `None` when either side has zero variance (the coefficient is undefined)
/// or the inputs are mismatched / shorter than two.
#[must_use]
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Fractional ranks (1-based, ties share their average rank).
#[must_use]
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end (0-based) share ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

/// Spearman rank correlation: Pearson over average ranks.
#[must_use]
pub fn spearman(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }
    pearson(&average_ranks(xs), &average_ranks(ys))
}

/// How many of the selected pipelines are among the true top-`k`.
///
/// # Errors
///
/// Returns [`Error::InsufficientPipelines`](crate::Error::InsufficientPipelines)
/// if the dataset has fewer than `k` pipelines.
pub fn top_k_correct(group: &DatasetGroup, selected: &[&str], k: usize) -> Result<usize> {
    let truth: FxHashSet<&str> = oracle_top_k(group, k)?.into_iter().collect();
    Ok(selected.iter().filter(|id| truth.contains(**id)).count())
}
