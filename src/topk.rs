//! Top-K pipeline selection
//!
//! **Problem**: ranking every pipeline of a dataset to pick `k` of them is
//! O(N log N) per dataset, and it runs once per dataset, per formulation,
//! per candidate configuration.
//!
//! **Solution**: Min-heap based Top-K selection, O(N log K).
//!
//! Ordering is total and deterministic: higher score first, ties broken by
//! `pipeline_id` ascending. The oracle and every problem adapter share this
//! ordering, so a perfect predictor always reproduces the oracle selection.
//!
//! Toyota Way Principles:
//! - **Muda elimination**: Avoid unnecessary full sort
//! - **Jidoka**: One ordering rule for oracle and model (no silent drift)

use crate::{Error, Result};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A pipeline and the score it is ranked by.
#[derive(Debug, Clone, Copy)]
struct RankedItem<'a> {
    score: f64,
    pipeline_id: &'a str,
    index: usize,
}

impl PartialEq for RankedItem<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankedItem<'_> {}

impl Ord for RankedItem<'_> {
    /// `Greater` means ranked earlier: higher score, then smaller pipeline id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.pipeline_id.cmp(self.pipeline_id))
    }
}

impl PartialOrd for RankedItem<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn ranked<'a, S: AsRef<str>>(items: &'a [(S, f64)]) -> impl Iterator<Item = RankedItem<'a>> {
    items
        .iter()
        .enumerate()
        .map(|(index, (id, score))| RankedItem {
            score: *score,
            pipeline_id: id.as_ref(),
            index,
        })
}

/// Indices of all items in rank order (best first).
#[must_use]
pub fn rank_order<S: AsRef<str>>(items: &[(S, f64)]) -> Vec<usize> {
    let mut all: Vec<RankedItem<'_>> = ranked(items).collect();
    all.sort_by(|a, b| b.cmp(a));
    all.into_iter().map(|item| item.index).collect()
}

/// Select the indices of the top `k` items, best first.
///
/// Returns every item in rank order when `k >= items.len()`.
///
/// # Errors
///
/// Returns [`Error::Other`] if `k` is zero.
///
/// # Examples
///
/// ```rust
/// use trueno_tune::topk::top_k_indices;
///
/// let scores = vec![("a", 0.5), ("b", 0.9), ("c", 0.9), ("d", 0.1)];
/// let top2 = top_k_indices(&scores, 2)?;
/// // b and c tie on score; "b" < "c" so b ranks first
/// assert_eq!(top2, vec![1, 2]);
/// # Ok::<(), trueno_tune::Error>(())
/// ```
pub fn top_k_indices<S: AsRef<str>>(items: &[(S, f64)], k: usize) -> Result<Vec<usize>> {
    if k == 0 {
        return Err(Error::Other("k must be greater than 0".to_string()));
    }

    if k >= items.len() {
        return Ok(rank_order(items));
    }

    // Min-heap of the best k seen so far: the root is the worst kept item
    let mut heap: BinaryHeap<Reverse<RankedItem<'_>>> = BinaryHeap::with_capacity(k);
    for item in ranked(items) {
        if heap.len() < k {
            heap.push(Reverse(item));
        } else if let Some(Reverse(worst)) = heap.peek() {
            if item > *worst {
                heap.pop();
                heap.push(Reverse(item));
            }
        }
    }

    let mut result: Vec<RankedItem<'_>> = heap.into_iter().map(|Reverse(item)| item).collect();
    result.sort_by(|a, b| b.cmp(a));
    Ok(result.into_iter().map(|item| item.index).collect())
}

/// Pipeline ids of the top `k` items, best first.
///
/// # Errors
///
/// Returns [`Error::Other`] if `k` is zero.
pub fn top_k_ids<S: AsRef<str>>(items: &[(S, f64)], k: usize) -> Result<Vec<&str>> {
    Ok(top_k_indices(items, k)?
        .into_iter()
        .map(|i| items[i].0.as_ref())
        .collect())
}
