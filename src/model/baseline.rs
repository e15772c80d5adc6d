//! Baseline predictors

#![allow(clippy::cast_precision_loss)]

use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::{FxHashMap, FxHasher};

use super::{empty_corpus, not_fit, Predictor};
use crate::record::Corpus;
use crate::Result;

fn all_scores(train: &Corpus) -> Vec<f64> {
    train
        .groups()
        .flat_map(|g| g.pipelines().iter().map(|p| p.score))
        .collect()
}

/// Predicts the mean training score for everything.
#[derive(Debug, Clone, Default)]
pub struct MeanRegression {
    mean: Option<f64>,
}

impl Predictor for MeanRegression {
    fn name(&self) -> &'static str {
        "mean_regression"
    }

    fn fit(&mut self, train: &Corpus) -> Result<()> {
        let scores = all_scores(train);
        if scores.is_empty() {
            return Err(empty_corpus(self.name()));
        }
        self.mean = Some(scores.iter().sum::<f64>() / scores.len() as f64);
        Ok(())
    }

    fn predict(&self, _features: &[f64], _pipeline_id: &str) -> Result<f64> {
        self.mean.ok_or_else(|| not_fit(self.name()))
    }
}

/// Predicts the median training score for everything.
#[derive(Debug, Clone, Default)]
pub struct MedianRegression {
    median: Option<f64>,
}

pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

impl Predictor for MedianRegression {
    fn name(&self) -> &'static str {
        "median_regression"
    }

    fn fit(&mut self, train: &Corpus) -> Result<()> {
        let mut scores = all_scores(train);
        self.median = Some(median(&mut scores).ok_or_else(|| empty_corpus(self.name()))?);
        Ok(())
    }

    fn predict(&self, _features: &[f64], _pipeline_id: &str) -> Result<f64> {
        self.median.ok_or_else(|| not_fit(self.name()))
    }
}

/// Predicts the mean training score of each pipeline.
///
/// Pipelines never seen during training get the global mean.
#[derive(Debug, Clone, Default)]
pub struct PerPipelineRegression {
    means: FxHashMap<String, f64>,
    fallback: Option<f64>,
}

impl Predictor for PerPipelineRegression {
    fn name(&self) -> &'static str {
        "per_pipeline_regression"
    }

    fn fit(&mut self, train: &Corpus) -> Result<()> {
        let mut totals: FxHashMap<&str, (f64, usize)> = FxHashMap::default();
        for group in train.groups() {
            for p in group.pipelines() {
                let entry = totals.entry(p.pipeline_id.as_str()).or_insert((0.0, 0));
                entry.0 += p.score;
                entry.1 += 1;
            }
        }
        let scores = all_scores(train);
        if scores.is_empty() {
            return Err(empty_corpus(self.name()));
        }

        self.fallback = Some(scores.iter().sum::<f64>() / scores.len() as f64);
        self.means = totals
            .into_iter()
            .map(|(id, (total, count))| (id.to_string(), total / count as f64))
            .collect();
        Ok(())
    }

    fn predict(&self, _features: &[f64], pipeline_id: &str) -> Result<f64> {
        let fallback = self.fallback.ok_or_else(|| not_fit(self.name()))?;
        Ok(self.means.get(pipeline_id).copied().unwrap_or(fallback))
    }
}

/// Seeded pseudo-random scores, a lower bound for the other models.
///
/// The score is a pure function of the seed, the metafeatures and the
/// pipeline id, so repeated predictions agree and nothing is fit.
#[derive(Debug, Clone)]
pub struct RandomBaseline {
    seed: u64,
}

impl RandomBaseline {
    /// Create a random baseline.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Predictor for RandomBaseline {
    fn name(&self) -> &'static str {
        "random"
    }

    fn fit(&mut self, _train: &Corpus) -> Result<()> {
        Ok(())
    }

    fn predict(&self, features: &[f64], pipeline_id: &str) -> Result<f64> {
        let mut hasher = FxHasher::default();
        self.seed.hash(&mut hasher);
        for value in features {
            value.to_bits().hash(&mut hasher);
        }
        pipeline_id.hash(&mut hasher);
        let mut rng = ChaCha8Rng::seed_from_u64(hasher.finish());
        Ok(rng.gen::<f64>())
    }
}
