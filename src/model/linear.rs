//! Linear regression on metafeatures plus a one-hot pipeline encoding

#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::{check_width, empty_corpus, examples, not_fit, Predictor};
use crate::record::Corpus;
use crate::space::Configuration;
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct Fitted {
    n_features: usize,
    pipelines: BTreeMap<String, usize>,
    /// Metafeature weights followed by one weight per known pipeline
    weights: Vec<f64>,
    bias: f64,
}

impl Fitted {
    fn predict(&self, features: &[f64], pipeline: Option<usize>) -> f64 {
        let mut value = self.bias;
        for (w, x) in self.weights.iter().zip(features) {
            value += w * x;
        }
        if let Some(index) = pipeline {
            value += self.weights[self.n_features + index];
        }
        value
    }
}

/// Mini-batch SGD ridge regression.
///
/// Hyperparameters: `learning_rate` (0.01), `n_epochs` (100),
/// `batch_size` (32), `l2_penalty` (0.0).
#[derive(Debug, Clone)]
pub struct LinearRegression {
    learning_rate: f64,
    n_epochs: usize,
    batch_size: usize,
    l2_penalty: f64,
    seed: u64,
    fitted: Option<Fitted>,
}

impl LinearRegression {
    /// Read hyperparameters from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a non-positive learning rate,
    /// zero epochs or batch size, or a negative penalty.
    pub fn from_config(config: &Configuration, seed: u64) -> Result<Self> {
        let learning_rate = config.float_or("learning_rate", 0.01)?;
        let n_epochs = config.usize_or("n_epochs", 100)?;
        let batch_size = config.usize_or("batch_size", 32)?;
        let l2_penalty = config.float_or("l2_penalty", 0.0)?;

        if !(learning_rate > 0.0 && learning_rate.is_finite()) {
            return Err(Error::config("learning_rate", format!("must be positive, got {learning_rate}")));
        }
        if n_epochs == 0 {
            return Err(Error::config("n_epochs", "must be at least 1"));
        }
        if batch_size == 0 {
            return Err(Error::config("batch_size", "must be at least 1"));
        }
        if !(l2_penalty >= 0.0 && l2_penalty.is_finite()) {
            return Err(Error::config("l2_penalty", format!("must be non-negative, got {l2_penalty}")));
        }

        Ok(Self {
            learning_rate,
            n_epochs,
            batch_size,
            l2_penalty,
            seed,
            fitted: None,
        })
    }
}

impl Predictor for LinearRegression {
    fn name(&self) -> &'static str {
        "linear_regression"
    }

    fn fit(&mut self, train: &Corpus) -> Result<()> {
        let data = examples(train);
        let Some(first) = data.first() else {
            return Err(empty_corpus(self.name()));
        };
        let n_features = first.features.len();
        let pipelines: BTreeMap<String, usize> = data
            .iter()
            .map(|e| e.pipeline_id)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), i))
            .collect();
        let rows: Vec<usize> = data.iter().map(|e| pipelines[e.pipeline_id]).collect();

        let mut model = Fitted {
            n_features,
            weights: vec![0.0; n_features + pipelines.len()],
            pipelines,
            bias: 0.0,
        };

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..data.len()).collect();
        let mut gradient = vec![0.0; model.weights.len()];

        for epoch in 0..self.n_epochs {
            order.shuffle(&mut rng);
            for batch in order.chunks(self.batch_size) {
                gradient.iter_mut().for_each(|g| *g = 0.0);
                let mut gradient_bias = 0.0;

                for &i in batch {
                    let example = &data[i];
                    check_width(self.name(), n_features, example.features.len())?;
                    let residual = model.predict(&example.features, Some(rows[i])) - example.score;
                    for (g, x) in gradient.iter_mut().zip(&example.features) {
                        *g += residual * x;
                    }
                    gradient[n_features + rows[i]] += residual;
                    gradient_bias += residual;
                }

                let m = batch.len() as f64;
                for (w, g) in model.weights.iter_mut().zip(&gradient) {
                    *w -= self.learning_rate * (g / m + self.l2_penalty * *w);
                }
                model.bias -= self.learning_rate * gradient_bias / m;
            }

            if !model.bias.is_finite() || model.weights.iter().any(|w| !w.is_finite()) {
                return Err(Error::Training(format!(
                    "linear_regression diverged at epoch {epoch} (learning_rate={})",
                    self.learning_rate
                )));
            }
        }

        debug!(
            features = n_features,
            pipelines = model.pipelines.len(),
            epochs = self.n_epochs,
            "fitted linear_regression"
        );
        self.fitted = Some(model);
        Ok(())
    }

    fn predict(&self, features: &[f64], pipeline_id: &str) -> Result<f64> {
        let model = self.fitted.as_ref().ok_or_else(|| not_fit(self.name()))?;
        check_width(self.name(), model.n_features, features.len())?;
        Ok(model.predict(features, model.pipelines.get(pipeline_id).copied()))
    }
}
