//! Performance predictors
//!
//! A [`Predictor`] maps `(metafeatures, pipeline_id)` to a predicted score.
//! The problem formulations in [`crate::problem`] are built on top of this
//! single scalar output, so every model serves regression, rank and subset.
//!
//! Models are created by name through [`build_predictor`] with a
//! [`Configuration`] of hyperparameters and a seed. Every model is
//! deterministic for a fixed `(configuration, seed, training corpus)`.
//!
//! | Name | Model |
//! |---|---|
//! | `mean_regression` | global mean training score |
//! | `median_regression` | global median training score |
//! | `per_pipeline_regression` | mean training score of the pipeline |
//! | `random` | seeded pseudo-random score |
//! | `linear_regression` | SGD ridge regression on metafeatures + pipeline one-hot |
//! | `dna_regression` | shared MLP trunk with one output head per pipeline |

mod baseline;
mod dna;
mod linear;

pub use baseline::{MeanRegression, MedianRegression, PerPipelineRegression, RandomBaseline};
pub use dna::{Activation, DnaRegression};
pub use linear::LinearRegression;

use crate::record::{Corpus, DatasetGroup};
use crate::space::Configuration;
use crate::{Error, Result};

/// Every registered model name.
pub const MODEL_NAMES: [&str; 6] = [
    "mean_regression",
    "median_regression",
    "per_pipeline_regression",
    "random",
    "linear_regression",
    "dna_regression",
];

/// A trainable score predictor.
pub trait Predictor: Send {
    /// Registry name of the model
    fn name(&self) -> &'static str;

    /// Fit on a preprocessed training corpus.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Training`] if fitting diverges or the corpus is empty.
    fn fit(&mut self, train: &Corpus) -> Result<()>;

    /// Predict the score of `pipeline_id` on a dataset described by `features`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Training`] if the model has not been fit.
    fn predict(&self, features: &[f64], pipeline_id: &str) -> Result<f64>;

    /// Predict every pipeline of a dataset, in the group's pipeline order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Training`] if any prediction is not finite.
    fn predict_group(&self, group: &DatasetGroup) -> Result<Vec<(String, f64)>> {
        let features = group.feature_vector();
        group
            .pipelines()
            .iter()
            .map(|p| {
                let value = self.predict(&features, &p.pipeline_id)?;
                if !value.is_finite() {
                    return Err(Error::Training(format!(
                        "{} predicted {value} for pipeline `{}` on dataset `{}`",
                        self.name(),
                        p.pipeline_id,
                        group.dataset_id()
                    )));
                }
                Ok((p.pipeline_id.clone(), value))
            })
            .collect()
    }
}

/// Reject unknown model names before any work begins.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an unregistered name.
pub fn validate_model_name(name: &str) -> Result<()> {
    if MODEL_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(Error::config(
            "model",
            format!("unknown model `{name}` (expected one of {})", MODEL_NAMES.join(", ")),
        ))
    }
}

/// Build a fresh, unfitted predictor.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an unknown model name or an invalid
/// hyperparameter value.
///
/// # Examples
///
/// ```rust
/// use trueno_tune::model::build_predictor;
/// use trueno_tune::space::{Configuration, ParameterValue};
///
/// let config = Configuration::new().with("learning_rate", ParameterValue::Float(0.05));
/// let model = build_predictor("linear_regression", &config, 0)?;
/// assert_eq!(model.name(), "linear_regression");
/// # Ok::<(), trueno_tune::Error>(())
/// ```
pub fn build_predictor(name: &str, config: &Configuration, seed: u64) -> Result<Box<dyn Predictor>> {
    validate_model_name(name)?;
    let model: Box<dyn Predictor> = match name {
        "mean_regression" => Box::new(MeanRegression::default()),
        "median_regression" => Box::new(MedianRegression::default()),
        "per_pipeline_regression" => Box::new(PerPipelineRegression::default()),
        "random" => Box::new(RandomBaseline::new(seed)),
        "linear_regression" => Box::new(LinearRegression::from_config(config, seed)?),
        _ => Box::new(DnaRegression::from_config(config, seed)?),
    };
    Ok(model)
}

/// One flattened training example.
#[derive(Debug, Clone)]
pub(crate) struct Example<'a> {
    pub features: Vec<f64>,
    pub pipeline_id: &'a str,
    pub score: f64,
}

/// Flatten a corpus into examples, dataset then pipeline order.
pub(crate) fn examples(train: &Corpus) -> Vec<Example<'_>> {
    train
        .groups()
        .flat_map(|group| {
            let features = group.feature_vector();
            group.pipelines().iter().map(move |p| Example {
                features: features.clone(),
                pipeline_id: p.pipeline_id.as_str(),
                score: p.score,
            })
        })
        .collect()
}

pub(crate) fn not_fit(model: &str) -> Error {
    Error::Training(format!("{model} has not been fit"))
}

pub(crate) fn empty_corpus(model: &str) -> Error {
    Error::Training(format!("{model} cannot be fit on an empty corpus"))
}

pub(crate) fn check_width(model: &str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::InternalConsistency(format!(
            "{model} was fit on {expected} metafeatures but received {actual}"
        )))
    }
}
