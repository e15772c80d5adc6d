//! Model and tuning configuration files
//!
//! Both files are JSON. The model config names the hyperparameters that stay
//! fixed and the space the search explores:
//!
//! ```json
//! {
//!   "fixed": { "n_epochs": 50 },
//!   "search_space": {
//!     "learning_rate": { "continuous": { "low": 0.0001, "high": 0.1, "log_scale": true } },
//!     "activation_name": { "categorical": { "choices": ["relu", "tanh"] } }
//!   }
//! }
//! ```
//!
//! The tuning config picks the search strategy and its budget:
//!
//! ```json
//! { "strategy": "random", "n_iter": 20, "seed": 7, "parallelism": 4, "time_budget_secs": 600 }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::search::SearchBudget;
use crate::space::{CandidateSource, Configuration, SearchSpace};
use crate::{Error, Result};

fn read_json<T: DeserializeOwned>(parameter: &str, path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(
            parameter,
            format!("failed to read {}: {e}", path.display()),
        )
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::config(
            parameter,
            format!("failed to parse {}: {e}", path.display()),
        )
    })
}

/// Fixed hyperparameters plus the space the search explores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Values applied to every candidate; sampled values win on conflict
    #[serde(default)]
    pub fixed: Configuration,
    /// Searched hyperparameters
    #[serde(default)]
    pub search_space: SearchSpace,
}

impl ModelConfig {
    /// Load and validate a model config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file is unreadable, malformed,
    /// or declares an invalid domain.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = read_json("model_config_path", path)?;
        config.search_space.validate()?;
        Ok(config)
    }
}

/// How candidates are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Cartesian product of per-parameter grids
    #[default]
    Grid,
    /// Seeded independent samples
    Random,
    /// The `candidates` list, as given
    Explicit,
}

const fn default_grid_points() -> usize {
    3
}

const fn default_n_iter() -> usize {
    10
}

const fn default_parallelism() -> usize {
    1
}

/// Search strategy and budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TuningConfig {
    /// Candidate generation strategy
    #[serde(default)]
    pub strategy: Strategy,
    /// Points per continuous/discrete axis for `grid`
    #[serde(default = "default_grid_points")]
    pub grid_points: usize,
    /// Number of samples for `random`
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
    /// Sampling seed for `random`
    #[serde(default)]
    pub seed: u64,
    /// Configurations for `explicit`
    #[serde(default)]
    pub candidates: Vec<Configuration>,
    /// Stop after this many candidate records
    #[serde(default)]
    pub max_candidates: Option<usize>,
    /// Stop after this much wall-clock time
    #[serde(default)]
    pub time_budget_secs: Option<f64>,
    /// Candidates evaluated concurrently
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            grid_points: default_grid_points(),
            n_iter: default_n_iter(),
            seed: 0,
            candidates: Vec::new(),
            max_candidates: None,
            time_budget_secs: None,
            parallelism: default_parallelism(),
        }
    }
}

impl TuningConfig {
    /// Load and validate a tuning config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file is unreadable, malformed,
    /// or fails [`TuningConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = read_json("tuning_config_path", path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check strategy settings and budgets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        match self.strategy {
            Strategy::Grid if self.grid_points == 0 => {
                return Err(Error::config("grid_points", "must be at least 1"));
            }
            Strategy::Random if self.n_iter == 0 => {
                return Err(Error::config("n_iter", "must be at least 1"));
            }
            Strategy::Explicit if self.candidates.is_empty() => {
                return Err(Error::config(
                    "candidates",
                    "the explicit strategy needs at least one candidate",
                ));
            }
            _ => {}
        }
        if self.max_candidates == Some(0) {
            return Err(Error::config("max_candidates", "must be at least 1"));
        }
        if self.parallelism == 0 {
            return Err(Error::config("parallelism", "must be at least 1"));
        }
        self.time_limit()?;
        Ok(())
    }

    fn time_limit(&self) -> Result<Option<Duration>> {
        self.time_budget_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|e| {
                    Error::config("time_budget_secs", format!("invalid duration {secs}: {e}"))
                })
            })
            .transpose()
    }

    /// Early-termination limits for the search engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a negative or non-finite time budget.
    pub fn budget(&self) -> Result<SearchBudget> {
        Ok(SearchBudget {
            max_candidates: self.max_candidates,
            time_budget: self.time_limit()?,
        })
    }

    /// Build the candidate source for a model config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the space is invalid or the grid
    /// is too large to index.
    pub fn candidate_source(&self, model: &ModelConfig) -> Result<CandidateSource> {
        match self.strategy {
            Strategy::Grid => CandidateSource::grid(&model.search_space, self.grid_points),
            Strategy::Random => {
                CandidateSource::random(model.search_space.clone(), self.n_iter, self.seed)
            }
            Strategy::Explicit => Ok(CandidateSource::explicit(self.candidates.clone())),
        }
    }

    /// Canonical description of the candidates [`TuningConfig::candidate_source`]
    /// produces for `model`, fixed values included.
    ///
    /// Two keys are equal exactly when the sources enumerate the same
    /// configurations in the same order and score them with the same fixed
    /// values. Budgets and parallelism are not part of the key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the key cannot be encoded.
    pub fn source_key(&self, model: &ModelConfig) -> Result<String> {
        let sampled = !matches!(self.strategy, Strategy::Explicit);
        let key = SourceKey {
            strategy: self.strategy,
            grid_points: matches!(self.strategy, Strategy::Grid).then_some(self.grid_points),
            n_iter: matches!(self.strategy, Strategy::Random).then_some(self.n_iter),
            seed: matches!(self.strategy, Strategy::Random).then_some(self.seed),
            candidates: matches!(self.strategy, Strategy::Explicit).then_some(self.candidates.as_slice()),
            search_space: sampled.then_some(&model.search_space),
            fixed: &model.fixed,
        };
        Ok(serde_json::to_string(&key)?)
    }
}

#[derive(Serialize)]
struct SourceKey<'a> {
    strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    grid_points: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_iter: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<&'a [Configuration]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_space: Option<&'a SearchSpace>,
    fixed: &'a Configuration,
}
