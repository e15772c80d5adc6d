//! Run Context - immutable parameters of one tuning run

use serde::{Deserialize, Serialize};

use crate::model::validate_model_name;
use crate::objective::Objective;
use crate::preprocess::MetafeatureSubset;
use crate::problem::ProblemKind;
use crate::split::SplitSpec;
use crate::{Error, Result};

/// Everything a tuning run is parameterized by, besides the config files.
///
/// Built once from the CLI (or by library callers), validated, then passed
/// by reference through partitioning, search and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Registry model name
    pub model: String,
    /// Seed for model initialization and stochastic training
    pub model_seed: u64,
    /// Formulations to score, in request order, without duplicates
    pub problems: Vec<ProblemKind>,
    /// Objective to minimize
    pub objective: Objective,
    /// Regret `k`
    pub k: usize,
    /// Metafeature vocabulary restriction
    pub metafeature_subset: MetafeatureSubset,
    /// Validation split carved from the training pool
    pub validation: SplitSpec,
    /// Optional test split carved from the full corpus first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<SplitSpec>,
}

impl RunContext {
    /// Create a context with `top_k_regret`, all metafeatures and no test split.
    #[must_use]
    pub fn new(model: impl Into<String>, problems: Vec<ProblemKind>, k: usize, validation: SplitSpec) -> Self {
        let mut unique = Vec::with_capacity(problems.len());
        for problem in problems {
            if !unique.contains(&problem) {
                unique.push(problem);
            }
        }
        Self {
            model: model.into(),
            model_seed: 0,
            problems: unique,
            objective: Objective::TopKRegret,
            k,
            metafeature_subset: MetafeatureSubset::All,
            validation,
            test: None,
        }
    }

    /// Set the model seed.
    #[must_use]
    pub const fn with_model_seed(mut self, seed: u64) -> Self {
        self.model_seed = seed;
        self
    }

    /// Set the objective.
    #[must_use]
    pub const fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Set the metafeature subset.
    #[must_use]
    pub const fn with_metafeature_subset(mut self, subset: MetafeatureSubset) -> Self {
        self.metafeature_subset = subset;
        self
    }

    /// Carve a test split before the validation split.
    #[must_use]
    pub const fn with_test_split(mut self, test: SplitSpec) -> Self {
        self.test = Some(test);
        self
    }

    /// Fail fast on parameters that make the run meaningless.
    ///
    /// Split sizes are checked against the corpus later, when it is known.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the offending parameter.
    pub fn validate(&self) -> Result<()> {
        validate_model_name(&self.model)?;
        if self.k == 0 {
            return Err(Error::config("k", "k must be greater than 0"));
        }
        if self.problems.is_empty() {
            return Err(Error::config("problem", "at least one problem formulation is required"));
        }
        if self.validation.size == 0 {
            return Err(Error::config(
                "test_size",
                "the validation split must hold at least one dataset",
            ));
        }
        if self.test.is_some_and(|t| t.size == 0) {
            return Err(Error::config("test_size", "the test split must hold at least one dataset"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RunContext {
        RunContext::new(
            "mean_regression",
            vec![ProblemKind::Rank, ProblemKind::Subset, ProblemKind::Rank],
            25,
            SplitSpec::new(2, 9_232_859_745),
        )
    }

    #[test]
    fn test_problems_are_deduplicated_in_order() {
        assert_eq!(context().problems, vec![ProblemKind::Rank, ProblemKind::Subset]);
    }

    #[test]
    fn test_valid_context() {
        assert!(context().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_k() {
        let mut ctx = context();
        ctx.k = 0;
        let err = ctx.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration { ref parameter, .. } if parameter == "k"));
    }

    #[test]
    fn test_rejects_empty_problems() {
        let mut ctx = context();
        ctx.problems.clear();
        let err = ctx.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration { ref parameter, .. } if parameter == "problem"));
    }

    #[test]
    fn test_rejects_unknown_model() {
        let mut ctx = context();
        ctx.model = "gpt".into();
        let err = ctx.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration { ref parameter, .. } if parameter == "model"));
    }

    #[test]
    fn test_rejects_empty_validation() {
        let ctx = RunContext::new("random", vec![ProblemKind::Rank], 1, SplitSpec::new(0, 0));
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_names() {
        let ctx = context().with_objective(Objective::Top1Regret);
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["objective"], "top_1_regret");
        assert_eq!(json["metafeature_subset"], "all");
        assert_eq!(json["problems"][0], "rank");
        let back: RunContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }
}
