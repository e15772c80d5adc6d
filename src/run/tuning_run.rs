//! Tuning Run - lifecycle record of one search

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RunContext;
use crate::problem::ProblemKind;
use crate::search::{CandidateRecord, SearchOutcome, SearchState};
use crate::space::Configuration;
use crate::{Error, Result};

/// Status of a tuning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is created but not yet started.
    Pending,
    /// Search is executing.
    Running,
    /// Every candidate within budget was evaluated.
    Completed,
    /// Fatal error, or no candidate succeeded.
    Failed,
    /// Stopped early by a time budget or cancellation.
    Cancelled,
}

impl From<SearchState> for RunStatus {
    fn from(state: SearchState) -> Self {
        match state {
            SearchState::Idle => Self::Pending,
            SearchState::Running => Self::Running,
            SearchState::Completed => Self::Completed,
            SearchState::Failed => Self::Failed,
            SearchState::Cancelled => Self::Cancelled,
        }
    }
}

/// Tuning Run represents a single execution of the search.
///
/// The run owns the candidate log. The best candidate is kept as a pointer
/// (position in that log) rather than a copy; candidate indices alone are not
/// unique once resumed records are mixed in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TuningRun {
    run_id: String,
    context: RunContext,
    #[serde(default)]
    fixed: Configuration,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    candidates: Vec<CandidateRecord>,
    best_position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TuningRun {
    /// Create a new run in Pending status.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Unique identifier for the run
    /// * `context` - Parameters the run was started with
    #[must_use]
    pub fn new(run_id: impl Into<String>, context: RunContext) -> Self {
        Self {
            run_id: run_id.into(),
            context,
            fixed: Configuration::new(),
            status: RunStatus::Pending,
            started_at: None,
            ended_at: None,
            candidates: Vec::new(),
            best_position: None,
            error: None,
        }
    }

    /// Record the fixed hyperparameters every candidate was merged over.
    #[must_use]
    pub fn with_fixed(mut self, fixed: Configuration) -> Self {
        self.fixed = fixed;
        self
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the run parameters.
    #[must_use]
    pub const fn context(&self) -> &RunContext {
        &self.context
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has finished.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Get every candidate record, resumed ones included.
    #[must_use]
    pub fn candidates(&self) -> &[CandidateRecord] {
        &self.candidates
    }

    /// Get the failure message of a failed run.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Start the run, transitioning from Pending to Running.
    ///
    /// Sets the `started_at` timestamp to now.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Finalize the run from a search outcome.
    ///
    /// Sets the `ended_at` timestamp to now and takes ownership of the
    /// candidate log. The fatal error, if any, is handed back to the caller
    /// after its message is recorded on the run.
    pub fn finish(&mut self, outcome: SearchOutcome) -> Option<Error> {
        self.status = outcome.state.into();
        self.ended_at = Some(Utc::now());
        self.candidates = outcome.records;
        self.best_position = outcome.best;
        self.error = outcome.fatal.as_ref().map(ToString::to_string);
        outcome.fatal
    }

    /// Get the best candidate record, if any candidate succeeded.
    #[must_use]
    pub fn best(&self) -> Option<&CandidateRecord> {
        self.candidates.get(self.best_position?)
    }

    /// Get the aggregate objective of the best candidate.
    #[must_use]
    pub fn best_objective(&self) -> Option<f64> {
        self.best().and_then(|record| record.objective)
    }

    /// Full hyperparameters of the best candidate, fixed values included.
    #[must_use]
    pub fn best_configuration(&self) -> Option<Configuration> {
        self.best()
            .map(|record| record.configuration.merged_over(&self.fixed))
    }

    /// Objective value of the best candidate per formulation.
    #[must_use]
    pub fn best_breakdown(&self) -> Vec<(ProblemKind, f64)> {
        self.best()
            .map(|record| {
                record
                    .results
                    .iter()
                    .map(|result| (result.problem, result.value))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Write the run as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Read a run written by [`TuningRun::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the best
    /// pointer does not refer to a successful candidate.
    pub fn load(path: &Path) -> Result<Self> {
        let run: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        if let Some(position) = run.best_position {
            if !run.best().is_some_and(CandidateRecord::succeeded) {
                return Err(Error::InternalConsistency(format!(
                    "best record {position} in {} is not a successful candidate",
                    path.display()
                )));
            }
        }
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::EvaluationResult;
    use crate::objective::Objective;
    use crate::search::CandidateStatus;
    use crate::space::ParameterValue;
    use crate::split::SplitSpec;

    fn context() -> RunContext {
        RunContext::new("linear_regression", vec![ProblemKind::Rank], 2, SplitSpec::new(1, 7))
    }

    fn record(index: usize, objective: Option<f64>) -> CandidateRecord {
        let configuration = Configuration::new().with("learning_rate", ParameterValue::Float(0.1));
        CandidateRecord {
            index,
            fingerprint: configuration.fingerprint(),
            configuration,
            status: if objective.is_some() {
                CandidateStatus::Succeeded
            } else {
                CandidateStatus::Failed
            },
            objective,
            results: objective
                .map(|value| {
                    vec![EvaluationResult {
                        problem: ProblemKind::Rank,
                        objective: Objective::TopKRegret,
                        k: 2,
                        value,
                        per_dataset: Vec::new(),
                        excluded: Vec::new(),
                        metrics: std::collections::BTreeMap::new(),
                    }]
                })
                .unwrap_or_default(),
            error: objective.is_none().then(|| "diverged".to_string()),
            duration_ms: 3,
            finished_at: Utc::now(),
        }
    }

    fn outcome() -> SearchOutcome {
        SearchOutcome {
            state: SearchState::Completed,
            records: vec![record(0, Some(0.4)), record(1, None), record(2, Some(0.1))],
            best: Some(2),
            fatal: None,
        }
    }

    #[test]
    fn test_run_status_default() {
        let run = TuningRun::new("run-1", context());
        assert_eq!(run.status(), RunStatus::Pending);
        assert!(run.best().is_none());
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = TuningRun::new("run-1", context())
            .with_fixed(Configuration::new().with("n_epochs", ParameterValue::Int(5)));
        run.start();
        assert_eq!(run.status(), RunStatus::Running);
        assert!(run.started_at().is_some());

        assert!(run.finish(outcome()).is_none());
        assert_eq!(run.status(), RunStatus::Completed);
        assert!(run.ended_at().is_some());
        assert_eq!(run.best().map(|r| r.index), Some(2));
        assert_eq!(run.best_objective(), Some(0.1));
        assert_eq!(run.best_breakdown(), vec![(ProblemKind::Rank, 0.1)]);

        let best = run.best_configuration().unwrap();
        assert_eq!(best.get("n_epochs"), Some(&ParameterValue::Int(5)));
        assert_eq!(best.get("learning_rate"), Some(&ParameterValue::Float(0.1)));
    }

    #[test]
    fn test_best_is_log_position_not_candidate_index() {
        let mut run = TuningRun::new("run-1", context());
        run.finish(SearchOutcome {
            state: SearchState::Completed,
            records: vec![record(0, Some(0.5)), record(0, Some(0.1))],
            best: Some(1),
            fatal: None,
        });
        assert_eq!(run.best_objective(), Some(0.1));
    }

    #[test]
    fn test_finish_hands_back_fatal_error() {
        let mut run = TuningRun::new("run-1", context());
        run.start();
        let fatal = run.finish(SearchOutcome {
            state: SearchState::Failed,
            records: vec![record(0, None)],
            best: None,
            fatal: Some(Error::Other("all 1 candidates failed".into())),
        });
        assert!(fatal.is_some());
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.error(), Some("all 1 candidates failed"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tuning_run.json");
        let mut run = TuningRun::new("run-1", context());
        run.start();
        run.finish(outcome());
        run.save(&path).unwrap();

        let loaded = TuningRun::load(&path).unwrap();
        assert_eq!(loaded, run);
    }

    #[test]
    fn test_load_rejects_dangling_best_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning_run.json");
        let mut run = TuningRun::new("run-1", context());
        run.finish(SearchOutcome {
            state: SearchState::Completed,
            records: vec![record(0, Some(0.2))],
            best: Some(9),
            fatal: None,
        });
        run.save(&path).unwrap();
        assert!(matches!(TuningRun::load(&path), Err(Error::InternalConsistency(_))));
    }
}
