//! Hyperparameter search engine
//!
//! ```text
//! Idle ──run()──▶ Running ──┬─▶ Completed   source exhausted or max_candidates reached
//!                           ├─▶ Cancelled   token cancelled or time budget spent
//!                           └─▶ Failed      fatal error, or every candidate failed
//! ```
//!
//! Candidates are pulled from a [`CandidateSource`] in index order,
//! de-duplicated by fingerprint and evaluated in batches of `parallelism`.
//! A candidate whose evaluation fails is recorded and skipped; only
//! [fatal](crate::Error::is_fatal) errors stop the search.
//!
//! The best pointer is the position of a record in the candidate log. It is
//! replaced only by a strictly lower objective, so ties keep the earlier
//! record. Workers only evaluate; results are consumed in candidate order on
//! the calling thread, which alone records them and updates the pointer.
//! The first fatal result of a batch discards every later one. Parallel and
//! sequential runs therefore produce the same log and the same best record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::evaluate::{aggregate_objective, evaluate, EvaluationResult};
use crate::model::build_predictor;
use crate::objective::Objective;
use crate::problem::ProblemKind;
use crate::record::Corpus;
use crate::space::{CandidateSource, Configuration};
use crate::{Error, Result};

/// Search engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    /// Not started
    Idle,
    /// Evaluating candidates
    Running,
    /// Every candidate (within budget) was evaluated
    Completed,
    /// A fatal error occurred, or no candidate succeeded
    Failed,
    /// Stopped early by the token or the time budget
    Cancelled,
}

impl SearchState {
    /// Whether the search has finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create an uncancelled token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the engine stops before its next candidate.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Early-termination limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchBudget {
    /// Maximum number of candidate records, resumed ones included
    pub max_candidates: Option<usize>,
    /// Wall-clock limit for this run
    pub time_budget: Option<Duration>,
}

/// Outcome of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Trained and evaluated
    Succeeded,
    /// Recorded failure, excluded from best selection
    Failed,
}

/// One evaluated configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Position of the configuration in its candidate source
    pub index: usize,
    /// Sampled hyperparameters (without fixed values)
    pub configuration: Configuration,
    /// Content fingerprint used for de-duplication
    pub fingerprint: String,
    /// Outcome
    pub status: CandidateStatus,
    /// Mean of the per-formulation objectives, for successful candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<f64>,
    /// One result per requested formulation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<EvaluationResult>,
    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Training plus evaluation time
    pub duration_ms: u64,
    /// When the candidate finished
    pub finished_at: DateTime<Utc>,
}

impl CandidateRecord {
    /// Whether the candidate produced a usable objective.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == CandidateStatus::Succeeded && self.objective.is_some()
    }
}

/// Trains and scores one configuration.
pub trait CandidateEvaluator: Sync {
    /// Evaluate `configuration`, one result per formulation.
    ///
    /// # Errors
    ///
    /// Any error; fatal ones abort the search, the rest fail the candidate.
    fn evaluate(&self, index: usize, configuration: &Configuration) -> Result<Vec<EvaluationResult>>;
}

/// Evaluator that fits a fresh registry model per candidate.
#[derive(Debug, Clone)]
pub struct ModelEvaluator<'a> {
    /// Registry model name
    pub model: String,
    /// Hyperparameters shared by every candidate; candidate values win
    pub fixed: Configuration,
    /// Model seed
    pub seed: u64,
    /// Preprocessed training split
    pub train: &'a Corpus,
    /// Preprocessed validation split
    pub validation: &'a Corpus,
    /// Formulations to score
    pub problems: Vec<ProblemKind>,
    /// Objective to minimize
    pub objective: Objective,
    /// Regret `k`
    pub k: usize,
}

impl CandidateEvaluator for ModelEvaluator<'_> {
    fn evaluate(&self, _index: usize, configuration: &Configuration) -> Result<Vec<EvaluationResult>> {
        let merged = configuration.merged_over(&self.fixed);
        let mut predictor = build_predictor(&self.model, &merged, self.seed)?;
        predictor.fit(self.train)?;
        evaluate(
            predictor.as_ref(),
            self.validation,
            &self.problems,
            self.objective,
            self.k,
        )
    }
}

/// Best record so far: `(objective, log position)`.
#[derive(Debug, Default)]
struct BestTracker(Option<(f64, usize)>);

impl BestTracker {
    /// Offer the record at `position`; only a strictly lower objective wins.
    fn offer(&mut self, record: &CandidateRecord, position: usize) {
        let Some(objective) = record.objective.filter(|_| record.succeeded()) else {
            return;
        };
        if self.0.map_or(true, |(value, _)| objective < value) {
            self.0 = Some((objective, position));
        }
    }

    fn position(&self) -> Option<usize> {
        self.0.map(|(_, position)| position)
    }
}

/// Everything a finished search produced.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Terminal state
    pub state: SearchState,
    /// Candidate log, resumed records first, then in evaluation order
    pub records: Vec<CandidateRecord>,
    /// Position in `records` of the best successful record
    pub best: Option<usize>,
    /// The fatal error that ended a `Failed` search
    pub fatal: Option<Error>,
}

impl SearchOutcome {
    /// The best record, if any candidate succeeded.
    #[must_use]
    pub fn best_record(&self) -> Option<&CandidateRecord> {
        self.records.get(self.best?).filter(|r| r.succeeded())
    }
}

/// Drives candidates from a source through an evaluator.
#[derive(Debug)]
pub struct SearchEngine {
    source: CandidateSource,
    budget: SearchBudget,
    parallelism: usize,
    token: CancellationToken,
    history: Vec<CandidateRecord>,
    state: SearchState,
}

type Evaluated = (usize, Configuration, Result<Vec<EvaluationResult>>, Duration);

impl SearchEngine {
    /// Create an idle engine over a candidate source.
    #[must_use]
    pub fn new(source: CandidateSource) -> Self {
        Self {
            source,
            budget: SearchBudget::default(),
            parallelism: 1,
            token: CancellationToken::new(),
            history: Vec::new(),
            state: SearchState::Idle,
        }
    }

    /// Set early-termination limits.
    #[must_use]
    pub const fn with_budget(mut self, budget: SearchBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Evaluate up to `parallelism` candidates at once (at least 1).
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Share a cancellation token with the caller.
    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Seed the engine with records of a previous run.
    ///
    /// Their fingerprints are never evaluated again and the best pointer is
    /// recomputed from them. The caller guarantees the records were produced
    /// by the same evaluator and candidate source.
    #[must_use]
    pub fn with_history(mut self, history: Vec<CandidateRecord>) -> Self {
        self.history = history;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SearchState {
        self.state
    }

    /// Run the search to a terminal state.
    ///
    /// `on_record` sees every new record as soon as it is final, in candidate
    /// order; an error from it is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InternalConsistency`] if the engine is not idle. All
    /// other problems are reported through [`SearchOutcome`].
    pub fn run<F>(&mut self, evaluator: &dyn CandidateEvaluator, mut on_record: F) -> Result<SearchOutcome>
    where
        F: FnMut(&CandidateRecord) -> Result<()>,
    {
        if self.state != SearchState::Idle {
            return Err(Error::InternalConsistency(format!(
                "search engine started in state {:?}",
                self.state
            )));
        }
        self.state = SearchState::Running;
        let started = Instant::now();

        let mut best = BestTracker::default();
        let mut records = std::mem::take(&mut self.history);
        let mut seen: FxHashSet<String> = FxHashSet::default();
        for (position, record) in records.iter().enumerate() {
            seen.insert(record.fingerprint.clone());
            best.offer(record, position);
        }
        if !records.is_empty() {
            info!(resumed = records.len(), "resuming search from history");
        }

        let mut pending = self.source.iter_from(0);
        let mut fatal: Option<Error> = None;
        let mut terminal = SearchState::Completed;

        loop {
            if self.token.is_cancelled() {
                info!("search cancelled");
                terminal = SearchState::Cancelled;
                break;
            }
            if self.budget.time_budget.is_some_and(|limit| started.elapsed() >= limit) {
                info!(elapsed_ms = started.elapsed().as_millis(), "time budget spent");
                terminal = SearchState::Cancelled;
                break;
            }
            let room = self
                .budget
                .max_candidates
                .map_or(usize::MAX, |max| max.saturating_sub(records.len()));
            if room == 0 {
                info!(max_candidates = records.len(), "candidate budget reached");
                break;
            }

            let mut batch = Vec::with_capacity(self.parallelism.min(room));
            while batch.len() < self.parallelism.min(room) {
                let Some((index, configuration)) = pending.next() else {
                    break;
                };
                if seen.insert(configuration.fingerprint()) {
                    batch.push((index, configuration));
                } else {
                    debug!(index, "skipping duplicate candidate");
                }
            }
            if batch.is_empty() {
                break;
            }

            for (index, configuration, outcome, elapsed) in self.evaluate_batch(evaluator, batch) {
                let record = match outcome {
                    Ok(results) => match aggregate_objective(&results).filter(|v| v.is_finite()) {
                        Some(objective) => {
                            info!(index, objective, "candidate evaluated");
                            finished(
                                index,
                                configuration,
                                CandidateStatus::Succeeded,
                                Some(objective),
                                results,
                                None,
                                elapsed,
                            )
                        }
                        None => {
                            let failure = Error::CandidateFailure {
                                candidate: index,
                                reason: "no finite objective".to_string(),
                            };
                            warn!(index, error = %failure, "candidate failed");
                            failed(index, configuration, &failure, elapsed)
                        }
                    },
                    Err(err) if err.is_fatal() => {
                        warn!(index, error = %err, "fatal error, stopping search");
                        fatal = Some(err);
                        break;
                    }
                    Err(err) => {
                        let failure = Error::CandidateFailure {
                            candidate: index,
                            reason: err.to_string(),
                        };
                        warn!(index, error = %failure, "candidate failed");
                        failed(index, configuration, &failure, elapsed)
                    }
                };

                best.offer(&record, records.len());
                let streamed = on_record(&record);
                records.push(record);
                if let Err(err) = streamed {
                    fatal = Some(err);
                    break;
                }
            }

            if fatal.is_some() {
                terminal = SearchState::Failed;
                break;
            }
        }

        let best_position = best.position();
        if terminal == SearchState::Completed && best_position.is_none() {
            terminal = SearchState::Failed;
            let reason = if records.is_empty() {
                "no candidate was evaluated".to_string()
            } else {
                format!("all {} candidates failed", records.len())
            };
            warn!(%reason, "search failed");
            fatal = Some(Error::Other(reason));
        }

        self.state = terminal;
        info!(
            state = ?terminal,
            candidates = records.len(),
            best = ?best_position,
            elapsed_ms = started.elapsed().as_millis(),
            "search finished"
        );

        Ok(SearchOutcome {
            state: terminal,
            records,
            best: best_position,
            fatal,
        })
    }

    /// Evaluate a batch; results come back in batch order.
    fn evaluate_batch(&self, evaluator: &dyn CandidateEvaluator, batch: Vec<(usize, Configuration)>) -> Vec<Evaluated> {
        let run_one = |(index, configuration): (usize, Configuration)| -> Evaluated {
            let span = info_span!("candidate", index);
            let _guard = span.enter();
            let started = Instant::now();
            let outcome = evaluator.evaluate(index, &configuration);
            (index, configuration, outcome, started.elapsed())
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            if batch.len() > 1 {
                match rayon::ThreadPoolBuilder::new().num_threads(batch.len()).build() {
                    Ok(pool) => return pool.install(|| batch.into_par_iter().map(run_one).collect()),
                    Err(err) => warn!(error = %err, "thread pool unavailable, evaluating sequentially"),
                }
            }
        }

        batch.into_iter().map(run_one).collect()
    }
}

fn failed(index: usize, configuration: Configuration, failure: &Error, elapsed: Duration) -> CandidateRecord {
    finished(
        index,
        configuration,
        CandidateStatus::Failed,
        None,
        Vec::new(),
        Some(failure.to_string()),
        elapsed,
    )
}

#[allow(clippy::too_many_arguments)]
fn finished(
    index: usize,
    configuration: Configuration,
    status: CandidateStatus,
    objective: Option<f64>,
    results: Vec<EvaluationResult>,
    error: Option<String>,
    elapsed: Duration,
) -> CandidateRecord {
    CandidateRecord {
        index,
        fingerprint: configuration.fingerprint(),
        configuration,
        status,
        objective,
        results,
        error,
        duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        finished_at: Utc::now(),
    }
}
