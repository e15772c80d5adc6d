//! Tuning coordinator
//!
//! Wires the pieces of a tuning run together:
//!
//! ```text
//! validate ─▶ partition ─▶ preprocess ─▶ search ─▶ persist
//!                                          │
//!                                          └─ history.jsonl (one line per candidate)
//! ```
//!
//! Every parameter is checked before the first model is trained, so a typo
//! in `k` or the model name costs nothing.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, info_span};

use crate::config::{ModelConfig, TuningConfig};
use crate::loader::write_records;
use crate::preprocess::Preprocessor;
use crate::record::Corpus;
use crate::run::{HistoryHeader, HistoryLog, RunContext, RunStatus, TuningRun};
use crate::search::{CancellationToken, ModelEvaluator, SearchEngine};
use crate::split::{split, Splits};
use crate::{loader, Error, Result};

/// File name of the persisted run inside the output directory.
pub const RUN_FILE: &str = "tuning_run.json";

/// Everything needed to start a tuning run.
#[derive(Debug, Clone)]
pub struct TuneRequest {
    /// Run parameters
    pub context: RunContext,
    /// Fixed hyperparameters and search space
    pub model_config: ModelConfig,
    /// Strategy and budget
    pub tuning_config: TuningConfig,
    /// Directory for the candidate history log
    pub tuning_output_dir: PathBuf,
    /// Directory for [`RUN_FILE`]
    pub output_dir: PathBuf,
    /// Continue from an existing history log instead of starting over
    pub resume: bool,
}

/// Runs one tuning request end to end.
#[derive(Debug)]
pub struct Coordinator {
    request: TuneRequest,
    token: CancellationToken,
}

impl Coordinator {
    /// Create a coordinator for a request.
    #[must_use]
    pub fn new(request: TuneRequest) -> Self {
        Self {
            request,
            token: CancellationToken::new(),
        }
    }

    /// Share a cancellation token, e.g. with a signal handler.
    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Run the search over `corpus` and persist the result.
    ///
    /// The run is written to `<output_dir>/tuning_run.json` whatever its
    /// final status, then failures are reported.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] for invalid parameters, before any training,
    ///   or when resuming a history written under another context or source
    /// - [`Error::InvalidSize`] if a split does not fit the corpus
    /// - the fatal error of a `Failed` search, or an error for a search
    ///   cancelled before any candidate succeeded
    pub fn run(&self, corpus: &Corpus) -> Result<TuningRun> {
        let request = &self.request;
        let ctx = &request.context;
        ctx.validate()?;
        request.tuning_config.validate()?;
        let source = request
            .tuning_config
            .candidate_source(&request.model_config)?;
        let budget = request.tuning_config.budget()?;
        let header = HistoryHeader {
            context: ctx.clone(),
            source: request.tuning_config.source_key(&request.model_config)?,
        };

        let splits = Splits::partition(corpus, ctx.test, ctx.validation)?;
        let preprocessor = Preprocessor::fit(&splits.train, ctx.metafeature_subset)?;
        let train = preprocessor.transform(&splits.train);
        let validation = preprocessor.transform(&splits.validation);
        info!(
            train = train.len(),
            validation = validation.len(),
            test = splits.test.as_ref().map_or(0, Corpus::len),
            features = preprocessor.feature_names().count(),
            dropped = preprocessor.dropped().len(),
            "partitioned corpus"
        );

        if !validation.groups().any(|group| group.len() >= ctx.k) {
            return Err(Error::config(
                "k",
                format!(
                    "no validation dataset has at least k={} pipelines",
                    ctx.k
                ),
            ));
        }

        let history = HistoryLog::in_dir(&request.tuning_output_dir);
        let resumed = if request.resume {
            history.resume(&header)?
        } else {
            history.start(&header)?;
            Vec::new()
        };

        let mut engine = SearchEngine::new(source)
            .with_budget(budget)
            .with_parallelism(request.tuning_config.parallelism)
            .with_token(self.token.clone())
            .with_history(resumed);
        let evaluator = ModelEvaluator {
            model: ctx.model.clone(),
            fixed: request.model_config.fixed.clone(),
            seed: ctx.model_seed,
            train: &train,
            validation: &validation,
            problems: ctx.problems.clone(),
            objective: ctx.objective,
            k: ctx.k,
        };

        let run_id = format!("{}-{}", ctx.model, Utc::now().format("%Y%m%dT%H%M%S%.3f"));
        let span = info_span!("tune", run_id = %run_id);
        let _guard = span.enter();

        let mut run = TuningRun::new(run_id, ctx.clone()).with_fixed(request.model_config.fixed.clone());
        run.start();
        let outcome = engine.run(&evaluator, |record| history.append(record))?;
        let fatal = run.finish(outcome);

        let path = request.output_dir.join(RUN_FILE);
        run.save(&path)?;
        info!(
            path = %path.display(),
            status = ?run.status(),
            candidates = run.candidates().len(),
            best_objective = ?run.best_objective(),
            "saved tuning run"
        );

        if let Some(err) = fatal {
            return Err(err);
        }
        if run.status() == RunStatus::Cancelled && run.best().is_none() {
            return Err(Error::Other(
                "search was cancelled before any candidate succeeded".to_string(),
            ));
        }
        Ok(run)
    }
}

/// Split a record file into `<stem>_train.json` and `<stem>_test.json`.
///
/// The files are written next to the input unless `output_dir` is given.
/// Returns the `(train, test)` paths.
///
/// # Errors
///
/// Returns an error if the input cannot be loaded, `test_size` does not fit
/// the number of datasets, or an output file cannot be written.
pub fn split_data(
    data_path: &Path,
    test_size: usize,
    seed: u64,
    output_dir: Option<&Path>,
) -> Result<(PathBuf, PathBuf)> {
    let corpus = loader::load_corpus(data_path)?;
    let (train, test) = split(&corpus, test_size, seed)?;

    let stem = data_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::config("data_path", format!("{} has no file name", data_path.display())))?;
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| data_path.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    let train_path = dir.join(format!("{stem}_train.json"));
    let test_path = dir.join(format!("{stem}_test.json"));
    write_records(&train_path, &train)?;
    write_records(&test_path, &test)?;
    info!(
        train = %train_path.display(),
        test = %test_path.display(),
        train_datasets = train.len(),
        test_datasets = test.len(),
        "wrote split"
    );
    Ok((train_path, test_path))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::Strategy;
    use crate::model::tests::training_corpus;
    use crate::problem::ProblemKind;
    use crate::space::{Configuration, ParameterValue};
    use crate::split::SplitSpec;

    fn request(dir: &TempDir, context: RunContext) -> TuneRequest {
        TuneRequest {
            context,
            model_config: ModelConfig::default(),
            tuning_config: TuningConfig {
                strategy: Strategy::Explicit,
                candidates: vec![Configuration::new()],
                ..TuningConfig::default()
            },
            tuning_output_dir: dir.path().join("tuning"),
            output_dir: dir.path().join("out"),
            resume: false,
        }
    }

    fn context() -> RunContext {
        RunContext::new("per_pipeline_regression", vec![ProblemKind::Rank], 2, SplitSpec::new(3, 11))
    }

    #[test]
    fn test_run_persists_best() {
        let dir = TempDir::new().unwrap();
        let run = Coordinator::new(request(&dir, context()))
            .run(&training_corpus())
            .unwrap();

        assert_eq!(run.status(), RunStatus::Completed);
        assert_eq!(run.candidates().len(), 1);
        assert!(run.best_objective().is_some());
        assert!(dir.path().join("out").join(RUN_FILE).exists());
        assert!(dir.path().join("tuning").join("history.jsonl").exists());
    }

    #[test]
    fn test_invalid_k_fails_before_training() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context();
        ctx.k = 0;
        let err = Coordinator::new(request(&dir, ctx))
            .run(&training_corpus())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { ref parameter, .. } if parameter == "k"));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_k_larger_than_every_dataset() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context();
        ctx.k = 4;
        let err = Coordinator::new(request(&dir, ctx))
            .run(&training_corpus())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { ref parameter, .. } if parameter == "k"));
    }

    #[test]
    fn test_validation_split_too_large() {
        let dir = TempDir::new().unwrap();
        let ctx = RunContext::new("random", vec![ProblemKind::Subset], 1, SplitSpec::new(8, 0));
        let err = Coordinator::new(request(&dir, ctx))
            .run(&training_corpus())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSize { size: 8, available: 8 }));
    }

    #[test]
    fn test_all_candidates_failing_is_error_but_persisted() {
        let dir = TempDir::new().unwrap();
        let mut req = request(&dir, RunContext::new("linear_regression", vec![ProblemKind::Rank], 2, SplitSpec::new(3, 11)));
        req.tuning_config.candidates = vec![
            Configuration::new().with("learning_rate", ParameterValue::Float(-1.0)),
            Configuration::new().with("n_epochs", ParameterValue::Int(0)),
        ];
        assert!(Coordinator::new(req).run(&training_corpus()).is_err());

        let saved = TuningRun::load(&dir.path().join("out").join(RUN_FILE)).unwrap();
        assert_eq!(saved.status(), RunStatus::Failed);
        assert_eq!(saved.candidates().len(), 2);
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = Coordinator::new(request(&dir, context()))
            .with_token(token)
            .run(&training_corpus());
        assert!(result.is_err());
    }

    #[test]
    fn test_split_data_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("records.json");
        write_records(&input, &training_corpus()).unwrap();

        let (train, test) = split_data(&input, 2, 5, None).unwrap();
        assert_eq!(train, dir.path().join("records_train.json"));
        assert_eq!(test, dir.path().join("records_test.json"));
        assert_eq!(loader::load_corpus(&train).unwrap().len(), 6);
        assert_eq!(loader::load_corpus(&test).unwrap().len(), 2);
    }
}
