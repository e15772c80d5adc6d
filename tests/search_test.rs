//! Search engine behaviour through the public API

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use trueno_tune::evaluate::EvaluationResult;
use trueno_tune::objective::Objective;
use trueno_tune::problem::ProblemKind;
use trueno_tune::search::{
    CandidateEvaluator, CandidateStatus, SearchBudget, SearchEngine, SearchState,
};
use trueno_tune::space::{CandidateSource, Configuration, ParameterValue};
use trueno_tune::{Error, Result};

/// Objective is the `loss` parameter; `fail` makes the candidate diverge,
/// `defect` raises an internal consistency error.
#[derive(Default)]
struct Scripted {
    calls: AtomicUsize,
}

impl CandidateEvaluator for Scripted {
    fn evaluate(&self, _index: usize, configuration: &Configuration) -> Result<Vec<EvaluationResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if configuration.bool_or("defect", false)? {
            return Err(Error::InternalConsistency("regret below zero".to_string()));
        }
        if configuration.bool_or("fail", false)? {
            return Err(Error::Training("diverged at epoch 1".to_string()));
        }
        let loss = configuration.float_or("loss", 1.0)?;
        Ok(vec![EvaluationResult {
            problem: ProblemKind::Rank,
            objective: Objective::TopKRegret,
            k: 3,
            value: loss,
            per_dataset: Vec::new(),
            excluded: Vec::new(),
            metrics: BTreeMap::new(),
        }])
    }
}

fn candidate(loss: f64) -> Configuration {
    Configuration::new().with("loss", ParameterValue::Float(loss))
}

fn failing() -> Configuration {
    Configuration::new().with("fail", ParameterValue::Bool(true))
}

#[test]
fn test_three_candidates_one_fails() {
    let source = CandidateSource::explicit(vec![candidate(0.4), failing(), candidate(0.2)]);
    let mut engine = SearchEngine::new(source);
    let mut streamed = Vec::new();

    let outcome = engine
        .run(&Scripted::default(), |record| {
            streamed.push(record.index);
            Ok(())
        })
        .unwrap();

    assert_eq!(outcome.state, SearchState::Completed);
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(streamed, vec![0, 1, 2]);

    let failed = &outcome.records[1];
    assert_eq!(failed.status, CandidateStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("diverged"));
    assert!(failed.objective.is_none());

    let best = outcome.best_record().unwrap();
    assert_eq!(best.index, 2);
    assert_eq!(best.objective, Some(0.2));
}

#[test]
fn test_every_candidate_failing_fails_the_search() {
    let source = CandidateSource::explicit(vec![
        failing(),
        failing().with("seed", ParameterValue::Int(1)),
    ]);
    let outcome = SearchEngine::new(source)
        .run(&Scripted::default(), |_| Ok(()))
        .unwrap();

    assert_eq!(outcome.state, SearchState::Failed);
    assert_eq!(outcome.records.len(), 2);
    assert!(outcome.best.is_none());
    assert!(outcome.fatal.is_some());
}

#[test]
fn test_parallel_matches_sequential() {
    let losses = [0.5, 0.3, 0.3, 0.9, 0.1, 0.1, 0.7];
    let source = || {
        CandidateSource::explicit(
            losses
                .iter()
                .enumerate()
                .map(|(i, loss)| candidate(*loss).with("id", ParameterValue::Int(i as i64)))
                .collect(),
        )
    };

    let sequential = SearchEngine::new(source())
        .run(&Scripted::default(), |_| Ok(()))
        .unwrap();
    let parallel = SearchEngine::new(source())
        .with_parallelism(4)
        .run(&Scripted::default(), |_| Ok(()))
        .unwrap();

    assert_eq!(sequential.best, Some(4));
    assert_eq!(parallel.best, sequential.best);
    let indices = |records: &[trueno_tune::search::CandidateRecord]| {
        records.iter().map(|r| r.index).collect::<Vec<_>>()
    };
    assert_eq!(indices(&parallel.records), indices(&sequential.records));

    // a defect mid-batch: nothing after it is recorded or considered
    let with_defect = || {
        CandidateSource::explicit(vec![
            candidate(0.1),
            candidate(99.0).with("defect", ParameterValue::Bool(true)),
            candidate(0.0),
        ])
    };
    let sequential = SearchEngine::new(with_defect())
        .run(&Scripted::default(), |_| Ok(()))
        .unwrap();
    let parallel = SearchEngine::new(with_defect())
        .with_parallelism(3)
        .run(&Scripted::default(), |_| Ok(()))
        .unwrap();
    for outcome in [&sequential, &parallel] {
        assert_eq!(outcome.state, SearchState::Failed);
        assert_eq!(indices(&outcome.records), vec![0]);
        assert_eq!(outcome.best, Some(0));
        assert!(matches!(outcome.fatal, Some(Error::InternalConsistency(_))));
    }
}

#[test]
fn test_candidate_budget_stops_early() {
    let source = CandidateSource::explicit((0..10).map(|i| candidate(f64::from(i))).collect());
    let evaluator = Scripted::default();
    let outcome = SearchEngine::new(source)
        .with_budget(SearchBudget {
            max_candidates: Some(3),
            time_budget: None,
        })
        .run(&evaluator, |_| Ok(()))
        .unwrap();

    assert_eq!(outcome.state, SearchState::Completed);
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(evaluator.calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.best, Some(0));
}

#[test]
fn test_resumed_records_with_repeated_indices_keep_best_unambiguous() {
    let first = SearchEngine::new(CandidateSource::explicit(vec![candidate(0.5)]))
        .run(&Scripted::default(), |_| Ok(()))
        .unwrap();

    let resumed = SearchEngine::new(CandidateSource::explicit(vec![candidate(0.1)]))
        .with_history(first.records)
        .run(&Scripted::default(), |_| Ok(()))
        .unwrap();

    assert_eq!(resumed.records[0].index, resumed.records[1].index);
    assert_eq!(resumed.best_record().unwrap().objective, Some(0.1));
}

#[test]
fn test_resumed_history_is_not_reevaluated() {
    let configs = vec![candidate(0.6), candidate(0.2), candidate(0.4)];

    let first = SearchEngine::new(CandidateSource::explicit(configs.clone()))
        .with_budget(SearchBudget {
            max_candidates: Some(2),
            time_budget: None,
        })
        .run(&Scripted::default(), |_| Ok(()))
        .unwrap();
    assert_eq!(first.records.len(), 2);

    let evaluator = Scripted::default();
    let resumed = SearchEngine::new(CandidateSource::explicit(configs))
        .with_history(first.records)
        .run(&evaluator, |_| Ok(()))
        .unwrap();

    assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(resumed.records.len(), 3);
    assert_eq!(resumed.best, Some(1));
}
