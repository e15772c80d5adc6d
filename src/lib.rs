//! # Trueno-Tune: Deterministic Meta-Learning Tuner
//!
//! **Version**: 0.1.0
//!
//! Trueno-Tune searches the hyperparameters of models that predict how well
//! ML pipelines perform on a dataset from the dataset's metafeatures. Every
//! candidate is scored by top-k regret on a seeded validation split, so two
//! runs with the same seeds produce the same best configuration.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke safety**: Parameters are validated before any model trains
//! - **Jidoka**: Defects (negative regret) stop the line; bad candidates do not
//! - **Genchi Genbutsu**: Datasets are split whole, never by record
//! - **Heijunka**: Parallel and sequential search pick the same best candidate
//!
//! ## Example Usage
//!
//! ```rust
//! use trueno_tune::problem::{adapt, ProblemKind};
//! use trueno_tune::record::{Corpus, Metafeatures, PerformanceRecord};
//! use trueno_tune::regret::regret;
//!
//! let records = [("A", 0.9), ("B", 0.8), ("C", 0.5)]
//!     .map(|(p, s)| PerformanceRecord::new("D", p, Metafeatures::new(), s));
//! let corpus = Corpus::from_records(records)?;
//! let group = corpus.get("D").unwrap();
//!
//! // The model ranks C, A, B
//! let predicted = vec![("A".to_string(), 0.6), ("B".to_string(), 0.1), ("C".to_string(), 0.9)];
//! let selection = adapt(ProblemKind::Rank, "D", &predicted, 2)?;
//! assert!((regret(group, &selection, 2)? - 0.3).abs() < 1e-12);
//! # Ok::<(), trueno_tune::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod evaluate;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod objective;
pub mod preprocess;
pub mod problem;
pub mod record;
pub mod regret;
pub mod run;
pub mod search;
pub mod space;
pub mod split;
pub mod topk;

pub use error::{Error, Result};
