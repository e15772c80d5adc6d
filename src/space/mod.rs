//! Hyperparameter search space
//!
//! - [`ParameterDomain`] / [`ParameterValue`]: one parameter's range and value
//! - [`SearchSpace`]: named domains, read from the model config file
//! - [`Configuration`]: one immutable assignment, compared by fingerprint
//! - [`CandidateSource`]: lazy grid, seeded random or explicit candidates

mod configuration;
mod parameter;
mod source;

pub use configuration::{Configuration, SearchSpace};
pub use parameter::{ParameterDomain, ParameterValue};
pub use source::CandidateSource;
