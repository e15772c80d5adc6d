//! Search objectives

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Scalar minimized by the search, always a mean regret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Regret of the model's top-k against the oracle top-k
    TopKRegret,
    /// Regret of the model's single best pick
    #[serde(rename = "top_1_regret")]
    Top1Regret,
}

impl Objective {
    /// Every objective, in canonical order.
    pub const ALL: [Self; 2] = [Self::TopKRegret, Self::Top1Regret];

    /// CLI / JSON name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TopKRegret => "top_k_regret",
            Self::Top1Regret => "top_1_regret",
        }
    }

    /// The `k` regret is measured at for a requested `k`.
    #[must_use]
    pub const fn effective_k(self, k: usize) -> usize {
        match self {
            Self::TopKRegret => k,
            Self::Top1Regret => 1,
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Objective {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|objective| objective.as_str() == s)
            .ok_or_else(|| {
                Error::config(
                    "objective",
                    format!("unknown objective `{s}` (expected top_k_regret or top_1_regret)"),
                )
            })
    }
}
