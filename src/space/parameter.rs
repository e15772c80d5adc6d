//! Parameter value and domain types

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A single hyperparameter value.
///
/// Untagged in JSON: `3` is an `Int`, `0.5` a `Float`, `true` a `Bool`,
/// `"relu"` a `Categorical`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Integer value
    Int(i64),
    /// Real value
    Float(f64),
    /// Boolean flag
    Bool(bool),
    /// Named choice
    Categorical(String),
}

impl ParameterValue {
    /// Get as float (converts int to float if needed)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Bool(_) | Self::Categorical(_) => None,
        }
    }

    /// Get as int. Floats only convert when integral.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as bool
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Categorical(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    /// Canonical text form, also used for configuration fingerprints.
    ///
    /// Floats use Rust's shortest round-trip representation, so two values
    /// print the same exactly when they are bit-identical (modulo `-0.0`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Categorical(s) => write!(f, "{s:?}"),
        }
    }
}

/// Parameter domain (search space)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterDomain {
    /// Continuous range [low, high], optionally log-scaled
    Continuous {
        /// Lower bound
        low: f64,
        /// Upper bound
        high: f64,
        /// Sample / grid in log space
        #[serde(default)]
        log_scale: bool,
    },
    /// Discrete integer range [low, high]
    Discrete {
        /// Lower bound
        low: i64,
        /// Upper bound (inclusive)
        high: i64,
    },
    /// Categorical choices
    Categorical {
        /// Allowed values
        choices: Vec<String>,
    },
    /// Explicit list of values, used as-is by grid search
    Values {
        /// Allowed values
        values: Vec<ParameterValue>,
    },
}

impl ParameterDomain {
    /// Check the domain is non-empty and well-formed.
    ///
    /// Returns a human-readable reason when it is not.
    #[must_use]
    pub fn problem(&self) -> Option<String> {
        match self {
            Self::Continuous { low, high, log_scale } => {
                if !low.is_finite() || !high.is_finite() || low > high {
                    Some(format!("invalid range [{low}, {high}]"))
                } else if *log_scale && *low <= 0.0 {
                    Some(format!("log-scaled range must be positive, got low={low}"))
                } else {
                    None
                }
            }
            Self::Discrete { low, high } => {
                (low > high).then(|| format!("invalid range [{low}, {high}]"))
            }
            Self::Categorical { choices } => choices.is_empty().then(|| "no choices".to_string()),
            Self::Values { values } => values.is_empty().then(|| "no values".to_string()),
        }
    }

    /// Grid values for this domain; continuous domains get `n_points` points.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn grid_values(&self, n_points: usize) -> Vec<ParameterValue> {
        match self {
            Self::Continuous { low, high, log_scale } => {
                if n_points < 2 || low == high {
                    return vec![ParameterValue::Float(*low)];
                }
                let divisor = (n_points - 1) as f64;
                let (a, b) = if *log_scale {
                    (low.ln(), high.ln())
                } else {
                    (*low, *high)
                };
                (0..n_points)
                    .map(|i| {
                        let t = i as f64 / divisor;
                        let v = a + t * (b - a);
                        ParameterValue::Float(if *log_scale { v.exp() } else { v })
                    })
                    .collect()
            }
            Self::Discrete { low, high } => (*low..=*high).map(ParameterValue::Int).collect(),
            Self::Categorical { choices } => choices
                .iter()
                .map(|c| ParameterValue::Categorical(c.clone()))
                .collect(),
            Self::Values { values } => values.clone(),
        }
    }

    /// Sample a random value from this domain
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ParameterValue {
        match self {
            Self::Continuous { low, high, log_scale } => {
                if low == high {
                    return ParameterValue::Float(*low);
                }
                let value = if *log_scale {
                    // exp(ln x) may round just outside the bounds
                    rng.gen_range(low.ln()..high.ln()).exp().clamp(*low, *high)
                } else {
                    rng.gen_range(*low..*high)
                };
                ParameterValue::Float(value)
            }
            Self::Discrete { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
            Self::Categorical { choices } => {
                ParameterValue::Categorical(choices[rng.gen_range(0..choices.len())].clone())
            }
            Self::Values { values } => values[rng.gen_range(0..values.len())].clone(),
        }
    }
}
