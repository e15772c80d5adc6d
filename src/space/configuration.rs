//! Hyperparameter configurations

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::parameter::{ParameterDomain, ParameterValue};
use crate::{Error, Result};

/// Hyperparameter search space, ordered by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    params: BTreeMap<String, ParameterDomain>,
}

impl SearchSpace {
    /// Create an empty search space
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(&mut self, name: impl Into<String>, domain: ParameterDomain) {
        self.params.insert(name.into(), domain);
    }

    /// Builder-style [`add`](Self::add).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, domain: ParameterDomain) -> Self {
        self.add(name, domain);
        self
    }

    /// Get a parameter domain
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterDomain> {
        self.params.get(name)
    }

    /// Check if space is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Get number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Iterate over parameters in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterDomain)> {
        self.params.iter()
    }

    /// Reject empty or malformed domains.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first bad parameter.
    pub fn validate(&self) -> Result<()> {
        for (name, domain) in &self.params {
            if let Some(problem) = domain.problem() {
                return Err(Error::config(name, problem));
            }
        }
        Ok(())
    }
}

/// One immutable hyperparameter assignment.
///
/// Equality and hashing go through [`fingerprint`](Self::fingerprint), so two
/// configurations with the same content are the same candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: BTreeMap<String, ParameterValue>,
}

impl Configuration {
    /// Create an empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Get a raw value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Iterate over values in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.values.iter()
    }

    /// Number of assigned parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no parameter is assigned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `self` layered over `base`: keys present in both take `self`'s value.
    #[must_use]
    pub fn merged_over(&self, base: &Self) -> Self {
        let mut values = base.values.clone();
        values.extend(self.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { values }
    }

    /// Canonical content key, e.g. `hidden=64;lr=0.01;act="relu"` in name order.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Float parameter, or `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the value is not numeric.
    pub fn float_or(&self, name: &str, default: f64) -> Result<f64> {
        self.values.get(name).map_or(Ok(default), |value| {
            value
                .as_float()
                .ok_or_else(|| wrong_type(name, "a number", value))
        })
    }

    /// Non-negative integer parameter, or `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the value is not a non-negative integer.
    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        self.values.get(name).map_or(Ok(default), |value| {
            value
                .as_int()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| wrong_type(name, "a non-negative integer", value))
        })
    }

    /// Boolean parameter, or `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the value is not a boolean.
    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        self.values.get(name).map_or(Ok(default), |value| {
            value
                .as_bool()
                .ok_or_else(|| wrong_type(name, "a boolean", value))
        })
    }

    /// String parameter, or `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the value is not a string.
    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        self.values.get(name).map_or(Ok(default), |value| {
            value
                .as_str()
                .ok_or_else(|| wrong_type(name, "a string", value))
        })
    }
}

fn wrong_type(name: &str, expected: &str, value: &ParameterValue) -> Error {
    Error::config(name, format!("expected {expected}, got {value}"))
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}

impl Eq for Configuration {}

impl Hash for Configuration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint().hash(state);
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.fingerprint())
    }
}

impl FromIterator<(String, ParameterValue)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, ParameterValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = Configuration::new()
            .with("lr", ParameterValue::Float(0.01))
            .with("hidden", ParameterValue::Int(64));
        let b = Configuration::new()
            .with("hidden", ParameterValue::Int(64))
            .with("lr", ParameterValue::Float(0.01));
        assert_eq!(a.fingerprint(), "hidden=64;lr=0.01");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_distinguishes_types() {
        let int = Configuration::new().with("x", ParameterValue::Int(1));
        let float = Configuration::new().with("x", ParameterValue::Float(1.0));
        let text = Configuration::new().with("x", ParameterValue::Categorical("1".into()));
        assert_ne!(int, float);
        assert_ne!(int, text);
    }

    #[test]
    fn test_typed_getters() {
        let config = Configuration::new()
            .with("lr", ParameterValue::Float(0.5))
            .with("epochs", ParameterValue::Int(3))
            .with("act", ParameterValue::Categorical("relu".into()));

        assert!((config.float_or("lr", 0.0).unwrap() - 0.5).abs() < f64::EPSILON);
        assert!((config.float_or("epochs", 0.0).unwrap() - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.usize_or("epochs", 1).unwrap(), 3);
        assert_eq!(config.usize_or("missing", 7).unwrap(), 7);
        assert_eq!(config.str_or("act", "tanh").unwrap(), "relu");
        assert!(config.bool_or("missing", true).unwrap());

        let err = config.usize_or("act", 1).unwrap_err();
        assert!(matches!(err, Error::Configuration { ref parameter, .. } if parameter == "act"));
    }

    #[test]
    fn test_negative_int_is_not_usize() {
        let config = Configuration::new().with("n", ParameterValue::Int(-1));
        assert!(config.usize_or("n", 1).is_err());
    }

    #[test]
    fn test_merged_over_fixed() {
        let fixed = Configuration::new()
            .with("epochs", ParameterValue::Int(10))
            .with("lr", ParameterValue::Float(0.1));
        let sampled = Configuration::new().with("lr", ParameterValue::Float(0.01));
        let merged = sampled.merged_over(&fixed);
        assert_eq!(merged.fingerprint(), "epochs=10;lr=0.01");
    }

    #[test]
    fn test_configuration_json_is_flat_map() {
        let config: Configuration = serde_json::from_str(r#"{"lr": 0.1, "layers": 2}"#).unwrap();
        assert_eq!(config.get("layers"), Some(&ParameterValue::Int(2)));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"layers":2,"lr":0.1}"#);
    }

    #[test]
    fn test_space_validation_names_parameter() {
        let space = SearchSpace::new().with("depth", ParameterDomain::Discrete { low: 5, high: 1 });
        let err = space.validate().unwrap_err();
        assert!(format!("{err}").contains("`depth`"));
    }
}
