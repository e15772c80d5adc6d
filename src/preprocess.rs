//! Metafeature preprocessing
//!
//! Fit on the training split only, then applied to every split:
//!
//! 1. keep the requested [`MetafeatureSubset`]
//! 2. drop metafeatures missing (`NaN` or absent) in any training dataset
//! 3. standardize to zero mean / unit variance, dropping constant columns
//!
//! After [`Preprocessor::transform`] every dataset carries exactly the same
//! metafeature names, so models can consume
//! [`DatasetGroup::feature_vector`] positionally. A fitted metafeature that is
//! missing from a non-training dataset is imputed with `0.0`, the training
//! mean after scaling.

#![allow(clippy::cast_precision_loss)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::{Corpus, DatasetGroup, Metafeatures};
use crate::{Error, Result};

/// Named metafeature vocabulary restriction (`--metafeature-subset`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetafeatureSubset {
    /// Every metafeature
    All,
    /// Only landmarking metafeatures (error rates / kappas of quick learners)
    Landmarkers,
    /// Everything except landmarking metafeatures
    NonLandmarkers,
}

impl MetafeatureSubset {
    /// CLI / JSON name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Landmarkers => "landmarkers",
            Self::NonLandmarkers => "non-landmarkers",
        }
    }

    /// Whether a metafeature name belongs to this subset.
    #[must_use]
    pub fn contains(self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Landmarkers => is_landmarker(name),
            Self::NonLandmarkers => !is_landmarker(name),
        }
    }
}

impl fmt::Display for MetafeatureSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetafeatureSubset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "landmarkers" => Ok(Self::Landmarkers),
            "non-landmarkers" => Ok(Self::NonLandmarkers),
            other => Err(Error::config(
                "metafeature_subset",
                format!("unknown subset `{other}` (expected all, landmarkers or non-landmarkers)"),
            )),
        }
    }
}

/// Landmarkers report the error rate or kappa of a cheap learner.
fn is_landmarker(name: &str) -> bool {
    name.contains("ErrRate") || name.contains("Kappa")
}

fn is_missing(metafeatures: &Metafeatures, name: &str) -> bool {
    metafeatures.get(name).map_or(true, |v| !v.is_finite())
}

/// Per-column standardization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    /// Training mean
    pub mean: f64,
    /// Training sample standard deviation (ddof = 1)
    pub std_dev: f64,
}

/// Fitted preprocessing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    subset: MetafeatureSubset,
    dropped: BTreeSet<String>,
    scales: BTreeMap<String, ColumnScale>,
}

impl Preprocessor {
    /// Fit on the training corpus.
    ///
    /// Statistics are weighted by record, so a dataset with more pipelines
    /// weighs more, matching how the models see the data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no usable metafeature survives the
    /// subset, missing-value and zero-variance filters.
    pub fn fit(train: &Corpus, subset: MetafeatureSubset) -> Result<Self> {
        let names: BTreeSet<&str> = train
            .groups()
            .flat_map(|g| g.metafeatures().keys().map(String::as_str))
            .filter(|name| subset.contains(name))
            .collect();

        let dropped: BTreeSet<String> = names
            .iter()
            .filter(|name| train.groups().any(|g| is_missing(g.metafeatures(), name)))
            .map(|name| (*name).to_string())
            .collect();

        let mut scales = BTreeMap::new();
        for name in names.iter().filter(|n| !dropped.contains(**n)) {
            let mut values = Vec::with_capacity(train.num_records());
            for group in train.groups() {
                let value = group.metafeatures()[*name];
                values.extend(std::iter::repeat(value).take(group.len()));
            }
            if values.len() < 2 {
                continue;
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            let std_dev = variance.sqrt();
            if std_dev > 0.0 && std_dev.is_finite() {
                scales.insert((*name).to_string(), ColumnScale { mean, std_dev });
            }
        }

        if scales.is_empty() {
            return Err(Error::config(
                "metafeature_subset",
                format!(
                    "no usable `{subset}` metafeatures in the training split ({} candidates, {} missing)",
                    names.len(),
                    dropped.len()
                ),
            ));
        }

        debug!(
            kept = scales.len(),
            dropped_missing = dropped.len(),
            subset = %subset,
            "fitted metafeature preprocessing"
        );

        Ok(Self {
            subset,
            dropped,
            scales,
        })
    }

    /// The subset this preprocessor was fit with.
    #[must_use]
    pub const fn subset(&self) -> MetafeatureSubset {
        self.subset
    }

    /// Metafeature names that survive preprocessing, in feature-vector order.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.scales.keys().map(String::as_str)
    }

    /// Names dropped because they were missing in some training dataset.
    #[must_use]
    pub const fn dropped(&self) -> &BTreeSet<String> {
        &self.dropped
    }

    /// Apply to one dataset group.
    #[must_use]
    pub fn transform_group(&self, group: &DatasetGroup) -> DatasetGroup {
        let metafeatures: Metafeatures = self
            .scales
            .iter()
            .map(|(name, scale)| {
                let value = match group.metafeatures().get(name) {
                    Some(v) if v.is_finite() => (v - scale.mean) / scale.std_dev,
                    _ => 0.0,
                };
                (name.clone(), value)
            })
            .collect();
        group.with_metafeatures(metafeatures)
    }

    /// Apply to every dataset of a corpus.
    #[must_use]
    pub fn transform(&self, corpus: &Corpus) -> Corpus {
        Corpus::from_groups(corpus.groups().map(|g| self.transform_group(g)))
    }
}
