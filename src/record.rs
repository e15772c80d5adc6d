//! Performance records and their dataset-level grouping
//!
//! ## Schema Overview
//!
//! ```text
//! Corpus (1) ──< DatasetGroup (N) ──< PipelineScore (N)
//!                     │
//!                     └── Metafeatures (shared by every pipeline of the dataset)
//! ```
//!
//! Records are ingested flat ([`PerformanceRecord`]) and validated once when a
//! [`Corpus`] is built. Everything downstream (splits, models, evaluation)
//! works on whole [`DatasetGroup`]s so a dataset is never partially held out.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Named numeric dataset descriptors, ordered by name.
///
/// Missing values are represented as `NaN` (`null` in JSON).
pub type Metafeatures = BTreeMap<String, f64>;

fn deserialize_metafeatures<'de, D>(deserializer: D) -> std::result::Result<Metafeatures, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<f64>> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| (name, value.unwrap_or(f64::NAN)))
        .collect())
}

/// One observation of a pipeline evaluated on a dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceRecord {
    dataset_id: String,
    pipeline_id: String,
    #[serde(deserialize_with = "deserialize_metafeatures")]
    metafeatures: Metafeatures,
    score: f64,
}

impl PerformanceRecord {
    /// Create a new performance record.
    ///
    /// # Arguments
    ///
    /// * `dataset_id` - Dataset the pipeline was run on
    /// * `pipeline_id` - Pipeline identifier, unique within the dataset
    /// * `metafeatures` - Dataset descriptors
    /// * `score` - Measured performance (higher is better)
    #[must_use]
    pub fn new(
        dataset_id: impl Into<String>,
        pipeline_id: impl Into<String>,
        metafeatures: Metafeatures,
        score: f64,
    ) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            pipeline_id: pipeline_id.into(),
            metafeatures,
            score,
        }
    }

    /// Get the dataset ID.
    #[must_use]
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// Get the pipeline ID.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Get the dataset metafeatures.
    #[must_use]
    pub const fn metafeatures(&self) -> &Metafeatures {
        &self.metafeatures
    }

    /// Get the measured score.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }
}

/// True score of one pipeline on one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineScore {
    /// Pipeline identifier
    pub pipeline_id: String,
    /// Measured score
    pub score: f64,
}

/// All records sharing a `dataset_id`.
///
/// Invariants (checked by [`Corpus::from_records`]): at least one pipeline,
/// unique pipeline ids, one metafeature map for the whole dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetGroup {
    dataset_id: String,
    metafeatures: Metafeatures,
    pipelines: Vec<PipelineScore>,
}

impl DatasetGroup {
    /// Get the dataset ID.
    #[must_use]
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// Get the shared metafeatures.
    #[must_use]
    pub const fn metafeatures(&self) -> &Metafeatures {
        &self.metafeatures
    }

    /// Metafeature values in name order, the input layout models consume.
    #[must_use]
    pub fn feature_vector(&self) -> Vec<f64> {
        self.metafeatures.values().copied().collect()
    }

    /// Pipelines sorted by `pipeline_id`.
    #[must_use]
    pub fn pipelines(&self) -> &[PipelineScore] {
        &self.pipelines
    }

    /// Number of pipelines in the dataset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Always false for a validated group.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// True score of a pipeline, if present.
    #[must_use]
    pub fn score_of(&self, pipeline_id: &str) -> Option<f64> {
        self.pipelines
            .binary_search_by(|p| p.pipeline_id.as_str().cmp(pipeline_id))
            .ok()
            .map(|i| self.pipelines[i].score)
    }

    /// Copy of this group with replaced metafeatures.
    #[must_use]
    pub fn with_metafeatures(&self, metafeatures: Metafeatures) -> Self {
        Self {
            dataset_id: self.dataset_id.clone(),
            metafeatures,
            pipelines: self.pipelines.clone(),
        }
    }

    /// Flatten back into performance records.
    pub fn records(&self) -> impl Iterator<Item = PerformanceRecord> + '_ {
        self.pipelines.iter().map(|p| {
            PerformanceRecord::new(
                self.dataset_id.clone(),
                p.pipeline_id.clone(),
                self.metafeatures.clone(),
                p.score,
            )
        })
    }
}

fn same_metafeatures(a: &Metafeatures, b: &Metafeatures) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|((ka, va), (kb, vb))| ka == kb && va.to_bits() == vb.to_bits())
}

/// Validated collection of dataset groups, ordered by `dataset_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    groups: BTreeMap<String, DatasetGroup>,
}

impl Corpus {
    /// Group and validate raw records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] naming the dataset if a score is not finite,
    /// a pipeline id repeats within a dataset, or two records of the same
    /// dataset disagree on metafeatures.
    pub fn from_records(records: impl IntoIterator<Item = PerformanceRecord>) -> Result<Self> {
        let mut groups: BTreeMap<String, DatasetGroup> = BTreeMap::new();
        let mut seen: FxHashSet<(String, String)> = FxHashSet::default();

        for record in records {
            if !record.score.is_finite() {
                return Err(Error::data(
                    &record.dataset_id,
                    format!("pipeline `{}` has non-finite score {}", record.pipeline_id, record.score),
                ));
            }
            if !seen.insert((record.dataset_id.clone(), record.pipeline_id.clone())) {
                return Err(Error::data(
                    &record.dataset_id,
                    format!("duplicate pipeline id `{}`", record.pipeline_id),
                ));
            }

            let PerformanceRecord {
                dataset_id,
                pipeline_id,
                metafeatures,
                score,
            } = record;

            match groups.get_mut(&dataset_id) {
                Some(group) => {
                    if !same_metafeatures(&group.metafeatures, &metafeatures) {
                        return Err(Error::data(
                            &dataset_id,
                            format!("pipeline `{pipeline_id}` carries metafeatures that differ from the rest of the dataset"),
                        ));
                    }
                    group.pipelines.push(PipelineScore { pipeline_id, score });
                }
                None => {
                    groups.insert(
                        dataset_id.clone(),
                        DatasetGroup {
                            dataset_id,
                            metafeatures,
                            pipelines: vec![PipelineScore { pipeline_id, score }],
                        },
                    );
                }
            }
        }

        for group in groups.values_mut() {
            group
                .pipelines
                .sort_by(|a, b| a.pipeline_id.cmp(&b.pipeline_id));
        }

        Ok(Self { groups })
    }

    /// Build a corpus from already validated groups.
    #[must_use]
    pub fn from_groups(groups: impl IntoIterator<Item = DatasetGroup>) -> Self {
        Self {
            groups: groups
                .into_iter()
                .map(|g| (g.dataset_id.clone(), g))
                .collect(),
        }
    }

    /// Number of datasets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if the corpus has no datasets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of performance records.
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.groups.values().map(DatasetGroup::len).sum()
    }

    /// Dataset ids in canonical (sorted) order.
    pub fn dataset_ids(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Get a dataset group by ID.
    #[must_use]
    pub fn get(&self, dataset_id: &str) -> Option<&DatasetGroup> {
        self.groups.get(dataset_id)
    }

    /// Iterate over groups in `dataset_id` order.
    pub fn groups(&self) -> impl Iterator<Item = &DatasetGroup> {
        self.groups.values()
    }

    /// New corpus holding only the named datasets. Unknown ids are ignored.
    #[must_use]
    pub fn select<'a>(&self, dataset_ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            groups: dataset_ids
                .into_iter()
                .filter_map(|id| self.groups.get(id).map(|g| (id.to_string(), g.clone())))
                .collect(),
        }
    }

    /// Flatten into records, ordered by dataset then pipeline.
    #[must_use]
    pub fn to_records(&self) -> Vec<PerformanceRecord> {
        self.groups.values().flat_map(DatasetGroup::records).collect()
    }
}
