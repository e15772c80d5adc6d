//! Seeded, dataset-level partitioning
//!
//! Splits always move whole [`DatasetGroup`](crate::record::DatasetGroup)s so
//! that the oracle top-k of every held-out dataset is fully known.
//!
//! The permutation is computed over the canonically sorted dataset ids with a
//! seeded `ChaCha8Rng`, so the result depends only on the set of ids, the
//! size and the seed, never on input order or platform.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::Corpus;
use crate::{Error, Result};

/// Size and seed of one held-out split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSpec {
    /// Number of datasets to hold out
    pub size: usize,
    /// Shuffle seed
    pub seed: u64,
}

impl SplitSpec {
    /// Create a split spec.
    #[must_use]
    pub const fn new(size: usize, seed: u64) -> Self {
        Self { size, seed }
    }
}

/// Split a corpus into `(remainder, held_out)`.
///
/// `held_out` contains exactly `size` datasets. The input is not modified.
///
/// # Errors
///
/// Returns [`Error::InvalidSize`] if `size` is not smaller than the number of
/// datasets in `corpus`.
///
/// # Examples
///
/// ```rust
/// use trueno_tune::record::{Corpus, Metafeatures, PerformanceRecord};
/// use trueno_tune::split::split;
///
/// let records = (0..5).map(|d| {
///     PerformanceRecord::new(format!("d{d}"), "p", Metafeatures::new(), 0.5)
/// });
/// let corpus = Corpus::from_records(records)?;
///
/// let (train, test) = split(&corpus, 2, 42)?;
/// assert_eq!(train.len(), 3);
/// assert_eq!(test.len(), 2);
/// # Ok::<(), trueno_tune::Error>(())
/// ```
pub fn split(corpus: &Corpus, size: usize, seed: u64) -> Result<(Corpus, Corpus)> {
    let available = corpus.len();
    if size >= available {
        return Err(Error::InvalidSize { size, available });
    }

    // Corpus iterates in sorted order: the canonical starting permutation
    let mut ids: Vec<&str> = corpus.dataset_ids().collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    ids.shuffle(&mut rng);

    let (held_out, remainder) = ids.split_at(size);
    debug!(
        seed,
        held_out = held_out.len(),
        remainder = remainder.len(),
        "split datasets"
    );

    Ok((
        corpus.select(remainder.iter().copied()),
        corpus.select(held_out.iter().copied()),
    ))
}

/// The train / validation / test partition of a corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Splits {
    /// Datasets the predictor is fit on
    pub train: Corpus,
    /// Datasets candidates are scored on
    pub validation: Corpus,
    /// Datasets held out from the whole search, if a test split was taken
    pub test: Option<Corpus>,
}

impl Splits {
    /// Carve an optional test split from the full corpus, then a validation
    /// split from what remains. The two splits use independent seeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`] if either split is too large for the
    /// datasets left at that stage.
    pub fn partition(corpus: &Corpus, test: Option<SplitSpec>, validation: SplitSpec) -> Result<Self> {
        let (pool, test) = match test {
            Some(spec) => {
                let (pool, test) = split(corpus, spec.size, spec.seed)?;
                (pool, Some(test))
            }
            None => (corpus.clone(), None),
        };

        let (train, validation) = split(&pool, validation.size, validation.seed)?;

        Ok(Self {
            train,
            validation,
            test,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::record;

    fn corpus(n: usize) -> Corpus {
        Corpus::from_records((1..=n).map(|d| record(&d.to_string(), "p", d as f64, 0.5))).unwrap()
    }

    #[test]
    fn test_split_sizes() {
        let (remainder, held_out) = split(&corpus(11), 2, 9_232_859_745).unwrap();
        assert_eq!(held_out.len(), 2);
        assert_eq!(remainder.len(), 9);
    }

    #[test]
    fn test_split_is_deterministic() {
        let data = corpus(11);
        let first = split(&data, 2, 9_232_859_745).unwrap();
        let second = split(&data, 2, 9_232_859_745).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_size_must_leave_a_remainder() {
        let err = split(&corpus(3), 3, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidSize { size: 3, available: 3 }));
    }

    #[test]
    fn test_zero_size_holds_out_nothing() {
        let (remainder, held_out) = split(&corpus(4), 0, 1).unwrap();
        assert!(held_out.is_empty());
        assert_eq!(remainder.len(), 4);
    }

    #[test]
    fn test_partition_is_disjoint() {
        let data = corpus(20);
        let splits = Splits::partition(&data, Some(SplitSpec::new(4, 7)), SplitSpec::new(3, 8)).unwrap();
        let test = splits.test.as_ref().unwrap();

        assert_eq!(test.len(), 4);
        assert_eq!(splits.validation.len(), 3);
        assert_eq!(splits.train.len(), 13);

        for id in splits.train.dataset_ids() {
            assert!(splits.validation.get(id).is_none());
            assert!(test.get(id).is_none());
        }
        for id in splits.validation.dataset_ids() {
            assert!(test.get(id).is_none());
        }
    }

    #[test]
    fn test_partition_validation_too_large() {
        let data = corpus(5);
        let err = Splits::partition(&data, Some(SplitSpec::new(2, 1)), SplitSpec::new(3, 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidSize { size: 3, available: 3 }));
    }
}
