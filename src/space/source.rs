//! Lazy candidate sources
//!
//! Every source is finite and random-access: candidate `i` can be produced
//! without materializing candidates `0..i`, which makes resuming a search
//! from an offset cheap and keeps parallel batches deterministic.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::configuration::{Configuration, SearchSpace};
use super::parameter::ParameterValue;
use crate::{Error, Result};

/// Where search candidates come from.
#[derive(Debug, Clone)]
pub enum CandidateSource {
    /// Cartesian product of per-parameter grids, first parameter slowest
    Grid {
        /// Grid values per parameter, in name order
        axes: Vec<(String, Vec<ParameterValue>)>,
        /// Product of the axis lengths
        total: usize,
    },
    /// `n_iter` independent samples, sample `i` drawn from stream `i` of a
    /// ChaCha8 generator seeded with `seed`
    Random {
        /// Space to sample from
        space: SearchSpace,
        /// Number of samples
        n_iter: usize,
        /// Generator seed
        seed: u64,
    },
    /// User-supplied list, evaluated in order
    Explicit(Vec<Configuration>),
}

impl CandidateSource {
    /// Grid over `space`, `n_points` per continuous parameter.
    ///
    /// An empty space yields a single empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the space is invalid or the grid
    /// size overflows `usize`.
    pub fn grid(space: &SearchSpace, n_points: usize) -> Result<Self> {
        space.validate()?;
        if n_points == 0 {
            return Err(Error::config("grid_points", "must be at least 1"));
        }
        let axes: Vec<(String, Vec<ParameterValue>)> = space
            .iter()
            .map(|(name, domain)| (name.clone(), domain.grid_values(n_points)))
            .collect();
        let total = axes
            .iter()
            .try_fold(1usize, |acc, (_, values)| acc.checked_mul(values.len()))
            .ok_or_else(|| Error::config("grid_points", "grid is too large to enumerate"))?;
        Ok(Self::Grid { axes, total })
    }

    /// Seeded random sampling of `n_iter` configurations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the space is invalid.
    pub fn random(space: SearchSpace, n_iter: usize, seed: u64) -> Result<Self> {
        space.validate()?;
        Ok(Self::Random { space, n_iter, seed })
    }

    /// Explicit candidate list.
    #[must_use]
    pub fn explicit(candidates: Vec<Configuration>) -> Self {
        Self::Explicit(candidates)
    }

    /// Number of candidates the source yields.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Grid { total, .. } => *total,
            Self::Random { n_iter, .. } => *n_iter,
            Self::Explicit(candidates) => candidates.len(),
        }
    }

    /// Check if the source yields nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Candidate at `index`, `None` past the end.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Configuration> {
        if index >= self.len() {
            return None;
        }
        match self {
            Self::Grid { axes, .. } => {
                // Mixed-radix decode, last axis fastest
                let mut rest = index;
                let mut values = Vec::with_capacity(axes.len());
                for (name, axis) in axes.iter().rev() {
                    values.push((name.clone(), axis[rest % axis.len()].clone()));
                    rest /= axis.len();
                }
                Some(values.into_iter().collect())
            }
            Self::Random { space, seed, .. } => {
                let mut rng = ChaCha8Rng::seed_from_u64(*seed);
                rng.set_stream(index as u64);
                Some(
                    space
                        .iter()
                        .map(|(name, domain)| (name.clone(), domain.sample(&mut rng)))
                        .collect(),
                )
            }
            Self::Explicit(candidates) => candidates.get(index).cloned(),
        }
    }

    /// Candidates from `offset` onwards, paired with their index.
    pub fn iter_from(&self, offset: usize) -> impl Iterator<Item = (usize, Configuration)> + '_ {
        (offset..self.len()).filter_map(move |i| self.get(i).map(|config| (i, config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::ParameterDomain;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .with("a", ParameterDomain::Discrete { low: 0, high: 1 })
            .with(
                "b",
                ParameterDomain::Categorical {
                    choices: vec!["x".into(), "y".into(), "z".into()],
                },
            )
    }

    #[test]
    fn test_grid_enumerates_product_in_order() {
        let source = CandidateSource::grid(&space(), 5).unwrap();
        assert_eq!(source.len(), 6);

        let prints: Vec<String> = source.iter_from(0).map(|(_, c)| c.fingerprint()).collect();
        assert_eq!(prints[0], r#"a=0;b="x""#);
        assert_eq!(prints[1], r#"a=0;b="y""#);
        assert_eq!(prints[3], r#"a=1;b="x""#);
        assert_eq!(prints[5], r#"a=1;b="z""#);
    }

    #[test]
    fn test_empty_space_grid_is_one_empty_candidate() {
        let source = CandidateSource::grid(&SearchSpace::new(), 3).unwrap();
        assert_eq!(source.len(), 1);
        assert!(source.get(0).unwrap().is_empty());
    }

    #[test]
    fn test_random_is_reproducible_and_random_access() {
        let source = CandidateSource::random(space(), 10, 42).unwrap();
        let all: Vec<Configuration> = source.iter_from(0).map(|(_, c)| c).collect();
        let again: Vec<Configuration> = source.iter_from(0).map(|(_, c)| c).collect();
        assert_eq!(all, again);

        let tail: Vec<Configuration> = source.iter_from(7).map(|(_, c)| c).collect();
        assert_eq!(tail.as_slice(), &all[7..]);
    }

    #[test]
    fn test_random_seed_changes_samples() {
        let space = SearchSpace::new().with(
            "lr",
            ParameterDomain::Continuous { low: 1e-4, high: 1.0, log_scale: true },
        );
        let a = CandidateSource::random(space.clone(), 3, 1).unwrap();
        let b = CandidateSource::random(space, 3, 2).unwrap();
        assert_ne!(a.get(0), b.get(0));
    }

    #[test]
    fn test_explicit_and_bounds() {
        let source = CandidateSource::explicit(vec![Configuration::new()]);
        assert_eq!(source.len(), 1);
        assert!(source.get(1).is_none());
        assert_eq!(source.iter_from(5).count(), 0);
    }

    #[test]
    fn test_invalid_space_rejected() {
        let bad = SearchSpace::new().with("c", ParameterDomain::Categorical { choices: vec![] });
        assert!(CandidateSource::grid(&bad, 3).is_err());
        assert!(CandidateSource::random(bad, 3, 0).is_err());
    }
}
