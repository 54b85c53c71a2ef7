//! Seeded Monte-Carlo sampling of an external evaluation function.

use crate::config::LeafConfiguration;
use crate::error::{BoxError, Result};
use crate::pool::WorkerPool;
use crate::statistics::Statistic;

/// One draw of the evaluation function at one seed
pub type Sample = f64;

/// External computation evaluated at one leaf configuration.
///
/// Implementations must be deterministic given `(config, seed)`; the seed is
/// the only source of randomness.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, config: &LeafConfiguration, seed: u64) -> std::result::Result<Sample, BoxError>;
}

impl<F> Evaluator for F
where
    F: Fn(&LeafConfiguration, u64) -> std::result::Result<Sample, BoxError> + Send + Sync,
{
    fn evaluate(&self, config: &LeafConfiguration, seed: u64) -> std::result::Result<Sample, BoxError> {
        self(config, seed)
    }
}

/// Seeds `base_seed + i` for `i` in `0..num_samples`, wrapping on overflow
#[must_use]
pub fn sample_seeds(base_seed: u64, num_samples: usize) -> Vec<u64> {
    (0..num_samples as u64)
        .map(|i| base_seed.wrapping_add(i))
        .collect()
}

/// Maps an [`Evaluator`] over consecutive seeds on a worker pool
pub struct SampleEngine<'a> {
    evaluator: &'a dyn Evaluator,
    pool: &'a WorkerPool,
    base_seed: u64,
}

impl<'a> SampleEngine<'a> {
    pub fn new(evaluator: &'a dyn Evaluator, pool: &'a WorkerPool, base_seed: u64) -> Self {
        Self {
            evaluator,
            pool,
            base_seed,
        }
    }

    #[must_use]
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Evaluate `num_samples` draws; sample `i` uses seed `base_seed + i`.
    ///
    /// The output is in seed order. Any failing draw aborts the whole call
    /// with [`SweepError::BatchExecution`](crate::SweepError::BatchExecution)
    /// tagged with the sample index.
    pub fn compute(&self, config: &LeafConfiguration, num_samples: usize) -> Result<Vec<Sample>> {
        let seeds = sample_seeds(self.base_seed, num_samples);
        self.pool
            .compute(&seeds, |_, &seed| self.evaluator.evaluate(config, seed))
    }

    pub fn statistic(&self, config: &LeafConfiguration, num_samples: usize) -> Result<Statistic> {
        Ok(Statistic::from_samples(&self.compute(config, num_samples)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigTree;
    use crate::parameter::ParameterOptions;
    use crate::SweepError;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rand_distr::{Distribution, Normal};

    fn leaf(mu: f64) -> LeafConfiguration {
        let mut tree = ConfigTree::new("test");
        tree.insert("mu", mu, ParameterOptions::default()).unwrap();
        tree.leaf_at(0).unwrap()
    }

    fn gaussian(config: &LeafConfiguration, seed: u64) -> std::result::Result<Sample, BoxError> {
        let mu = config.get_f64("mu").ok_or("missing mu")?;
        let mut rng = SmallRng::seed_from_u64(seed);
        Ok(Normal::new(mu, 1.0)?.sample(&mut rng))
    }

    #[test]
    fn test_seeds_are_consecutive() {
        assert_eq!(sample_seeds(40, 3), vec![40, 41, 42]);
        assert_eq!(sample_seeds(u64::MAX, 2), vec![u64::MAX, 0]);
    }

    #[test]
    fn test_seed_is_threaded_into_each_call() {
        let pool = WorkerPool::sequential();
        let echo = |_: &LeafConfiguration, seed: u64| -> std::result::Result<Sample, BoxError> {
            Ok(seed as f64)
        };
        let engine = SampleEngine::new(&echo, &pool, 7);
        assert_eq!(engine.compute(&leaf(0.0), 4).unwrap(), vec![7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_worker_count_does_not_change_samples() {
        let config = leaf(2.0);
        let sequential = WorkerPool::sequential();
        let parallel = WorkerPool::new(4).unwrap();
        let a = SampleEngine::new(&gaussian, &sequential, 11).compute(&config, 64).unwrap();
        let b = SampleEngine::new(&gaussian, &parallel, 11).compute(&config, 64).unwrap();
        assert_eq!(a, b);

        let stat = Statistic::from_samples(&a);
        assert!((stat.mean - 2.0).abs() < 0.5);
    }

    #[test]
    fn test_failing_draw_aborts_compute() {
        let pool = WorkerPool::new(2).unwrap();
        let flaky = |_: &LeafConfiguration, seed: u64| -> std::result::Result<Sample, BoxError> {
            if seed == 5 { Err("diverged".into()) } else { Ok(1.0) }
        };
        let err = SampleEngine::new(&flaky, &pool, 0)
            .compute(&leaf(0.0), 8)
            .unwrap_err();
        assert!(matches!(err, SweepError::BatchExecution { index: 5, .. }));
    }
}
