//! Starting points for EM
//!
//! Two strategies produce the initial parameters of an EM run:
//!
//! - [`ClusterInitializer`]: partition the sample with k-means and use the
//!   empirical statistics of each cluster.
//! - [`RandomRestartInitializer`]: split the sample into `k` balanced random
//!   groups, run a short EM race from each of several such splits and keep
//!   the best (Shireman, Steinley & Brusco, 2017).

use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use super::em::{EmDriver, EmOutcome};
use super::params::MixtureParameters;
use crate::cluster::{Clusterer, KMeans, KMeansConfig};
use crate::error::{MixtureError, Result};
use crate::utils::{map_indexed, ParallelConfig};

/// Strategy producing the initial parameters of one EM run
pub trait Initializer {
    fn initialize(
        &self,
        x: &Array2<f64>,
        k: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<MixtureParameters>;
}

/// Per-cluster estimates from a k-means partition
#[derive(Debug, Clone, Default)]
pub struct ClusterInitializer {
    pub kmeans: KMeansConfig,
}

impl ClusterInitializer {
    pub fn new(kmeans: KMeansConfig) -> Self {
        Self { kmeans }
    }
}

impl Initializer for ClusterInitializer {
    fn initialize(
        &self,
        x: &Array2<f64>,
        k: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<MixtureParameters> {
        let mut kmeans = KMeans::from_config(k, &self.kmeans).with_random_state(rng.next_u64());
        kmeans.fit(x)?;
        let clusters = kmeans.predict(x)?.to_vec();
        MixtureParameters::from_partition(x, &clusters, k)
    }
}

/// Best of several short EM runs started from random balanced partitions
#[derive(Debug, Clone)]
pub struct RandomRestartInitializer {
    /// Number of random partitions to try
    pub init_repeats: usize,
    /// Iteration cap of each short EM run
    pub init_iter: usize,
    pub tol: f64,
    pub reg_covar: f64,
    pub parallel: ParallelConfig,
}

impl RandomRestartInitializer {
    pub fn new(init_repeats: usize, init_iter: usize, tol: f64) -> Self {
        Self {
            init_repeats,
            init_iter,
            tol,
            reg_covar: 0.0,
            parallel: ParallelConfig::default(),
        }
    }

    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    fn restart(&self, x: &Array2<f64>, k: usize, seed: u64) -> Result<EmOutcome> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let labels = balanced_partition(x.nrows(), k, &mut rng);
        let start = MixtureParameters::from_partition(x, &labels, k)?;
        EmDriver::new(self.tol, Some(self.init_iter))
            .with_reg_covar(self.reg_covar)
            .run(x, start)
    }
}

impl Initializer for RandomRestartInitializer {
    fn initialize(
        &self,
        x: &Array2<f64>,
        k: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<MixtureParameters> {
        let base_seed = rng.next_u64();
        let outcomes = map_indexed(&self.parallel, self.init_repeats, |i| {
            self.restart(x, k, base_seed.wrapping_add(i as u64))
        })?;

        let mut best: Option<EmOutcome> = None;
        let mut last_error = None;
        for (i, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(outcome) => {
                    let better = best
                        .as_ref()
                        .map_or(true, |b| outcome.log_likelihood() > b.log_likelihood());
                    if better {
                        best = Some(outcome);
                    }
                }
                Err(e) if e.is_degenerate() => {
                    warn!(restart = i, error = %e, "Discarding degenerate random restart");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match best {
            Some(outcome) => Ok(outcome.parameters),
            None => Err(MixtureError::degenerate(format!(
                "all {} random restarts were degenerate (last: {})",
                self.init_repeats,
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ))),
        }
    }
}

/// Random assignment of `n` observations to `k` groups whose sizes differ
/// by at most one
pub fn balanced_partition(n: usize, k: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let mut labels: Vec<usize> = (0..n).map(|i| i % k).collect();
    labels.shuffle(rng);
    labels
}
