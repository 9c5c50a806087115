//! Multi-start fitting
//!
//! EM only finds a local maximum of the likelihood, so a fit runs
//! `repeats` independent attempts and keeps the best one. Attempt 0 starts
//! from a k-means partition; the remaining attempts start from the
//! random-restart initializer.

use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::em::{EmDriver, EmOutcome, LikelihoodTrace};
use super::init::{ClusterInitializer, Initializer, RandomRestartInitializer};
use super::params::MixtureParameters;
use crate::cluster::KMeansConfig;
use crate::error::{MixtureError, Result};
use crate::utils::{
    map_indexed, validate_min, validate_non_negative, validate_positive, validate_sample,
    ParallelConfig,
};

/// Configuration of a multi-start EM fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Number of EM runs from different starting points
    pub repeats: usize,

    /// Convergence tolerance on the log-likelihood improvement
    pub tol: f64,

    /// Iteration cap of each full EM run (None = run until convergence)
    pub iterations: Option<usize>,

    /// Random partitions tried by the random-restart initializer
    pub init_repeats: usize,

    /// Iteration cap of each random-restart EM race
    pub init_iter: usize,

    /// Added to the diagonal of every M-step covariance
    pub reg_covar: f64,

    /// Options for the k-means starting point
    pub kmeans: KMeansConfig,

    /// Scheduling of independent attempts
    pub parallel: ParallelConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            repeats: 5,
            tol: 1e-6,
            iterations: None,
            init_repeats: 30,
            init_iter: 10,
            reg_covar: 0.0,
            kmeans: KMeansConfig::default(),
            parallel: ParallelConfig::default(),
        }
    }
}

impl FitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn with_init_repeats(mut self, init_repeats: usize) -> Self {
        self.init_repeats = init_repeats;
        self
    }

    pub fn with_init_iter(mut self, init_iter: usize) -> Self {
        self.init_iter = init_iter;
        self
    }

    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    pub fn with_kmeans(mut self, kmeans: KMeansConfig) -> Self {
        self.kmeans = kmeans;
        self
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check every field; called by the fitter before any numeric work
    pub fn validate(&self) -> Result<()> {
        validate_min("repeats", self.repeats, 1)?;
        validate_positive("tol", self.tol)?;
        if let Some(iterations) = self.iterations {
            validate_min("iterations", iterations, 1)?;
        }
        validate_min("init_repeats", self.init_repeats, 1)?;
        validate_min("init_iter", self.init_iter, 1)?;
        validate_non_negative("reg_covar", self.reg_covar)?;
        validate_min("kmeans.max_iter", self.kmeans.max_iter, 1)?;
        validate_positive("kmeans.tol", self.kmeans.tol)?;
        if let Some(threads) = self.parallel.n_threads {
            validate_min("parallel.n_threads", threads, 1)?;
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A discarded attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub attempt: usize,
    pub reason: String,
}

/// Result of a multi-start fit
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// Parameters of the best attempt, components in canonical order
    pub parameters: MixtureParameters,
    /// One entry per attempt, in attempt order; `None` for a discarded attempt
    pub traces: Vec<Option<LikelihoodTrace>>,
    /// Index of the attempt whose parameters were kept; also indexes `traces`
    pub best_attempt: usize,
    pub failures: Vec<AttemptFailure>,
}

impl FitOutcome {
    /// Trace of the attempt whose parameters were kept
    pub fn best_trace(&self) -> Option<&LikelihoodTrace> {
        self.traces.get(self.best_attempt).and_then(Option::as_ref)
    }

    pub fn log_likelihood(&self) -> f64 {
        self.best_trace()
            .and_then(LikelihoodTrace::last)
            .unwrap_or(f64::NEG_INFINITY)
    }
}

/// Fit a `k`-component mixture to `x` with multi-start EM.
///
/// Attempt `r` draws from its own generator seeded with
/// `seed.wrapping_add(r)`, so attempts are independent of each other and
/// of the scheduling order. Degenerate attempts are logged and skipped;
/// the fit fails only when every attempt is degenerate.
pub fn fit_mixture(x: &Array2<f64>, k: usize, config: &FitConfig, seed: u64) -> Result<FitOutcome> {
    config.validate()?;
    validate_sample(x)?;
    validate_min("k", k, 1)?;
    if x.nrows() < k {
        return Err(MixtureError::invalid_parameter(
            "k",
            k,
            format!("exceeds the number of observations ({})", x.nrows()),
        ));
    }

    let cluster_init = ClusterInitializer::new(config.kmeans.clone());
    // Inner restarts share the pool of the enclosing attempt
    let inner_parallel = ParallelConfig {
        enabled: config.parallel.enabled,
        n_threads: None,
    };
    let random_init = RandomRestartInitializer::new(config.init_repeats, config.init_iter, config.tol)
        .with_reg_covar(config.reg_covar)
        .with_parallel(inner_parallel);
    let driver = EmDriver::new(config.tol, config.iterations).with_reg_covar(config.reg_covar);

    let attempts = map_indexed(&config.parallel, config.repeats, |r| {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(r as u64));
        let start = if r == 0 {
            cluster_init.initialize(x, k, &mut rng)
        } else {
            random_init.initialize(x, k, &mut rng)
        };
        start
            .and_then(|params| driver.run(x, params))
            .map(|mut outcome| {
                outcome.parameters.canonicalize();
                outcome
            })
            .map_err(|e| e.within(format!("attempt {}", r)))
    })?;

    let mut best: Option<(usize, EmOutcome)> = None;
    let mut traces = Vec::with_capacity(config.repeats);
    let mut failures = Vec::new();

    for (r, attempt) in attempts.into_iter().enumerate() {
        match attempt {
            Ok(outcome) => {
                debug!(
                    attempt = r,
                    iterations = outcome.trace.iterations(),
                    log_likelihood = outcome.log_likelihood(),
                    "Attempt finished"
                );
                traces.push(Some(outcome.trace.clone()));
                let better = best
                    .as_ref()
                    .map_or(true, |(_, b)| outcome.log_likelihood() > b.log_likelihood());
                if better {
                    best = Some((r, outcome));
                }
            }
            Err(e) if e.is_degenerate() => {
                warn!(attempt = r, error = %e, "Discarding degenerate attempt");
                traces.push(None);
                failures.push(AttemptFailure {
                    attempt: r,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    let (best_attempt, outcome) = best.ok_or_else(|| MixtureError::FitFailed {
        attempts: config.repeats,
        reason: failures
            .last()
            .map(|f| f.reason.clone())
            .unwrap_or_default(),
    })?;

    info!(
        k,
        best_attempt,
        log_likelihood = outcome.log_likelihood(),
        failed_attempts = failures.len(),
        "Gaussian mixture fitted"
    );

    Ok(FitOutcome {
        parameters: outcome.parameters,
        traces,
        best_attempt,
        failures,
    })
}
