//! Expectation-Maximization for Gaussian mixtures
//!
//! One EM run alternates the E-step ([`responsibilities`]) and the M-step
//! ([`update_parameters`]) from a given starting point until the
//! log-likelihood stops improving by at least `tol`, or until an optional
//! iteration cap is reached.
//!
//! See Dempster, Laird & Rubin (1977) and Section 9.2 of Bishop (2006).

use ndarray::{s, Array1, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::density::{component_densities, log_likelihood};
use super::params::MixtureParameters;
use crate::error::{MixtureError, Result};

/// Log-likelihood after every EM iteration, starting with the value at the
/// initial parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LikelihoodTrace {
    values: Vec<f64>,
}

impl LikelihoodTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Log-likelihood reached at the end of the run
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of EM iterations performed (the initial value is not one)
    pub fn iterations(&self) -> usize {
        self.values.len().saturating_sub(1)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    /// No step decreases the log-likelihood by more than `slack`
    pub fn is_non_decreasing(&self, slack: f64) -> bool {
        self.values.windows(2).all(|w| w[1] >= w[0] - slack)
    }
}

impl From<Vec<f64>> for LikelihoodTrace {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// E-step: posterior membership probabilities.
///
/// `gamma[i, j] = w_j d[i, j] / Σ_j' w_j' d[i, j']`; every row is renormalized
/// so it sums to 1. An observation with zero density under every component
/// is a degeneracy.
pub fn responsibilities(densities: &Array2<f64>, weights: &Array1<f64>) -> Result<Array2<f64>> {
    if densities.ncols() != weights.len() {
        return Err(MixtureError::shape(
            format!("{} density columns", weights.len()),
            format!("{}", densities.ncols()),
        ));
    }

    let mut gamma = densities * weights;
    for (i, mut row) in gamma.outer_iter_mut().enumerate() {
        let total = row.sum();
        if !(total > 0.0 && total.is_finite()) {
            return Err(MixtureError::degenerate(format!(
                "observation {} has zero density under every component",
                i
            )));
        }
        row /= total;
    }
    Ok(gamma)
}

/// M-step: closed-form parameter update from responsibilities.
///
/// Means are responsibility-weighted averages, covariances are weighted
/// outer-product estimates divided by the total weight of the component
/// (no small-sample correction) plus `reg_covar` on the diagonal, and the
/// mixture weights are the column means of `gamma`.
pub fn update_parameters(
    x: &Array2<f64>,
    gamma: &Array2<f64>,
    reg_covar: f64,
) -> Result<MixtureParameters> {
    let (n, p) = x.dim();
    if gamma.nrows() != n {
        return Err(MixtureError::shape(
            format!("{} responsibility rows", n),
            format!("{}", gamma.nrows()),
        ));
    }
    let k = gamma.ncols();

    let mut means = Array2::zeros((k, p));
    let mut covs = Array3::zeros((k, p, p));
    let totals = gamma.sum_axis(Axis(0));

    for j in 0..k {
        let total = totals[j];
        if !(total > 0.0) {
            return Err(MixtureError::degenerate(format!(
                "component {} has no responsibility left",
                j
            )));
        }
        let resp = gamma.column(j);
        let mean = resp.dot(x) / total;

        let centered = x - &mean;
        let weighted = &centered * &resp.insert_axis(Axis(1));
        let mut cov = weighted.t().dot(&centered) / total;
        // Exact symmetry
        for a in 0..p {
            for b in (a + 1)..p {
                let avg = 0.5 * (cov[[a, b]] + cov[[b, a]]);
                cov[[a, b]] = avg;
                cov[[b, a]] = avg;
            }
            cov[[a, a]] += reg_covar;
        }

        means.row_mut(j).assign(&mean);
        covs.slice_mut(s![j, .., ..]).assign(&cov);
    }

    let weights = totals / n as f64;
    Ok(MixtureParameters {
        means,
        covs,
        weights,
    })
}

/// Why an EM run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The last iteration improved the log-likelihood by less than `tol`
    Converged,
    /// The iteration cap was reached first
    MaxIterationsReached,
}

/// Result of one EM run
#[derive(Debug, Clone)]
pub struct EmOutcome {
    pub parameters: MixtureParameters,
    pub trace: LikelihoodTrace,
    pub stop_reason: StopReason,
}

impl EmOutcome {
    /// Final log-likelihood of the run
    pub fn log_likelihood(&self) -> f64 {
        self.trace.last().unwrap_or(f64::NEG_INFINITY)
    }
}

/// Runs EM from a starting point to convergence
#[derive(Debug, Clone)]
pub struct EmDriver {
    pub tol: f64,
    /// Iteration cap; `None` iterates until convergence
    pub max_iter: Option<usize>,
    pub reg_covar: f64,
}

impl EmDriver {
    pub fn new(tol: f64, max_iter: Option<usize>) -> Self {
        Self {
            tol,
            max_iter,
            reg_covar: 0.0,
        }
    }

    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    /// Iterate E and M steps from `init`.
    ///
    /// The trace holds the initial log-likelihood followed by one value per
    /// iteration. A run stops once `new_ll < old_ll + tol`, which includes a
    /// small decrease caused by rounding near a stationary point.
    pub fn run(&self, x: &Array2<f64>, init: MixtureParameters) -> Result<EmOutcome> {
        let mut params = init;
        let mut trace = LikelihoodTrace::new();

        let mut densities = component_densities(x, &params.means, &params.covs)
            .map_err(|e| e.within("initial parameters"))?;
        let mut ll = finite_log_likelihood(&densities, &params.weights, 0)?;
        trace.push(ll);

        let mut iteration = 0;
        let stop_reason = loop {
            if self.max_iter.map_or(false, |cap| iteration >= cap) {
                break StopReason::MaxIterationsReached;
            }
            iteration += 1;
            let old_ll = ll;

            let step = |e: MixtureError| e.within(format!("EM iteration {}", iteration));
            let gamma = responsibilities(&densities, &params.weights).map_err(step)?;
            params = update_parameters(x, &gamma, self.reg_covar).map_err(step)?;
            densities = component_densities(x, &params.means, &params.covs).map_err(step)?;
            ll = finite_log_likelihood(&densities, &params.weights, iteration)?;
            trace.push(ll);

            if ll < old_ll + self.tol {
                break StopReason::Converged;
            }
        };

        debug!(
            iterations = trace.iterations(),
            log_likelihood = ll,
            stop_reason = ?stop_reason,
            "EM run finished"
        );

        Ok(EmOutcome {
            parameters: params,
            trace,
            stop_reason,
        })
    }
}

fn finite_log_likelihood(
    densities: &Array2<f64>,
    weights: &Array1<f64>,
    iteration: usize,
) -> Result<f64> {
    let ll = log_likelihood(densities, weights);
    if !ll.is_finite() {
        return Err(MixtureError::degenerate(format!(
            "log-likelihood is {} at EM iteration {}",
            ll, iteration
        )));
    }
    Ok(ll)
}
