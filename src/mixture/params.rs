//! Mixture parameters and covariance specifications

use std::cmp::Ordering;

use ndarray::{s, Array1, Array2, Array3, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use super::linalg::is_symmetric;
use crate::error::{MixtureError, Result};

/// Means, covariances and weights of a `k`-component mixture in `p` dimensions
///
/// - `means`: (k, p), one mean vector per row
/// - `covs`: (k, p, p), symmetric covariance matrices
/// - `weights`: (k,), non-negative and summing to 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureParameters {
    pub means: Array2<f64>,
    pub covs: Array3<f64>,
    pub weights: Array1<f64>,
}

impl MixtureParameters {
    /// Validate and normalize a parameter set.
    ///
    /// Weights are rescaled to sum to 1 and covariance matrices are made
    /// exactly symmetric. Shapes must agree with the `(k, p)` of `means`.
    pub fn new(means: Array2<f64>, covs: Array3<f64>, weights: Array1<f64>) -> Result<Self> {
        let (k, p) = means.dim();
        if k == 0 || p == 0 {
            return Err(MixtureError::ConfigError(
                "parameter 'means' cannot be empty".to_string(),
            ));
        }
        if means.iter().any(|v| !v.is_finite()) {
            return Err(MixtureError::ConfigError(
                "parameter 'means' must be finite".to_string(),
            ));
        }
        if covs.dim() != (k, p, p) {
            return Err(MixtureError::shape(
                format!("covs of shape ({}, {}, {})", k, p, p),
                format!("{:?}", covs.shape()),
            ));
        }
        if weights.len() != k {
            return Err(MixtureError::shape(
                format!("weights of length {}", k),
                format!("length {}", weights.len()),
            ));
        }

        let weights = normalize_weights(weights)?;
        let mut covs = covs;
        for (j, mut cov) in covs.outer_iter_mut().enumerate() {
            if cov.iter().any(|v| !v.is_finite()) || !is_symmetric(cov.view()) {
                return Err(MixtureError::ConfigError(format!(
                    "covariance matrix of component {} must be finite and symmetric",
                    j
                )));
            }
            symmetrize(&mut cov);
        }

        Ok(Self {
            means,
            covs,
            weights,
        })
    }

    /// Number of components
    pub fn k(&self) -> usize {
        self.means.nrows()
    }

    /// Number of dimensions
    pub fn p(&self) -> usize {
        self.means.ncols()
    }

    /// Per-group empirical parameters from a hard partition of `x`.
    ///
    /// Each group contributes its sample mean, its unbiased sample covariance
    /// and its share of the observations. Groups with fewer than two members
    /// have no covariance estimate and are reported as degenerate.
    pub fn from_partition(x: &Array2<f64>, labels: &[usize], k: usize) -> Result<Self> {
        let (n, p) = x.dim();
        if labels.len() != n {
            return Err(MixtureError::shape(
                format!("{} labels", n),
                format!("{} labels", labels.len()),
            ));
        }

        let mut means = Array2::zeros((k, p));
        let mut covs = Array3::zeros((k, p, p));
        let mut weights = Array1::zeros(k);

        for j in 0..k {
            let members: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == j)
                .map(|(i, _)| i)
                .collect();
            let m = members.len();
            if m < 2 {
                return Err(MixtureError::degenerate(format!(
                    "component {} has {} observation(s), at least 2 are needed",
                    j, m
                )));
            }

            let group = x.select(Axis(0), &members);
            let mean = group.sum_axis(Axis(0)) / m as f64;
            let centered = &group - &mean;
            let cov = centered.t().dot(&centered) / (m - 1) as f64;

            means.row_mut(j).assign(&mean);
            covs.slice_mut(s![j, .., ..]).assign(&cov);
            weights[j] = m as f64 / n as f64;
        }

        Ok(Self {
            means,
            covs,
            weights,
        })
    }

    /// Reorder the components so that the mean vectors are in ascending
    /// lexicographic order (first coordinate first, ties by the next ones).
    pub fn canonicalize(&mut self) {
        let mut order: Vec<usize> = (0..self.k()).collect();
        order.sort_by(|&a, &b| lexicographic(self.means.row(a), self.means.row(b)));

        self.means = self.means.select(Axis(0), &order);
        self.covs = self.covs.select(Axis(0), &order);
        self.weights = self.weights.select(Axis(0), &order);
    }

    /// Consuming version of [`canonicalize`](Self::canonicalize)
    pub fn canonicalized(mut self) -> Self {
        self.canonicalize();
        self
    }

    /// Number of free parameters of this mixture
    pub fn n_parameters(&self) -> usize {
        n_parameters(self.k(), self.p())
    }
}

/// Free parameters of a `k`-component, `p`-dimensional mixture:
/// `k p` means, `k p (p + 1) / 2` symmetric covariance entries and `k - 1`
/// weights (constrained to sum to 1).
pub fn n_parameters(k: usize, p: usize) -> usize {
    k * p + k * p * (p + 1) / 2 + k - 1
}

fn lexicographic(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn symmetrize(cov: &mut ndarray::ArrayViewMut2<f64>) {
    let p = cov.nrows();
    for i in 0..p {
        for j in (i + 1)..p {
            let avg = 0.5 * (cov[[i, j]] + cov[[j, i]]);
            cov[[i, j]] = avg;
            cov[[j, i]] = avg;
        }
    }
}

pub(crate) fn normalize_weights(weights: Array1<f64>) -> Result<Array1<f64>> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(MixtureError::ConfigError(
            "entries of 'weights' must be finite and non-negative".to_string(),
        ));
    }
    let total = weights.sum();
    if total <= 0.0 {
        return Err(MixtureError::ConfigError(
            "entries of 'weights' cannot sum to zero".to_string(),
        ));
    }
    Ok(weights / total)
}

/// Shape of the covariance matrices of a directly constructed mixture
///
/// Every variant resolves to a (k, p, p) array of per-component matrices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum CovarianceSpec {
    /// Identity matrix for every component
    #[default]
    Identity,
    /// `v · I` for every component
    Isotropic(f64),
    /// `v_j · I` for component `j` (length k)
    PerComponentIsotropic(Array1<f64>),
    /// The same diagonal matrix for every component (length p)
    SharedDiagonal(Array1<f64>),
    /// The same (p, p) matrix for every component
    Shared(Array2<f64>),
    /// One (p, p) matrix per component, shape (k, p, p)
    Full(Array3<f64>),
}

impl CovarianceSpec {
    /// Expand into the canonical (k, p, p) form
    pub fn resolve(&self, k: usize, p: usize) -> Result<Array3<f64>> {
        let eye = Array2::<f64>::eye(p);
        let mut covs = Array3::zeros((k, p, p));

        match self {
            CovarianceSpec::Identity => {
                for mut cov in covs.outer_iter_mut() {
                    cov.assign(&eye);
                }
            }
            CovarianceSpec::Isotropic(v) => {
                check_variance("covs", *v)?;
                for mut cov in covs.outer_iter_mut() {
                    cov.assign(&(&eye * *v));
                }
            }
            CovarianceSpec::PerComponentIsotropic(vs) => {
                if vs.len() != k {
                    return Err(MixtureError::shape(
                        format!("{} per-component variances", k),
                        format!("{}", vs.len()),
                    ));
                }
                for (mut cov, &v) in covs.outer_iter_mut().zip(vs.iter()) {
                    check_variance("covs", v)?;
                    cov.assign(&(&eye * v));
                }
            }
            CovarianceSpec::SharedDiagonal(diag) => {
                if diag.len() != p {
                    return Err(MixtureError::shape(
                        format!("diagonal of length {}", p),
                        format!("length {}", diag.len()),
                    ));
                }
                for &v in diag.iter() {
                    check_variance("covs", v)?;
                }
                let matrix = Array2::from_diag(diag);
                for mut cov in covs.outer_iter_mut() {
                    cov.assign(&matrix);
                }
            }
            CovarianceSpec::Shared(matrix) => {
                if matrix.dim() != (p, p) {
                    return Err(MixtureError::shape(
                        format!("({}, {}) covariance matrix", p, p),
                        format!("{:?}", matrix.shape()),
                    ));
                }
                for mut cov in covs.outer_iter_mut() {
                    cov.assign(matrix);
                }
            }
            CovarianceSpec::Full(all) => {
                if all.dim() != (k, p, p) {
                    return Err(MixtureError::shape(
                        format!("({}, {}, {}) covariance array", k, p, p),
                        format!("{:?}", all.shape()),
                    ));
                }
                covs.assign(all);
            }
        }

        Ok(covs)
    }
}

fn check_variance(name: &str, v: f64) -> Result<()> {
    if !v.is_finite() || v < 0.0 {
        return Err(MixtureError::invalid_parameter(
            name,
            v,
            "variances must be finite and non-negative",
        ));
    }
    Ok(())
}
