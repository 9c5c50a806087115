//! Gaussian densities and the mixture density view
//!
//! [`component_densities`] evaluates every component at every observation;
//! [`GaussianMixtureDensity`] bundles a parameter set with a random
//! generator for density evaluation and sampling.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array1, Array2, Array3};
use parking_lot::Mutex;
use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use super::linalg::{cholesky, cholesky_psd, log_det, solve_lower_triangular};
use super::params::{CovarianceSpec, MixtureParameters};
use crate::error::{MixtureError, Result};
use crate::utils::{validate_columns, validate_min};

/// Random generator handle shared between a fitted model and its density views
pub type SharedRng = Arc<Mutex<ChaCha8Rng>>;

/// Create a [`SharedRng`] from a seed
pub fn shared_rng(seed: u64) -> SharedRng {
    Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed)))
}

/// Multivariate normal density of each component at each observation.
///
/// Returns an (n, k) matrix whose (i, j) entry is `N(x_i | means_j, covs_j)`.
/// Fails with a degeneracy naming the component when a covariance matrix is
/// not positive definite.
pub fn component_densities(
    x: &Array2<f64>,
    means: &Array2<f64>,
    covs: &Array3<f64>,
) -> Result<Array2<f64>> {
    let (k, p) = means.dim();
    if covs.dim() != (k, p, p) {
        return Err(MixtureError::shape(
            format!("covs of shape ({}, {}, {})", k, p, p),
            format!("{:?}", covs.shape()),
        ));
    }
    if x.ncols() != p {
        return Err(MixtureError::shape(
            format!("{} columns", p),
            format!("{} columns", x.ncols()),
        ));
    }

    let mut densities = Array2::zeros((x.nrows(), k));
    let log_norm_const = -0.5 * p as f64 * (2.0 * PI).ln();

    for j in 0..k {
        let l = cholesky(covs.index_axis(ndarray::Axis(0), j)).ok_or_else(|| {
            MixtureError::degenerate(format!(
                "covariance matrix of component {} is not positive definite",
                j
            ))
        })?;
        let log_norm = log_norm_const - 0.5 * log_det(&l);
        let mean = means.row(j);

        for (i, row) in x.outer_iter().enumerate() {
            let diff = &row - &mean;
            let z = solve_lower_triangular(&l, diff.view());
            densities[[i, j]] = (log_norm - 0.5 * z.dot(&z)).exp();
        }
    }

    Ok(densities)
}

/// Mixture log-likelihood `Σ_i ln Σ_j w_j densities[i, j]`
pub fn log_likelihood(densities: &Array2<f64>, weights: &Array1<f64>) -> f64 {
    densities.dot(weights).mapv(f64::ln).sum()
}

/// An immutable Gaussian mixture usable for density evaluation and sampling
///
/// Constructed either directly from means, a [`CovarianceSpec`] and weights,
/// or as a snapshot of a fitted [`GaussianMixture`](super::GaussianMixture).
#[derive(Debug, Clone)]
pub struct GaussianMixtureDensity {
    params: MixtureParameters,
    /// Per-component factors `L` with `L Lᵀ = cov`, used for sampling
    factors: Vec<Array2<f64>>,
    rng: SharedRng,
}

impl GaussianMixtureDensity {
    /// Build a mixture from (k, p) means.
    ///
    /// `weights` default to uniform and are otherwise rescaled to sum to 1.
    /// `random_state` seeds the generator (42 when absent).
    pub fn new(
        means: Array2<f64>,
        covs: CovarianceSpec,
        weights: Option<Array1<f64>>,
        random_state: Option<u64>,
    ) -> Result<Self> {
        let (k, p) = means.dim();
        if k == 0 || p == 0 {
            return Err(MixtureError::ConfigError(
                "parameter 'means' cannot be empty".to_string(),
            ));
        }
        let covs = covs.resolve(k, p)?;
        let weights = match weights {
            Some(w) => w,
            None => Array1::from_elem(k, 1.0 / k as f64),
        };
        let params = MixtureParameters::new(means, covs, weights)?;
        Self::from_parameters(params, shared_rng(random_state.unwrap_or(42)))
    }

    /// Build a one-dimensional mixture from a length-k vector of means
    pub fn from_vector_means(
        means: Array1<f64>,
        covs: CovarianceSpec,
        weights: Option<Array1<f64>>,
        random_state: Option<u64>,
    ) -> Result<Self> {
        let k = means.len();
        let means = means
            .into_shape_with_order((k, 1))
            .map_err(|e| MixtureError::ConfigError(e.to_string()))?;
        Self::new(means, covs, weights, random_state)
    }

    /// Wrap validated parameters together with an existing generator handle
    pub fn from_parameters(params: MixtureParameters, rng: SharedRng) -> Result<Self> {
        let factors = params
            .covs
            .outer_iter()
            .enumerate()
            .map(|(j, cov)| {
                cholesky_psd(cov).ok_or_else(|| {
                    MixtureError::ConfigError(format!(
                        "covariance matrix of component {} is not positive semi-definite",
                        j
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            params,
            factors,
            rng,
        })
    }

    pub fn k(&self) -> usize {
        self.params.k()
    }

    pub fn p(&self) -> usize {
        self.params.p()
    }

    pub fn means(&self) -> &Array2<f64> {
        &self.params.means
    }

    pub fn covs(&self) -> &Array3<f64> {
        &self.params.covs
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.params.weights
    }

    pub fn parameters(&self) -> &MixtureParameters {
        &self.params
    }

    /// The generator handle; shared with the model this view came from
    pub fn rng(&self) -> &SharedRng {
        &self.rng
    }

    /// Mixture density `Σ_j w_j N(x_i | μ_j, Σ_j)` for each row of `x`
    pub fn evaluate(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        validate_columns(x, self.p())?;
        let densities = component_densities(x, &self.params.means, &self.params.covs)?;
        Ok(densities.dot(&self.params.weights))
    }

    /// Draw `n` observations, returned as an (n, p) matrix
    pub fn sample(&self, n: usize) -> Result<Array2<f64>> {
        self.sample_with_components(n).map(|(x, _)| x)
    }

    /// Draw `n` observations together with the index of the component each
    /// one was drawn from
    pub fn sample_with_components(&self, n: usize) -> Result<(Array2<f64>, Array1<usize>)> {
        validate_min("n", n, 1)?;
        let p = self.p();
        let categorical = WeightedIndex::new(self.params.weights.iter())
            .map_err(|e| MixtureError::ConfigError(format!("weights: {}", e)))?;

        let mut rng = self.rng.lock();
        let mut x = Array2::zeros((n, p));
        let mut components = Array1::zeros(n);

        for i in 0..n {
            let j = categorical.sample(&mut *rng);
            let z: Array1<f64> = (0..p)
                .map(|_| -> f64 { StandardNormal.sample(&mut *rng) })
                .collect();
            let draw = &self.params.means.row(j) + &self.factors[j].dot(&z);
            x.row_mut(i).assign(&draw);
            components[i] = j;
        }

        Ok((x, components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_component_densities_standard_normal() {
        let x = array![[0.0], [1.0]];
        let densities =
            component_densities(&x, &array![[0.0]], &Array3::from_elem((1, 1, 1), 1.0)).unwrap();
        let phi0 = 1.0 / (2.0 * PI).sqrt();
        assert!((densities[[0, 0]] - phi0).abs() < 1e-12);
        assert!((densities[[1, 0]] - phi0 * (-0.5_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_component_densities_bivariate() {
        // Independent coordinates: the joint density factorizes
        let covs = array![[[1.0, 0.0], [0.0, 4.0]]];
        let x = array![[1.0, 2.0]];
        let densities = component_densities(&x, &array![[0.0, 0.0]], &covs).unwrap();
        let f1 = (-0.5_f64).exp() / (2.0 * PI).sqrt();
        let f2 = (-0.5_f64).exp() / (2.0 * PI * 4.0).sqrt();
        assert!((densities[[0, 0]] - f1 * f2).abs() < 1e-12);
    }

    #[test]
    fn test_component_densities_singular_covariance() {
        let covs = array![[[1.0]], [[0.0]]];
        let err = component_densities(&array![[0.0]], &array![[0.0], [1.0]], &covs).unwrap_err();
        assert!(err.is_degenerate());
        assert!(err.to_string().contains("component 1"));
    }

    #[test]
    fn test_component_densities_shape_mismatch() {
        let covs = Array3::from_elem((1, 1, 1), 1.0);
        assert!(matches!(
            component_densities(&array![[0.0, 1.0]], &array![[0.0]], &covs),
            Err(MixtureError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_log_likelihood() {
        let densities = array![[0.5, 0.1], [0.2, 0.4]];
        let ll = log_likelihood(&densities, &array![0.5, 0.5]);
        assert!((ll - (0.3_f64.ln() + 0.3_f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_density_defaults() {
        let density =
            GaussianMixtureDensity::new(array![[0.0, 0.0], [1.0, 1.0]], CovarianceSpec::Identity, None, None)
                .unwrap();
        assert_eq!(density.k(), 2);
        assert_eq!(density.p(), 2);
        assert!((density.weights()[0] - 0.5).abs() < 1e-12);
        assert_eq!(density.covs()[[1, 1, 1]], 1.0);
    }

    #[test]
    fn test_evaluate_is_weighted_sum() {
        let density = GaussianMixtureDensity::from_vector_means(
            array![0.0, 3.0],
            CovarianceSpec::Identity,
            Some(array![1.0, 3.0]),
            None,
        )
        .unwrap();
        let values = density.evaluate(&array![[0.0]]).unwrap();
        let phi = |z: f64| (-0.5 * z * z).exp() / (2.0 * PI).sqrt();
        let expected = 0.25 * phi(0.0) + 0.75 * phi(3.0);
        assert!((values[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_wrong_columns() {
        let density =
            GaussianMixtureDensity::new(array![[0.0, 0.0]], CovarianceSpec::Identity, None, None).unwrap();
        assert!(matches!(
            density.evaluate(&array![[1.0]]),
            Err(MixtureError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_sample_with_components() {
        let density = GaussianMixtureDensity::from_vector_means(
            array![-100.0, 100.0],
            CovarianceSpec::Identity,
            None,
            Some(7),
        )
        .unwrap();
        let (x, components) = density.sample_with_components(500).unwrap();
        assert_eq!(x.dim(), (500, 1));
        for (value, &j) in x.column(0).iter().zip(components.iter()) {
            if j == 0 {
                assert!(*value < 0.0);
            } else {
                assert!(*value > 0.0);
            }
        }
    }

    #[test]
    fn test_sample_is_reproducible() {
        let make = || {
            GaussianMixtureDensity::new(
                array![[0.0, 0.0], [5.0, 5.0]],
                CovarianceSpec::Isotropic(2.0),
                None,
                Some(11),
            )
            .unwrap()
        };
        assert_eq!(make().sample(20).unwrap(), make().sample(20).unwrap());
    }

    #[test]
    fn test_sample_zero_rejected() {
        let density =
            GaussianMixtureDensity::new(array![[0.0]], CovarianceSpec::Identity, None, None).unwrap();
        assert!(density.sample(0).is_err());
    }

    #[test]
    fn test_sample_from_singular_covariance() {
        // Perfectly correlated coordinates: samples lie on the diagonal
        let density = GaussianMixtureDensity::new(
            array![[0.0, 0.0]],
            CovarianceSpec::Shared(array![[1.0, 1.0], [1.0, 1.0]]),
            None,
            Some(3),
        )
        .unwrap();
        let x = density.sample(50).unwrap();
        for row in x.outer_iter() {
            assert!((row[0] - row[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rejects_indefinite_covariance() {
        let result = GaussianMixtureDensity::new(
            array![[0.0, 0.0]],
            CovarianceSpec::Shared(array![[1.0, 2.0], [2.0, 1.0]]),
            None,
            None,
        );
        assert!(result.is_err());
    }
}
