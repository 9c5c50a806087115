//! Gaussian mixture model facade

use ndarray::{Array1, Array2, Array3};
use rand::RngCore;
use tracing::warn;

use super::density::{component_densities, log_likelihood, shared_rng, GaussianMixtureDensity, SharedRng};
use super::em::{responsibilities, LikelihoodTrace};
use super::fit::{fit_mixture, AttemptFailure, FitConfig};
use super::params::MixtureParameters;
use crate::error::{MixtureError, Result};
use crate::utils::{validate_columns, validate_min};

/// Gaussian mixture model fitted with multi-start EM
///
/// ```ignore
/// let mut gmm = GaussianMixture::new(2)?.with_random_state(7);
/// gmm.fit(&x, &FitConfig::default())?;
/// let labels = gmm.predict(&x)?;
/// let bic = gmm.bic(&x)?;
/// ```
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    k: usize,
    params: Option<MixtureParameters>,
    scores: Vec<Option<LikelihoodTrace>>,
    failures: Vec<AttemptFailure>,
    best_attempt: Option<usize>,
    rng: SharedRng,
}

impl GaussianMixture {
    /// Create an unfitted model with `k` components
    pub fn new(k: usize) -> Result<Self> {
        validate_min("k", k, 1)?;
        Ok(Self {
            k,
            params: None,
            scores: Vec::new(),
            failures: Vec::new(),
            best_attempt: None,
            rng: shared_rng(42),
        })
    }

    /// Reseed the model's generator
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.rng = shared_rng(seed);
        self
    }

    /// A fitted model with known parameters, e.g. restored from JSON
    pub fn from_parameters(params: MixtureParameters) -> Self {
        Self {
            k: params.k(),
            params: Some(params),
            scores: Vec::new(),
            failures: Vec::new(),
            best_attempt: None,
            rng: shared_rng(42),
        }
    }

    /// Fit the model to an (n, p) sample.
    ///
    /// Replaces any earlier fit. On error the model keeps its previous state.
    pub fn fit(&mut self, x: &Array2<f64>, config: &FitConfig) -> Result<&mut Self> {
        let seed = self.rng.lock().next_u64();
        let outcome = fit_mixture(x, self.k, config, seed)?;

        self.params = Some(outcome.parameters);
        self.scores = outcome.traces;
        self.failures = outcome.failures;
        self.best_attempt = Some(outcome.best_attempt);
        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn p(&self) -> Result<usize> {
        Ok(self.fitted()?.p())
    }

    pub fn parameters(&self) -> Result<&MixtureParameters> {
        self.fitted()
    }

    pub fn means(&self) -> Result<&Array2<f64>> {
        Ok(&self.fitted()?.means)
    }

    pub fn covs(&self) -> Result<&Array3<f64>> {
        Ok(&self.fitted()?.covs)
    }

    pub fn weights(&self) -> Result<&Array1<f64>> {
        Ok(&self.fitted()?.weights)
    }

    /// Log-likelihood trace of every attempt of the last fit, indexed by
    /// attempt; `None` for an attempt discarded as degenerate
    pub fn scores(&self) -> Result<&[Option<LikelihoodTrace>]> {
        self.fitted()?;
        Ok(&self.scores)
    }

    /// Trace of the attempt the fitted parameters came from
    pub fn best_trace(&self) -> Result<Option<&LikelihoodTrace>> {
        self.fitted()?;
        Ok(self
            .best_attempt
            .and_then(|r| self.scores.get(r))
            .and_then(Option::as_ref))
    }

    /// Attempts of the last fit that were discarded as degenerate
    pub fn failures(&self) -> Result<&[AttemptFailure]> {
        self.fitted()?;
        Ok(&self.failures)
    }

    /// Index of the attempt the fitted parameters came from
    pub fn best_attempt(&self) -> Option<usize> {
        self.best_attempt
    }

    /// Component labels `0..k`
    pub fn classes(&self) -> Array1<usize> {
        Array1::from_iter(0..self.k)
    }

    /// Posterior membership probabilities, one row per observation
    pub fn predict_prob(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.checked(x)?;
        let densities = component_densities(x, &params.means, &params.covs)?;
        responsibilities(&densities, &params.weights)
    }

    /// Most probable component of each observation
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let gamma = self.predict_prob(x)?;
        Ok(gamma
            .outer_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (j, &g)| {
                        if g > best.1 {
                            (j, g)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect())
    }

    /// Log-likelihood of `x` under the fitted mixture
    pub fn log_likelihood(&self, x: &Array2<f64>) -> Result<f64> {
        let params = self.checked(x)?;
        let densities = component_densities(x, &params.means, &params.covs)?;
        Ok(log_likelihood(&densities, &params.weights))
    }

    /// Number of free parameters: means, symmetric covariances and k - 1 weights
    pub fn n_parameters(&self) -> Result<usize> {
        Ok(self.fitted()?.n_parameters())
    }

    /// Akaike information criterion.
    ///
    /// With `correction` the small-sample AICc is returned instead. AICc is
    /// undefined when `n - m - 1 <= 0`; the result is then +inf.
    pub fn aic(&self, x: &Array2<f64>, correction: bool) -> Result<f64> {
        let ll = self.log_likelihood(x)?;
        let m = self.n_parameters()? as f64;
        if !correction {
            return Ok(2.0 * m - 2.0 * ll);
        }

        let n = x.nrows() as f64;
        let denom = n - m - 1.0;
        if denom <= 0.0 {
            warn!(
                n = x.nrows(),
                n_parameters = m as usize,
                "AICc is undefined for n - m - 1 <= 0"
            );
            return Ok(f64::INFINITY);
        }
        Ok(2.0 * m * (m + 1.0) / denom - 2.0 * ll)
    }

    /// Bayesian information criterion
    pub fn bic(&self, x: &Array2<f64>) -> Result<f64> {
        let ll = self.log_likelihood(x)?;
        let m = self.n_parameters()? as f64;
        Ok((x.nrows() as f64).ln() * m - 2.0 * ll)
    }

    /// Density view of the fitted mixture sharing this model's generator
    pub fn pdf(&self) -> Result<GaussianMixtureDensity> {
        let params = self.fitted()?.clone();
        GaussianMixtureDensity::from_parameters(params, self.rng.clone())
    }

    fn fitted(&self) -> Result<&MixtureParameters> {
        self.params.as_ref().ok_or(MixtureError::ModelNotFitted)
    }

    fn checked(&self, x: &Array2<f64>) -> Result<&MixtureParameters> {
        let params = self.fitted()?;
        validate_columns(x, params.p())?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_point_mixture() -> GaussianMixture {
        let params = MixtureParameters::new(
            array![[0.0], [10.0]],
            Array3::from_elem((2, 1, 1), 1.0),
            array![0.5, 0.5],
        )
        .unwrap();
        GaussianMixture::from_parameters(params)
    }

    #[test]
    fn test_new_rejects_zero_components() {
        assert!(GaussianMixture::new(0).is_err());
        assert_eq!(GaussianMixture::new(3).unwrap().k(), 3);
    }

    #[test]
    fn test_unfitted_accessors_fail() {
        let gmm = GaussianMixture::new(2).unwrap();
        let x = array![[0.0], [1.0]];
        assert!(!gmm.is_fitted());
        assert!(matches!(gmm.predict_prob(&x), Err(MixtureError::ModelNotFitted)));
        assert!(matches!(gmm.log_likelihood(&x), Err(MixtureError::ModelNotFitted)));
        assert!(matches!(gmm.aic(&x, false), Err(MixtureError::ModelNotFitted)));
        assert!(matches!(gmm.bic(&x), Err(MixtureError::ModelNotFitted)));
        assert!(matches!(gmm.pdf(), Err(MixtureError::ModelNotFitted)));
        assert!(gmm.n_parameters().is_err());
        assert!(gmm.means().is_err());
    }

    #[test]
    fn test_predict_prob_rows_sum_to_one() {
        let gmm = two_point_mixture();
        let gamma = gmm.predict_prob(&array![[-1.0], [4.0], [5.0], [11.0]]).unwrap();
        for row in gamma.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!((gamma[[2, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_predict_and_classes() {
        let gmm = two_point_mixture();
        let labels = gmm.predict(&array![[-1.0], [9.0], [2.0]]).unwrap();
        assert_eq!(labels, array![0, 1, 0]);
        assert_eq!(gmm.classes(), array![0, 1]);
    }

    #[test]
    fn test_wrong_column_count() {
        let gmm = two_point_mixture();
        assert!(matches!(
            gmm.predict_prob(&array![[0.0, 1.0]]),
            Err(MixtureError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_information_criteria() {
        let gmm = two_point_mixture();
        let x = array![[0.0], [0.5], [10.0], [9.5], [1.0], [11.0], [-0.5], [10.5]];
        let ll = gmm.log_likelihood(&x).unwrap();
        assert_eq!(gmm.n_parameters().unwrap(), 5);

        let aic = gmm.aic(&x, false).unwrap();
        assert!((aic - (10.0 - 2.0 * ll)).abs() < 1e-9);

        let aicc = gmm.aic(&x, true).unwrap();
        assert!((aicc - (2.0 * 5.0 * 6.0 / 2.0 - 2.0 * ll)).abs() < 1e-9);

        let bic = gmm.bic(&x).unwrap();
        assert!((bic - (8.0_f64.ln() * 5.0 - 2.0 * ll)).abs() < 1e-9);
    }

    #[test]
    fn test_aicc_undefined_for_small_sample() {
        let gmm = two_point_mixture();
        // n = m + 1
        let x = array![[0.0], [1.0], [9.0], [10.0], [11.0], [2.0]];
        assert_eq!(gmm.aic(&x, true).unwrap(), f64::INFINITY);
        assert!(gmm.aic(&x, false).unwrap().is_finite());
    }

    #[test]
    fn test_pdf_shares_generator() {
        let gmm = two_point_mixture();
        let view = gmm.pdf().unwrap();
        assert!(std::sync::Arc::ptr_eq(view.rng(), &gmm.rng));
        assert_eq!(view.means(), gmm.means().unwrap());
    }
}
