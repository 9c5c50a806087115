//! K-Means clustering with k-means++ initialization

use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::Clusterer;
use crate::error::{MixtureError, Result};
use crate::preprocessing::StandardScaler;

/// Options for the k-means partition used to seed EM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansConfig {
    pub max_iter: usize,
    pub tol: f64,
    /// Standardize features before computing distances
    pub standardize: bool,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tol: 1e-4,
            standardize: true,
        }
    }
}

/// K-Means clustering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub standardize: bool,
    pub random_state: Option<u64>,
    /// Fitted cluster centroids (n_clusters × n_features), in scaled space
    centroids: Option<Array2<f64>>,
    scaler: Option<StandardScaler>,
    /// Sum of squared distances to nearest centroid (inertia)
    pub inertia: Option<f64>,
    pub is_fitted: bool,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(3)
    }
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        let defaults = KMeansConfig::default();
        Self {
            n_clusters,
            max_iter: defaults.max_iter,
            tol: defaults.tol,
            standardize: defaults.standardize,
            random_state: Some(42),
            centroids: None,
            scaler: None,
            inertia: None,
            is_fitted: false,
        }
    }

    /// Build an unfitted model from a config block
    pub fn from_config(n_clusters: usize, config: &KMeansConfig) -> Self {
        Self::new(n_clusters)
            .with_max_iter(config.max_iter)
            .with_tol(config.tol)
            .with_standardize(config.standardize)
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// K-means++ initialization: pick centroids spread apart
    fn kmeans_pp_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((k, x.ncols()));

        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&x.row(first));

        for c in 1..k {
            // Distance to nearest existing centroid
            let dists: Vec<f64> = (0..n_samples)
                .map(|i| {
                    (0..c)
                        .map(|j| Self::euclidean_sq(&x.row(i), &centroids.row(j)))
                        .fold(f64::MAX, f64::min)
                })
                .collect();

            // Weighted random selection proportional to D²
            let total: f64 = dists.iter().sum();
            if total <= 0.0 {
                let idx = rng.gen_range(0..n_samples);
                centroids.row_mut(c).assign(&x.row(idx));
                continue;
            }

            let r = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = n_samples - 1;
            for (i, &d) in dists.iter().enumerate() {
                cumulative += d;
                if cumulative >= r {
                    chosen = i;
                    break;
                }
            }
            centroids.row_mut(c).assign(&x.row(chosen));
        }

        centroids
    }

    fn euclidean_sq(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
    }

    fn nearest(row: &ArrayView1<f64>, centroids: &Array2<f64>) -> usize {
        let mut best_c = 0;
        let mut best_dist = f64::MAX;
        for (c, centroid) in centroids.outer_iter().enumerate() {
            let d = Self::euclidean_sq(row, &centroid);
            if d < best_dist {
                best_dist = d;
                best_c = c;
            }
        }
        best_c
    }

    fn assign(x: &Array2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
        (0..x.nrows())
            .into_par_iter()
            .map(|i| Self::nearest(&x.row(i), centroids))
            .collect()
    }

    fn prepare(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match &self.scaler {
            Some(scaler) => scaler.transform(x),
            None => Ok(x.clone()),
        }
    }

    /// Get cluster centroids (in the standardized space when `standardize` is set)
    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }
}

impl Clusterer for KMeans {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if self.n_clusters == 0 {
            return Err(MixtureError::invalid_parameter(
                "n_clusters",
                self.n_clusters,
                "must be at least 1",
            ));
        }
        if n_samples < self.n_clusters {
            return Err(MixtureError::invalid_parameter(
                "n_clusters",
                self.n_clusters,
                format!("exceeds the number of observations ({})", n_samples),
            ));
        }

        self.scaler = if self.standardize {
            let mut scaler = StandardScaler::new();
            scaler.fit(x)?;
            Some(scaler)
        } else {
            None
        };
        let data = self.prepare(x)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(42));
        let mut centroids = Self::kmeans_pp_init(&data, self.n_clusters, &mut rng);
        let mut labels = vec![usize::MAX; n_samples];

        for _iter in 0..self.max_iter {
            // Assignment step
            let new_labels = Self::assign(&data, &centroids);
            let changed = new_labels
                .iter()
                .zip(labels.iter())
                .filter(|(a, b)| a != b)
                .count();
            labels = new_labels;

            // Update step
            let mut new_centroids = Array2::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (row, &c) in data.outer_iter().zip(labels.iter()) {
                counts[c] += 1;
                let mut target = new_centroids.row_mut(c);
                target += &row;
            }

            for (c, &count) in counts.iter().enumerate() {
                if count > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / count as f64);
                } else {
                    // Empty cluster: reseed on a random observation
                    let idx = rng.gen_range(0..n_samples);
                    new_centroids.row_mut(c).assign(&data.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();

            centroids = new_centroids;

            if changed == 0 || shift < self.tol {
                break;
            }
        }

        let labels = Self::assign(&data, &centroids);
        let inertia: f64 = data
            .outer_iter()
            .zip(labels.iter())
            .map(|(row, &c)| Self::euclidean_sq(&row, &centroids.row(c)))
            .sum();

        self.centroids = Some(centroids);
        self.inertia = Some(inertia);
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let centroids = self.centroids.as_ref().ok_or(MixtureError::ModelNotFitted)?;
        let data = self.prepare(x)?;
        if data.ncols() != centroids.ncols() {
            return Err(MixtureError::shape(
                format!("{} columns", centroids.ncols()),
                format!("{} columns", data.ncols()),
            ));
        }
        Ok(Array1::from_vec(Self::assign(&data, centroids)))
    }

    fn n_clusters(&self) -> usize {
        self.n_clusters
    }
}
