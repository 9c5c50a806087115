//! Clustering
//!
//! Hard partitioning of a sample into `k` groups. The mixture fitter uses a
//! [`Clusterer`] to build its first starting point.

mod kmeans;

pub use kmeans::{KMeans, KMeansConfig};

use ndarray::{Array1, Array2};

use crate::error::Result;

/// Common interface for unsupervised hard-clustering models
pub trait Clusterer {
    /// Fit the model on a sample (rows are observations)
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Cluster index in `0..n_clusters()` for each row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>>;

    fn n_clusters(&self) -> usize;
}
