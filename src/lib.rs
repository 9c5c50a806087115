//! Kolosal Mixture - Gaussian mixture models fitted with multi-start EM
//!
//! # Modules
//!
//! - [`mixture`] - EM fitting, density evaluation, sampling, information criteria
//! - [`cluster`] - K-Means used to seed EM
//! - [`preprocessing`] - Feature standardization
//! - [`utils`] - Parallel scheduling and input validation
//!
//! # Example
//!
//! ```ignore
//! use kolosal_mixture::prelude::*;
//!
//! let mut gmm = GaussianMixture::new(2)?.with_random_state(42);
//! gmm.fit(&x, &FitConfig::default().with_repeats(3))?;
//! let proba = gmm.predict_prob(&x)?;
//! let draws = gmm.pdf()?.sample(100)?;
//! ```

pub mod error;
pub mod mixture;
pub mod cluster;
pub mod preprocessing;
pub mod utils;

pub use error::{MixtureError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{MixtureError, Result};

    pub use crate::mixture::{
        fit_mixture, CovarianceSpec, FitConfig, FitOutcome, GaussianMixture,
        GaussianMixtureDensity, LikelihoodTrace, MixtureParameters,
    };

    pub use crate::cluster::{Clusterer, KMeans, KMeansConfig};
    pub use crate::preprocessing::StandardScaler;
    pub use crate::utils::ParallelConfig;
}
