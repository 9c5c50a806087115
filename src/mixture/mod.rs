//! Gaussian mixture estimation
//!
//! - [`GaussianMixture`] - fitted model: prediction, likelihood, AIC/BIC
//! - [`GaussianMixtureDensity`] - density evaluation and sampling
//! - [`fit_mixture`] - multi-start EM over independent attempts
//! - [`EmDriver`] - a single EM run to convergence
//! - [`ClusterInitializer`], [`RandomRestartInitializer`] - starting points

mod linalg;
pub mod density;
pub mod em;
pub mod fit;
pub mod init;
pub mod model;
pub mod params;

pub use density::{component_densities, log_likelihood, shared_rng, GaussianMixtureDensity, SharedRng};
pub use em::{responsibilities, update_parameters, EmDriver, EmOutcome, LikelihoodTrace, StopReason};
pub use fit::{fit_mixture, AttemptFailure, FitConfig, FitOutcome};
pub use init::{balanced_partition, ClusterInitializer, Initializer, RandomRestartInitializer};
pub use model::GaussianMixture;
pub use params::{n_parameters, CovarianceSpec, MixtureParameters};
