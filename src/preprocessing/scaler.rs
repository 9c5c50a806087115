//! Feature scaling implementations

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{MixtureError, Result};

/// Standard scaling (z-score normalization): (x - mean) / std
///
/// Columns with zero spread keep a scale of 1 so they pass through centred
/// but otherwise unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    center: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    /// Create a new scaler
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(MixtureError::InvalidInput(
                "cannot fit a scaler on an empty sample".to_string(),
            ));
        }

        let center = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MixtureError::InvalidInput("empty sample".to_string()))?;
        let scale = x.std_axis(Axis(0), 0.0).mapv(|s| {
            if s > f64::EPSILON && s.is_finite() {
                s
            } else {
                1.0
            }
        });

        self.center = Some(center);
        self.scale = Some(scale);
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (center, scale) = match (&self.center, &self.scale) {
            (Some(c), Some(s)) => (c, s),
            _ => return Err(MixtureError::ModelNotFitted),
        };
        if x.ncols() != center.len() {
            return Err(MixtureError::shape(
                format!("{} columns", center.len()),
                format!("{} columns", x.ncols()),
            ));
        }
        Ok((x - center) / scale)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn is_fitted(&self) -> bool {
        self.center.is_some()
    }
}
