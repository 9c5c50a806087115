//! Parameter and sample validation
//!
//! Every check runs before any numeric work and fails with a descriptive
//! [`MixtureError`].

use ndarray::Array2;

use crate::error::{MixtureError, Result};

/// Reject empty samples and samples containing NaN or infinite values.
pub fn validate_sample(x: &Array2<f64>) -> Result<()> {
    let (n, p) = x.dim();
    if n == 0 || p == 0 {
        return Err(MixtureError::InvalidInput(format!(
            "sample must be a non-empty matrix, got shape ({}, {})",
            n, p
        )));
    }
    if let Some(pos) = x.iter().position(|v| !v.is_finite()) {
        return Err(MixtureError::InvalidInput(format!(
            "sample contains a non-finite value at row {}, column {}",
            pos / p,
            pos % p
        )));
    }
    Ok(())
}

/// Validate a sample whose column count must equal `p`.
pub fn validate_columns(x: &Array2<f64>, p: usize) -> Result<()> {
    validate_sample(x)?;
    if x.ncols() != p {
        return Err(MixtureError::shape(
            format!("{} columns", p),
            format!("{} columns", x.ncols()),
        ));
    }
    Ok(())
}

/// Integer lower bound.
pub fn validate_min(name: &str, value: usize, minimum: usize) -> Result<usize> {
    if value < minimum {
        return Err(MixtureError::invalid_parameter(
            name,
            value,
            format!("must be at least {}", minimum),
        ));
    }
    Ok(value)
}

/// Finite, strictly positive float.
pub fn validate_positive(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(MixtureError::invalid_parameter(
            name,
            value,
            "must be a finite positive number",
        ));
    }
    Ok(value)
}

/// Finite, non-negative float.
pub fn validate_non_negative(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(MixtureError::invalid_parameter(
            name,
            value,
            "must be a finite non-negative number",
        ));
    }
    Ok(value)
}
