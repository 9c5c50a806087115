//! Data preprocessing
//!
//! Feature standardization used ahead of distance-based clustering.

mod scaler;

pub use scaler::StandardScaler;
