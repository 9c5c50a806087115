//! Utility functions and types

pub mod parallel;
pub mod validation;

pub use parallel::{map_indexed, ParallelConfig};
pub use validation::{
    validate_columns, validate_min, validate_non_negative, validate_positive, validate_sample,
};
