//! Parallel scheduling of independent fitting attempts

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MixtureError, Result};

/// Configuration for parallel processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Run independent attempts on a thread pool
    pub enabled: bool,
    /// Number of threads (None = use all available)
    pub n_threads: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            n_threads: None,
        }
    }
}

impl ParallelConfig {
    /// Create a new (sequential) parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable parallel execution
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            n_threads: None,
        }
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

/// Map `f` over `0..n`, returning the results in index order.
///
/// Each call of `f` must depend only on its index, so the sequential and
/// the pooled schedule produce the same vector.
pub fn map_indexed<U, F>(config: &ParallelConfig, n: usize, f: F) -> Result<Vec<U>>
where
    U: Send,
    F: Fn(usize) -> U + Send + Sync,
{
    if !config.enabled || n <= 1 {
        return Ok((0..n).map(f).collect());
    }

    match config.n_threads {
        None => Ok((0..n).into_par_iter().map(f).collect()),
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| MixtureError::ConfigError(format!("thread pool: {}", e)))?;
            Ok(pool.install(|| (0..n).into_par_iter().map(f).collect()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_indexed_sequential() {
        let results = map_indexed(&ParallelConfig::new(), 100, |i| i * 2).unwrap();
        assert_eq!(results.len(), 100);
        assert_eq!(results[0], 0);
        assert_eq!(results[50], 100);
    }

    #[test]
    fn test_map_indexed_matches_sequential() {
        let seq = map_indexed(&ParallelConfig::new(), 257, |i| (i as f64).sqrt()).unwrap();
        let par = map_indexed(&ParallelConfig::enabled().with_threads(4), 257, |i| {
            (i as f64).sqrt()
        })
        .unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_parallel_config() {
        let config = ParallelConfig::enabled().with_threads(4);
        assert!(config.enabled);
        assert_eq!(config.num_threads(), 4);
        assert!(!ParallelConfig::default().enabled);
    }
}
