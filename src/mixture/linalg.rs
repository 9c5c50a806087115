//! Small dense linear algebra for covariance matrices

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Cholesky factor `L` (lower triangular, `A = L Lᵀ`) of a positive definite matrix.
///
/// Returns `None` when a pivot is not strictly positive, i.e. the matrix is
/// singular, indefinite or contains non-finite entries.
pub(crate) fn cholesky(a: ArrayView2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let d = a[[j, j]] - sum;
                if !(d.is_finite() && d > f64::EPSILON * a[[j, j]].abs()) {
                    return None;
                }
                l[[j, j]] = d.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Cholesky-style factor of a positive semi-definite matrix.
///
/// Zero pivots (up to a tolerance relative to the largest diagonal entry)
/// produce zero columns, so `L Lᵀ` still reproduces `A`. Returns `None` for
/// matrices with a clearly negative pivot.
pub(crate) fn cholesky_psd(a: ArrayView2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let scale = a.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let tol = 1e-10 * scale.max(f64::MIN_POSITIVE);
    let mut l = Array2::zeros((n, n));

    for j in 0..n {
        let mut d = a[[j, j]];
        for k in 0..j {
            d -= l[[j, k]] * l[[j, k]];
        }
        if !d.is_finite() || d < -tol {
            return None;
        }
        if d <= tol {
            continue;
        }
        let pivot = d.sqrt();
        l[[j, j]] = pivot;
        for i in (j + 1)..n {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = sum / pivot;
        }
    }
    Some(l)
}

/// Solve `L z = b` for lower triangular `L` with a non-zero diagonal
pub(crate) fn solve_lower_triangular(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut z = Array1::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[[i, j]] * z[j];
        }
        z[i] = sum / l[[i, i]];
    }
    z
}

/// `ln det(A)` from the Cholesky factor of `A`
pub(crate) fn log_det(l: &Array2<f64>) -> f64 {
    2.0 * l.diag().iter().map(|v| v.ln()).sum::<f64>()
}

pub(crate) fn is_symmetric(a: ArrayView2<f64>) -> bool {
    let n = a.nrows();
    if a.ncols() != n {
        return false;
    }
    for i in 0..n {
        for j in (i + 1)..n {
            let (x, y) = (a[[i, j]], a[[j, i]]);
            if (x - y).abs() > 1e-8 * x.abs().max(y.abs()).max(1.0) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cholesky_reconstructs() {
        let a = array![[4.0, 2.0, 0.6], [2.0, 5.0, 1.0], [0.6, 1.0, 3.0]];
        let l = cholesky(a.view()).unwrap();
        let back = l.dot(&l.t());
        for (x, y) in a.iter().zip(back.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
        assert!((log_det(&l) - 44.6_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn test_cholesky_rejects_singular() {
        assert!(cholesky(array![[1.0, 1.0], [1.0, 1.0]].view()).is_none());
        assert!(cholesky(array![[0.0]].view()).is_none());
        assert!(cholesky(array![[1.0, 2.0], [2.0, 1.0]].view()).is_none());
    }

    #[test]
    fn test_cholesky_psd_accepts_singular() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        let l = cholesky_psd(a.view()).unwrap();
        let back = l.dot(&l.t());
        for (x, y) in a.iter().zip(back.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
        assert!(cholesky_psd(array![[-1.0]].view()).is_none());
    }

    #[test]
    fn test_solve_lower() {
        let l = array![[2.0, 0.0], [1.0, 3.0]];
        let z = solve_lower_triangular(&l, array![4.0, 11.0].view());
        assert!((z[0] - 2.0).abs() < 1e-12);
        assert!((z[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_is_symmetric() {
        assert!(is_symmetric(array![[1.0, 0.5], [0.5, 2.0]].view()));
        assert!(!is_symmetric(array![[1.0, 0.5], [0.4, 2.0]].view()));
        assert!(!is_symmetric(array![[1.0, 0.5]].view()));
    }
}
