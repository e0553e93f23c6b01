//! Factorisation of covariance matrices into independent components.
//!
//! `cov = L Lᵀ` with `L` lower triangular. Positive-definite input goes through
//! nalgebra's Cholesky; semi-definite input (zero variances, perfect
//! correlations) falls back to an outer-product Cholesky that leaves the
//! columns of zero pivots empty.

use ae_core::{Error, Result};
use nalgebra::DMatrix;

/// Pivots within this fraction of the largest variance count as zero.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Off-diagonal residual allowed below a zero pivot, relative to the largest variance.
const RESIDUAL_TOLERANCE: f64 = 1e-6;

/// Lower-triangular `L` with `cov = L Lᵀ` for a symmetric positive semi-definite `cov`.
///
/// Fails with [`Error::InvalidInput`] for empty, non-square, non-finite or
/// non-symmetric input and with [`Error::NotPositiveSemiDefinite`] when a
/// pivot is negative beyond tolerance.
pub fn decompose_covariance(cov: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = cov.nrows();
    if cov.ncols() != n || n == 0 {
        return Err(Error::InvalidInput(format!(
            "covariance must be square and non-empty, got {}x{}",
            n,
            cov.ncols()
        )));
    }
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput("covariance has non-finite entries".into()));
    }
    let scale = cov.diagonal().iter().fold(0.0f64, |acc, &v| acc.max(v.abs()));
    for i in 0..n {
        for j in 0..i {
            let (a, b) = (cov[(i, j)], cov[(j, i)]);
            if (a - b).abs() > 1e-12 * a.abs().max(b.abs()).max(scale).max(f64::MIN_POSITIVE) {
                return Err(Error::InvalidInput(format!(
                    "covariance is not symmetric: ({i},{j})={a} vs ({j},{i})={b}"
                )));
            }
        }
    }

    if let Some(chol) = cov.clone().cholesky() {
        return Ok(chol.l());
    }
    log::debug!("covariance is not positive definite; trying semi-definite factorisation");
    semidefinite_cholesky(cov, scale)
}

fn semidefinite_cholesky(cov: &DMatrix<f64>, scale: f64) -> Result<DMatrix<f64>> {
    let n = cov.nrows();
    let tol = PIVOT_TOLERANCE * scale;
    let mut l = DMatrix::<f64>::zeros(n, n);

    for j in 0..n {
        let mut pivot = cov[(j, j)];
        for k in 0..j {
            pivot -= l[(j, k)] * l[(j, k)];
        }
        if pivot < -tol {
            return Err(Error::NotPositiveSemiDefinite { index: j, pivot });
        }

        if pivot <= tol {
            // Zero variance left: the rest of the column must vanish too.
            for i in (j + 1)..n {
                let mut r = cov[(i, j)];
                for k in 0..j {
                    r -= l[(i, k)] * l[(j, k)];
                }
                if r.abs() > RESIDUAL_TOLERANCE * scale {
                    return Err(Error::NotPositiveSemiDefinite { index: j, pivot });
                }
            }
            continue;
        }

        let d = pivot.sqrt();
        l[(j, j)] = d;
        for i in (j + 1)..n {
            let mut r = cov[(i, j)];
            for k in 0..j {
                r -= l[(i, k)] * l[(j, k)];
            }
            l[(i, j)] = r / d;
        }
    }
    Ok(l)
}
