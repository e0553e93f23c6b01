//! Conversions between confidence levels, Gaussian sigmas and NLL thresholds.
//!
//! A two-sided `n`-sigma Gaussian interval covers `erf(n/√2)`; for one degree of
//! freedom the Minos threshold is `ΔNLL = n²/2`, and in general
//! `ΔNLL = χ²_dof⁻¹(CL) / 2`.

use ae_core::{Error, Result};
use statrs::distribution::{ChiSquared, Continuous, ContinuousCDF, Normal};
use statrs::function::erf::erf;

/// Coverage of a ±1σ Gaussian interval.
pub const ONE_SIGMA_LEVEL: f64 = 0.682_689_492_137_086;

/// Coverage of a ±2σ Gaussian interval.
pub const TWO_SIGMA_LEVEL: f64 = 0.954_499_736_103_642;

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| Error::InvalidInput(format!("standard normal: {e}")))
}

fn check_level(cl: f64) -> Result<()> {
    if !(cl > 0.0 && cl < 1.0) {
        return Err(Error::InvalidInput(format!("confidence level must be in (0, 1), got {cl}")));
    }
    Ok(())
}

/// Coverage probability of a symmetric `n`-sigma Gaussian interval.
pub fn sigma_to_confidence(n: f64) -> Result<f64> {
    if !n.is_finite() || n <= 0.0 {
        return Err(Error::InvalidInput(format!("sigma must be finite and > 0, got {n}")));
    }
    Ok(erf(n / std::f64::consts::SQRT_2))
}

/// Number of Gaussian sigmas whose symmetric interval covers `cl`.
pub fn confidence_to_sigma(cl: f64) -> Result<f64> {
    check_level(cl)?;
    Ok(standard_normal()?.inverse_cdf(0.5 + 0.5 * cl))
}

/// NLL rise `n²/2` matching an `n`-sigma interval in one dimension.
pub fn delta_nll_from_sigma(n: f64) -> f64 {
    0.5 * n * n
}

/// NLL rise corresponding to `cl` for `dof` jointly estimated parameters.
pub fn confidence_to_delta_nll(cl: f64, dof: u32) -> Result<f64> {
    check_level(cl)?;
    match dof {
        0 => Err(Error::InvalidInput("degrees of freedom must be >= 1".into())),
        1 => Ok(delta_nll_from_sigma(confidence_to_sigma(cl)?)),
        _ => {
            let chi2 = ChiSquared::new(dof as f64)
                .map_err(|e| Error::InvalidInput(format!("chi-square({dof}): {e}")))?;
            let q = refine_quantile(&chi2, cl, chi2.inverse_cdf(cl), (0.0, f64::INFINITY));
            Ok(0.5 * q)
        }
    }
}

/// Newton-polish a quantile estimate `x` of `dist` at probability `p`.
///
/// Steps that leave the open `support` or do not reduce `|cdf(x) - p|` are
/// rejected, so the result is never worse than the estimate.
pub fn refine_quantile<D>(dist: &D, p: f64, x: f64, support: (f64, f64)) -> f64
where
    D: ContinuousCDF<f64, f64> + Continuous<f64, f64>,
{
    let mut x = x;
    let mut err = dist.cdf(x) - p;
    for _ in 0..8 {
        let density = dist.pdf(x);
        if err == 0.0 || !(density > 0.0 && density.is_finite()) {
            break;
        }
        let next = x - err / density;
        if !(next > support.0 && next < support.1) {
            break;
        }
        let next_err = dist.cdf(next) - p;
        if next_err.abs() >= err.abs() {
            break;
        }
        (x, err) = (next, next_err);
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_known_levels() {
        assert_relative_eq!(sigma_to_confidence(1.0).unwrap(), ONE_SIGMA_LEVEL, epsilon = 1e-12);
        assert_relative_eq!(sigma_to_confidence(2.0).unwrap(), TWO_SIGMA_LEVEL, epsilon = 1e-12);
        assert_relative_eq!(confidence_to_sigma(0.6827).unwrap(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_sigma_round_trip() {
        for n in [1.0, 2.0, 3.0] {
            let cl = sigma_to_confidence(n).unwrap();
            assert_relative_eq!(confidence_to_sigma(cl).unwrap(), n, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_delta_nll_one_dof() {
        assert_relative_eq!(confidence_to_delta_nll(ONE_SIGMA_LEVEL, 1).unwrap(), 0.5, epsilon = 1e-6);
        assert_relative_eq!(confidence_to_delta_nll(TWO_SIGMA_LEVEL, 1).unwrap(), 2.0, epsilon = 1e-6);
        assert_eq!(delta_nll_from_sigma(3.0), 4.5);
    }

    #[test]
    fn test_delta_nll_two_dof_closed_form() {
        // chi2 with 2 dof: CDF = 1 - exp(-x/2)  =>  Δ = -ln(1 - cl)
        for cl in [0.3, ONE_SIGMA_LEVEL, 0.9, 0.99] {
            let d = confidence_to_delta_nll(cl, 2).unwrap();
            assert_relative_eq!(d, -(1.0 - cl).ln(), max_relative = 1e-6);
        }
    }

    #[test]
    fn test_delta_nll_increases_with_dof() {
        let d1 = confidence_to_delta_nll(0.9, 1).unwrap();
        let d2 = confidence_to_delta_nll(0.9, 2).unwrap();
        let d3 = confidence_to_delta_nll(0.9, 3).unwrap();
        assert!(d1 < d2 && d2 < d3);
    }

    #[test]
    fn test_refine_quantile_repairs_rough_estimate() {
        let chi2 = ChiSquared::new(2.0).unwrap();
        let exact = -2.0 * (1.0f64 - 0.9).ln();
        let x = refine_quantile(&chi2, 0.9, exact * 1.01, (0.0, f64::INFINITY));
        assert_relative_eq!(x, exact, max_relative = 1e-10);
    }

    #[test]
    fn test_invalid_inputs() {
        for cl in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            assert!(matches!(confidence_to_sigma(cl), Err(Error::InvalidInput(_))), "cl={cl}");
            assert!(matches!(confidence_to_delta_nll(cl, 1), Err(Error::InvalidInput(_))));
        }
        assert!(matches!(confidence_to_delta_nll(0.5, 0), Err(Error::InvalidInput(_))));
        for n in [0.0, -1.0, f64::INFINITY] {
            assert!(matches!(sigma_to_confidence(n), Err(Error::InvalidInput(_))));
        }
    }
}
