//! Small numerically-stable math utilities used by the likelihoods.

/// `x · ln(y)` with the `0 · ln(0) = 0` convention.
///
/// Used for Poisson/Binomial terms where a zero count multiplies a log that may
/// diverge at the domain edge.
#[inline]
pub fn xlogy(x: f64, y: f64) -> f64 {
    if x == 0.0 { 0.0 } else { x * y.ln() }
}

/// `x · ln(1 + y)` with the `0 · ln(0) = 0` convention.
#[inline]
pub fn xlog1py(x: f64, y: f64) -> f64 {
    if x == 0.0 { 0.0 } else { x * y.ln_1p() }
}

/// Exponential with a conservative clamp to avoid overflow.
///
/// Keeps extrapolated variance terms finite far in the tails so that bracket
/// searches see a large but finite NLL.
#[inline]
pub fn exp_clamped(x: f64) -> f64 {
    x.clamp(-700.0, 700.0).exp()
}
