//! One-dimensional negative log-likelihood families.
//!
//! Every type here is an immutable [`NllFunction`]: the observed data is fixed at
//! construction, evaluation is pure, and a point outside the mathematical domain
//! is reported as [`Error::Domain`] rather than a NaN. Additive constants that do
//! not depend on the parameter are dropped, so each NLL is zero-based only up to
//! a constant; interval solvers only look at differences.

use crate::math::{exp_clamped, xlog1py, xlogy};
use ae_core::{Error, Measurement, NllFunction, Result};

/// Largest allowed ratio between the two errors of a [`LinearVarianceNll`].
const MAX_ERROR_RATIO: f64 = 10.0;

/// Floor on the variance product `σ₊σ₋` of a [`LinearVarianceNll`].
const MIN_VARIANCE: f64 = 1e-12;

fn check_finite(x: f64, what: &str) -> Result<()> {
    if x.is_nan() {
        return Err(Error::Domain(format!("{what}: parameter is NaN")));
    }
    Ok(())
}

/// Gaussian NLL `(x - observed)² / (2σ²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianNll {
    observed: f64,
    sigma: f64,
}

impl GaussianNll {
    /// Create a Gaussian NLL; `sigma` must be finite and `> 0`.
    pub fn new(observed: f64, sigma: f64) -> Result<Self> {
        if !observed.is_finite() {
            return Err(Error::InvalidInput(format!("observed must be finite, got {observed}")));
        }
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(Error::InvalidInput(format!("sigma must be finite and > 0, got {sigma}")));
        }
        Ok(Self { observed, sigma })
    }

    /// Symmetrised Gaussian for a measurement, using the mean of its two errors.
    pub fn from_measurement(m: &Measurement) -> Result<Self> {
        Self::new(m.central(), m.avg_error())
    }

    /// Observed value.
    pub fn observed(&self) -> f64 {
        self.observed
    }

    /// Standard deviation.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl NllFunction for GaussianNll {
    fn evaluate(&self, x: f64) -> Result<f64> {
        check_finite(x, "GaussianNll")?;
        let z = (x - self.observed) / self.sigma;
        Ok(0.5 * z * z)
    }
}

/// Poisson NLL `x - observed · ln(x)` for a mean `x > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoissonNll {
    observed: f64,
}

impl PoissonNll {
    /// Create a Poisson NLL; `observed` must be finite and `>= 0`.
    ///
    /// Non-integer counts (e.g. weighted events) are accepted.
    pub fn new(observed: f64) -> Result<Self> {
        if !observed.is_finite() || observed < 0.0 {
            return Err(Error::InvalidInput(format!(
                "observed count must be finite and >= 0, got {observed}"
            )));
        }
        Ok(Self { observed })
    }

    /// Observed count.
    pub fn observed(&self) -> f64 {
        self.observed
    }
}

impl NllFunction for PoissonNll {
    fn evaluate(&self, x: f64) -> Result<f64> {
        if !(x > 0.0 && x.is_finite()) {
            return Err(Error::Domain(format!("Poisson mean must be > 0 and finite, got {x}")));
        }
        Ok(x - xlogy(self.observed, x))
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, f64::INFINITY)
    }
}

/// Binomial NLL `-k·ln(x) - (n-k)·ln(1-x)` for a success probability `0 < x < 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinomialNll {
    successes: u64,
    trials: u64,
}

impl BinomialNll {
    /// Create a Binomial NLL; requires `trials > 0` and `successes <= trials`.
    pub fn new(successes: u64, trials: u64) -> Result<Self> {
        if trials == 0 {
            return Err(Error::InvalidInput("trials must be > 0".into()));
        }
        if successes > trials {
            return Err(Error::InvalidInput(format!(
                "successes must be <= trials, got k={successes} n={trials}"
            )));
        }
        Ok(Self { successes, trials })
    }

    /// Number of successes `k`.
    pub fn successes(&self) -> u64 {
        self.successes
    }

    /// Number of trials `n`.
    pub fn trials(&self) -> u64 {
        self.trials
    }
}

impl NllFunction for BinomialNll {
    fn evaluate(&self, x: f64) -> Result<f64> {
        if !(x > 0.0 && x < 1.0) {
            return Err(Error::Domain(format!("Binomial probability must be in (0, 1), got {x}")));
        }
        let k = self.successes as f64;
        let fails = (self.trials - self.successes) as f64;
        Ok(-xlogy(k, x) - xlog1py(fails, -x))
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }
}

/// NLL backed by a caller-supplied closure.
///
/// The closure receives points strictly inside the declared domain. A point
/// outside it, or a NaN returned by the closure, becomes [`Error::Domain`].
pub struct CustomNll<F> {
    f: F,
    domain: (f64, f64),
}

impl<F> CustomNll<F>
where
    F: Fn(f64) -> Result<f64> + Send + Sync,
{
    /// Wrap `f` with an unbounded domain.
    pub fn new(f: F) -> Self {
        Self { f, domain: (f64::NEG_INFINITY, f64::INFINITY) }
    }

    /// Wrap `f`, valid on the open interval `(lo, hi)`.
    pub fn with_domain(f: F, lo: f64, hi: f64) -> Result<Self> {
        if lo.is_nan() || hi.is_nan() || lo >= hi {
            return Err(Error::InvalidInput(format!("empty domain ({lo}, {hi})")));
        }
        Ok(Self { f, domain: (lo, hi) })
    }
}

impl<F> NllFunction for CustomNll<F>
where
    F: Fn(f64) -> Result<f64> + Send + Sync,
{
    fn evaluate(&self, x: f64) -> Result<f64> {
        let (lo, hi) = self.domain;
        if !(x > lo && x < hi) {
            return Err(Error::Domain(format!("{x} outside ({lo}, {hi})")));
        }
        let v = (self.f)(x)?;
        if v.is_nan() {
            return Err(Error::Domain(format!("custom NLL returned NaN at {x}")));
        }
        Ok(v)
    }

    fn domain(&self) -> (f64, f64) {
        self.domain
    }
}

impl<F> std::fmt::Debug for CustomNll<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomNll").field("domain", &self.domain).finish_non_exhaustive()
    }
}

/// Approximate NLL for a measurement `c (+σ₊ -σ₋)` with a linearly varying variance.
///
/// `NLL(x) = ½ δ² / D(δ)` with `δ = x - c` and `D(δ) = V (1 + A δ)`, where
/// `V = σ₊σ₋` and `A = (σ₊ - σ₋)/V` (R. Barlow, "Asymmetric statistical errors",
/// physics/0406120). This reproduces `NLL(c + σ₊) = NLL(c - σ₋) = ½`.
///
/// Adjustments for stability:
/// - the smaller error is inflated so the ratio of the errors is at most 10;
/// - `V` is floored at `1e-12`;
/// - past half-way from `-σ₋` (or `+σ₊`) to the pole of `D`, the linear
///   denominator is replaced by an exponential matched in value and slope, so
///   the NLL is finite on the whole real line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearVarianceNll {
    measurement: Measurement,
    error_up: f64,
    error_down: f64,
}

impl LinearVarianceNll {
    /// Build the NLL for `m`.
    pub fn new(m: &Measurement) -> Self {
        let raw_up = m.error_up();
        let raw_down = m.error_down();
        let error_up = raw_up.max(raw_down / MAX_ERROR_RATIO);
        let error_down = raw_down.max(raw_up / MAX_ERROR_RATIO);
        if error_up != raw_up || error_down != raw_down {
            log::debug!(
                "LinearVarianceNll: error ratio of {m} capped at {MAX_ERROR_RATIO}, using +{error_up} -{error_down}"
            );
        }
        Self { measurement: *m, error_up, error_down }
    }

    /// The wrapped measurement.
    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    /// Effective `(σ₊, σ₋)` after the ratio cap.
    pub fn effective_errors(&self) -> (f64, f64) {
        (self.error_up, self.error_down)
    }

    /// Variance term `D(δ)`; always strictly positive.
    pub fn variance(&self, delta: f64) -> f64 {
        augmented_variance(delta, self.error_up, self.error_down)
    }
}

impl From<Measurement> for LinearVarianceNll {
    fn from(m: Measurement) -> Self {
        Self::new(&m)
    }
}

fn augmented_variance(delta: f64, up: f64, down: f64) -> f64 {
    let v = (up * down).max(MIN_VARIANCE);
    let a = (up - down) / v;
    if a == 0.0 {
        return v;
    }
    if a < 0.0 {
        // Mirror so the pole is always on the negative side.
        return augmented_variance(-delta, down, up);
    }
    let switch = (-down - 1.0 / a) / 2.0;
    if delta < switch {
        let d_switch = v * (1.0 + a * switch);
        let slope = a / (1.0 + a * switch);
        d_switch * exp_clamped(slope * (delta - switch))
    } else {
        v * (1.0 + a * delta)
    }
}

impl NllFunction for LinearVarianceNll {
    fn evaluate(&self, x: f64) -> Result<f64> {
        check_finite(x, "LinearVarianceNll")?;
        let delta = x - self.measurement.central();
        Ok(0.5 * delta * delta / self.variance(delta))
    }
}
