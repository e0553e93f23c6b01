//! Measurements with asymmetric uncertainties.
//!
//! Arithmetic uses first-order (linear) propagation with independent errors:
//! for an output `c = f(a, b)` each input contributes `|∂f/∂a|·σ` to the output
//! error on the side given by the sign of the derivative, and contributions on
//! one side are added in quadrature. For addition this is the familiar
//! `sqrt(ua² + ub²)` / `sqrt(da² + db²)`; multiplication and division reduce to
//! relative-error propagation.
//!
//! Likelihood-based combination of several measurements lives in
//! `ae-inference::combine`.

use crate::{Error, Interval, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A central value with independent upper and lower absolute errors.
///
/// Invariant: all three numbers are finite and both errors are `>= 0`.
/// The `std::ops` operators can overflow to infinity; the `checked_*` methods
/// keep the invariant by failing instead.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct Measurement {
    central: f64,
    error_up: f64,
    error_down: f64,
}

/// Binary operation selector for [`Measurement::combine_arith`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
}

impl Measurement {
    /// Create a measurement `central (+error_up, -error_down)`.
    pub fn new(central: f64, error_up: f64, error_down: f64) -> Result<Self> {
        if !central.is_finite() {
            return Err(Error::InvalidInput(format!("central value must be finite, got {central}")));
        }
        if !error_up.is_finite() || error_up < 0.0 {
            return Err(Error::InvalidInput(format!(
                "upper error must be finite and >= 0, got {error_up}"
            )));
        }
        if !error_down.is_finite() || error_down < 0.0 {
            return Err(Error::InvalidInput(format!(
                "lower error must be finite and >= 0, got {error_down}"
            )));
        }
        Ok(Self { central, error_up, error_down })
    }

    /// Symmetric measurement `central ± error`.
    pub fn symmetric(central: f64, error: f64) -> Result<Self> {
        Self::new(central, error, error)
    }

    /// Measurement without uncertainty.
    ///
    /// A non-finite `central` is stored as-is; prefer [`Measurement::new`] for untrusted input.
    pub fn exact(central: f64) -> Self {
        Self { central, error_up: 0.0, error_down: 0.0 }
    }

    /// Build from a central value and the absolute edges of an interval.
    pub fn from_interval(central: f64, interval: &Interval) -> Result<Self> {
        Self::new(central, interval.upper - central, central - interval.lower)
    }

    /// Central value.
    #[inline]
    pub fn central(&self) -> f64 {
        self.central
    }

    /// Absolute upper error.
    #[inline]
    pub fn error_up(&self) -> f64 {
        self.error_up
    }

    /// Absolute lower error.
    #[inline]
    pub fn error_down(&self) -> f64 {
        self.error_down
    }

    /// Mean of the two errors.
    pub fn avg_error(&self) -> f64 {
        0.5 * (self.error_up + self.error_down)
    }

    /// Upper error relative to `|central|` (infinite for a zero central).
    pub fn rel_error_up(&self) -> f64 {
        self.error_up / self.central.abs()
    }

    /// Lower error relative to `|central|` (infinite for a zero central).
    pub fn rel_error_down(&self) -> f64 {
        self.error_down / self.central.abs()
    }

    /// `central + error_up`
    pub fn upper_value(&self) -> f64 {
        self.central + self.error_up
    }

    /// `central - error_down`
    pub fn lower_value(&self) -> f64 {
        self.central - self.error_down
    }

    /// `[lower_value, upper_value]`
    pub fn interval(&self) -> Interval {
        Interval { lower: self.lower_value(), upper: self.upper_value() }
    }

    /// `error_up == error_down`
    pub fn is_symmetric(&self) -> bool {
        self.error_up == self.error_down
    }

    /// Both errors are zero.
    pub fn is_exact(&self) -> bool {
        self.error_up == 0.0 && self.error_down == 0.0
    }

    /// The measurement divided by `|central|`: unit central, relative errors.
    ///
    /// For a negative central the errors swap sides, so that
    /// `m.normalized()? * m.central()` gives back `m`.
    pub fn normalized(&self) -> Result<Self> {
        if self.central == 0.0 {
            return Err(Error::DivisionByZero(
                "cannot normalise a measurement with zero central value".into(),
            ));
        }
        let scale = self.central.abs();
        let (up, down) = if self.central > 0.0 {
            (self.error_up, self.error_down)
        } else {
            (self.error_down, self.error_up)
        };
        Ok(Self { central: 1.0, error_up: up / scale, error_down: down / scale })
    }

    /// Combine with `other` by linear error propagation.
    ///
    /// Fails with [`Error::DivisionByZero`] for `Div` when `other.central() == 0`,
    /// and with [`Error::InvalidInput`] if the result overflows.
    pub fn combine_arith(&self, op: ArithOp, other: &Measurement) -> Result<Self> {
        let out = match op {
            ArithOp::Add => propagate(self.central + other.central, &[(1.0, self), (1.0, other)]),
            ArithOp::Sub => propagate(self.central - other.central, &[(1.0, self), (-1.0, other)]),
            ArithOp::Mul => propagate(
                self.central * other.central,
                &[(other.central, self), (self.central, other)],
            ),
            ArithOp::Div => {
                if other.central == 0.0 {
                    return Err(Error::DivisionByZero(format!(
                        "{self} / {other}: divisor has zero central value"
                    )));
                }
                let inv = 1.0 / other.central;
                propagate(self.central * inv, &[(inv, self), (-self.central * inv * inv, other)])
            }
        };
        out.finite_or(|| format!("{op:?} of {self} and {other} overflowed"))
    }

    /// `self + other`, failing on overflow.
    pub fn checked_add(&self, other: &Measurement) -> Result<Self> {
        self.combine_arith(ArithOp::Add, other)
    }

    /// `self - other`, failing on overflow.
    pub fn checked_sub(&self, other: &Measurement) -> Result<Self> {
        self.combine_arith(ArithOp::Sub, other)
    }

    /// `self * other`, failing on overflow.
    pub fn checked_mul(&self, other: &Measurement) -> Result<Self> {
        self.combine_arith(ArithOp::Mul, other)
    }

    /// `self + k` for a scalar offset; the errors are unchanged.
    pub fn checked_shift(&self, k: f64) -> Result<Self> {
        Measurement { central: self.central + k, ..*self }
            .finite_or(|| format!("{self} + {k} is not finite"))
    }

    /// `self * k`; a negative `k` swaps the errors.
    pub fn checked_scale(&self, k: f64) -> Result<Self> {
        propagate(self.central * k, &[(k, self)])
            .finite_or(|| format!("{self} * {k} is not finite"))
    }

    fn finite_or(self, message: impl FnOnce() -> String) -> Result<Self> {
        if self.central.is_finite() && self.error_up.is_finite() && self.error_down.is_finite() {
            Ok(self)
        } else {
            Err(Error::InvalidInput(message()))
        }
    }

    /// `self / other`, see [`Measurement::combine_arith`].
    pub fn checked_div(&self, other: &Measurement) -> Result<Self> {
        self.combine_arith(ArithOp::Div, other)
    }

    /// `self / k` for a scalar `k != 0`.
    pub fn checked_div_scalar(&self, k: f64) -> Result<Self> {
        if k == 0.0 {
            return Err(Error::DivisionByZero(format!("{self} / 0")));
        }
        self.combine_arith(ArithOp::Div, &Measurement::exact(k))
    }

    /// `1 / self`; the errors swap sides since the reciprocal is decreasing.
    pub fn reciprocal(&self) -> Result<Self> {
        Measurement::exact(1.0).checked_div(self)
    }
}

/// First-order propagation: `terms` holds `(∂f/∂input, input)` pairs.
fn propagate(central: f64, terms: &[(f64, &Measurement)]) -> Measurement {
    let mut up2 = 0.0;
    let mut down2 = 0.0;
    for &(deriv, m) in terms {
        let (up, down) =
            if deriv >= 0.0 { (m.error_up, m.error_down) } else { (m.error_down, m.error_up) };
        let s = deriv.abs();
        up2 += (s * up) * (s * up);
        down2 += (s * down) * (s * down);
    }
    Measurement { central, error_up: up2.sqrt(), error_down: down2.sqrt() }
}

impl TryFrom<[f64; 3]> for Measurement {
    type Error = Error;

    fn try_from(v: [f64; 3]) -> Result<Self> {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Measurement> for [f64; 3] {
    fn from(m: Measurement) -> Self {
        [m.central, m.error_up, m.error_down]
    }
}

impl From<Measurement> for f64 {
    fn from(m: Measurement) -> Self {
        m.central
    }
}

// The operators below follow IEEE semantics: a result too large for `f64`
// comes out with infinite fields. Use the `checked_*` methods when the inputs
// are not known to be small enough.

impl Add for Measurement {
    type Output = Measurement;

    fn add(self, rhs: Measurement) -> Measurement {
        propagate(self.central + rhs.central, &[(1.0, &self), (1.0, &rhs)])
    }
}

impl Sub for Measurement {
    type Output = Measurement;

    fn sub(self, rhs: Measurement) -> Measurement {
        propagate(self.central - rhs.central, &[(1.0, &self), (-1.0, &rhs)])
    }
}

impl Mul for Measurement {
    type Output = Measurement;

    fn mul(self, rhs: Measurement) -> Measurement {
        propagate(self.central * rhs.central, &[(rhs.central, &self), (self.central, &rhs)])
    }
}

impl Neg for Measurement {
    type Output = Measurement;

    fn neg(self) -> Measurement {
        Measurement { central: -self.central, error_up: self.error_down, error_down: self.error_up }
    }
}

impl Add<f64> for Measurement {
    type Output = Measurement;

    fn add(self, rhs: f64) -> Measurement {
        Measurement { central: self.central + rhs, ..self }
    }
}

impl Sub<f64> for Measurement {
    type Output = Measurement;

    fn sub(self, rhs: f64) -> Measurement {
        Measurement { central: self.central - rhs, ..self }
    }
}

impl Mul<f64> for Measurement {
    type Output = Measurement;

    fn mul(self, rhs: f64) -> Measurement {
        propagate(self.central * rhs, &[(rhs, &self)])
    }
}

impl Add<Measurement> for f64 {
    type Output = Measurement;

    fn add(self, rhs: Measurement) -> Measurement {
        rhs + self
    }
}

impl Sub<Measurement> for f64 {
    type Output = Measurement;

    fn sub(self, rhs: Measurement) -> Measurement {
        -rhs + self
    }
}

impl Mul<Measurement> for f64 {
    type Output = Measurement;

    fn mul(self, rhs: Measurement) -> Measurement {
        rhs * self
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (f.precision(), self.is_symmetric()) {
            (Some(p), true) => write!(f, "{:.p$} ± {:.p$}", self.central, self.error_up),
            (Some(p), false) => write!(
                f,
                "{:.p$} +{:.p$} -{:.p$}",
                self.central, self.error_up, self.error_down
            ),
            (None, true) => write!(f, "{} ± {}", self.central, self.error_up),
            (None, false) => {
                write!(f, "{} +{} -{}", self.central, self.error_up, self.error_down)
            }
        }
    }
}
