//! Common data types for asymerr

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence interval in absolute parameter values.
///
/// Produced by the Minos solvers around a central (minimum) value; `lower <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Lower edge
    pub lower: f64,
    /// Upper edge
    pub upper: f64,
}

impl Interval {
    /// Create an interval, ordering the two edges.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b { Self { lower: a, upper: b } } else { Self { lower: b, upper: a } }
    }

    /// Zero-width interval at `x`.
    pub fn point(x: f64) -> Self {
        Self { lower: x, upper: x }
    }

    /// `upper - lower`
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Closed containment test.
    pub fn contains(&self, x: f64) -> bool {
        (self.lower..=self.upper).contains(&x)
    }

    /// True when both edges coincide.
    pub fn is_degenerate(&self) -> bool {
        self.lower == self.upper
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}
