//! Error types for asymerr

use thiserror::Error;

/// asymerr error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed construction parameter (negative error, confidence level outside (0,1), ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// NLL evaluated outside its mathematical domain
    #[error("Domain error: {0}")]
    Domain(String),

    /// Arithmetic combination dividing by a zero-central measurement
    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    /// The search bracket does not contain a sign change; widen it and retry.
    #[error(
        "Root not bracketed in [{lower}, {upper}]: f(lower)={f_lower}, f(upper)={f_upper}"
    )]
    RootNotBracketed {
        /// Lower end of the searched bracket.
        lower: f64,
        /// Upper end of the searched bracket.
        upper: f64,
        /// Function value at `lower`.
        f_lower: f64,
        /// Function value at `upper`.
        f_upper: f64,
    },

    /// Iteration budget exhausted before the tolerance was met.
    ///
    /// `lower`/`upper` hold the best bracket reached, so a caller may accept an
    /// approximate answer or retry with a larger budget.
    #[error("{context}: no convergence after {iterations} iterations, best bracket [{lower}, {upper}]")]
    Convergence {
        /// Which search gave up.
        context: String,
        /// Iterations spent.
        iterations: usize,
        /// Lower end of the best bracket.
        lower: f64,
        /// Upper end of the best bracket.
        upper: f64,
    },

    /// Covariance decomposition hit a negative pivot beyond numerical tolerance.
    #[error("Matrix is not positive semi-definite: pivot {pivot} at index {index}")]
    NotPositiveSemiDefinite {
        /// Row/column where the decomposition failed.
        index: usize,
        /// Offending pivot value.
        pivot: f64,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convergence_message_carries_bracket() {
        let e = Error::Convergence {
            context: "upper root".into(),
            iterations: 100,
            lower: 1.0,
            upper: 1.5,
        };
        let msg = e.to_string();
        assert!(msg.starts_with("upper root"), "{msg}");
        assert!(msg.contains("[1, 1.5]"), "{msg}");
    }

    #[test]
    fn test_not_bracketed_message() {
        let e = Error::RootNotBracketed { lower: 0.0, upper: 2.0, f_lower: -0.5, f_upper: -0.1 };
        assert!(e.to_string().contains("f(upper)=-0.1"));
    }
}
