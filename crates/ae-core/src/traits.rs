//! Core traits for asymerr
//!
//! The solvers in `ae-inference` only see this trait; concrete likelihoods live
//! in `ae-prob` or are supplied by callers.

use crate::Result;

/// One-dimensional negative log-likelihood `-log L(x | data)`.
///
/// Implementations are pure: the observed data is fixed at construction and
/// `evaluate` never mutates state, so a single instance may be shared across
/// threads. Evaluation outside [`NllFunction::domain`] must fail with
/// [`crate::Error::Domain`] instead of returning NaN.
pub trait NllFunction: Send + Sync {
    /// Evaluate the NLL at parameter value `x`.
    fn evaluate(&self, x: f64) -> Result<f64>;

    /// Open interval `(lo, hi)` of valid parameter values.
    fn domain(&self) -> (f64, f64) {
        (f64::NEG_INFINITY, f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct HalfLine;

    impl NllFunction for HalfLine {
        fn evaluate(&self, x: f64) -> Result<f64> {
            if x <= 0.0 {
                return Err(Error::Domain(format!("x must be > 0, got {x}")));
            }
            Ok(x - x.ln())
        }

        fn domain(&self) -> (f64, f64) {
            (0.0, f64::INFINITY)
        }
    }

    struct Parabola;

    impl NllFunction for Parabola {
        fn evaluate(&self, x: f64) -> Result<f64> {
            Ok(0.5 * x * x)
        }
    }

    #[test]
    fn test_default_domain_is_unbounded() {
        let (lo, hi) = Parabola.domain();
        assert!(lo.is_infinite() && lo < 0.0);
        assert!(hi.is_infinite() && hi > 0.0);
    }

    #[test]
    fn test_trait_object_dispatch() {
        let fs: Vec<Box<dyn NllFunction>> = vec![Box::new(HalfLine), Box::new(Parabola)];
        assert_eq!(fs[0].evaluate(1.0).unwrap(), 1.0);
        assert!(matches!(fs[0].evaluate(0.0), Err(Error::Domain(_))));
        assert_eq!(fs[1].evaluate(2.0).unwrap(), 2.0);
    }
}
