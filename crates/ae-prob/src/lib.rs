//! Likelihood building blocks for asymerr.
//!
//! This crate hosts the pieces the interval solvers are built from:
//! - one-dimensional NLL families implementing [`ae_core::NllFunction`]
//! - confidence-level / sigma / ΔNLL conversions
//! - small numeric helpers (stable `x·ln y`, clamped `exp`)

pub mod confidence;
pub mod math;
pub mod nll;

pub use confidence::{
    ONE_SIGMA_LEVEL, TWO_SIGMA_LEVEL, confidence_to_delta_nll, confidence_to_sigma,
    delta_nll_from_sigma, refine_quantile, sigma_to_confidence,
};
pub use nll::{BinomialNll, CustomNll, GaussianNll, LinearVarianceNll, PoissonNll};
