//! # ae-inference
//!
//! Interval solvers and measurement combination for asymerr.
//!
//! This crate provides:
//! - Minos intervals for one-dimensional likelihoods
//! - Profile-likelihood Minos for a quantity derived from several parameters
//! - Combination of measurements with asymmetric errors (same quantity, sums,
//!   products, correlated sums)
//! - Preset intervals for counts and efficiencies
//!
//! ## Architecture
//!
//! Solvers only see the `NllFunction` trait from ae-core; the concrete
//! likelihood families come from ae-prob or from the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Parallel solving of independent problems.
pub mod batch;
/// Brent minimisation and root finding.
pub mod brent;
/// Measurement combiners.
pub mod combine;
/// Covariance factorisation.
pub mod covariance;
/// Poisson and efficiency intervals.
pub mod intervals;
/// One-dimensional Minos.
pub mod minos;
/// Generic numerical optimizer (L-BFGS-B backend).
pub mod optimizer;
/// Profile-likelihood Minos.
pub mod profile;

pub use batch::{MinosProblem, prod_uncorrelated_batch, solve_batch, sum_uncorrelated_batch};
pub use combine::{
    CombineConfig, CombinedNll, add_uncorrelated, add_uncorrelated_with, prod_uncorrelated,
    prod_uncorrelated_with, sum_correlated, sum_uncorrelated, sum_uncorrelated_with,
};
pub use covariance::decompose_covariance;
pub use intervals::{
    efficiency_bayesian, efficiency_clopper_pearson, efficiency_lazy, efficiency_minos,
    poisson_gamma_interval, poisson_lazy, poisson_minos,
};
pub use minos::{MinosConfig, MinosResult, MinosSolver, minos};
pub use optimizer::{LbfgsbOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
pub use profile::{
    EdgeGuess, ProductVariable, ProfileConfig, ProfileMinimizer, ProfileMinos, ProfilePoint,
    ProfileVariable, SumVariable, UncorrelatedNll,
};
