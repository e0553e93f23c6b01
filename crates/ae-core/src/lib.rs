//! # ae-core
//!
//! Core types for asymerr.
//!
//! This crate provides:
//! - [`Measurement`]: a value with independent upper/lower errors and linear propagation
//! - [`Interval`]: absolute confidence interval edges
//! - [`NllFunction`]: the one-dimensional likelihood seam used by every solver
//! - [`Error`] / [`Result`]: shared error type
//!
//! Likelihood families live in `ae-prob`; interval solvers and combiners in
//! `ae-inference`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod measurement;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use measurement::{ArithOp, Measurement};
pub use traits::NllFunction;
pub use types::Interval;
