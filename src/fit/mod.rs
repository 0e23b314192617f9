//! Model fitting.
//!
//! Responsibilities:
//!
//! - place trend changepoints over the eligible history
//! - solve the penalized sub-problems (pluggable `Optimizer`)
//! - run the joint damped Gauss-Newton iteration to the MAP estimate

pub mod changepoints;
pub mod fitter;
pub mod optimizer;

pub use changepoints::*;
pub use fitter::*;
pub use optimizer::*;
