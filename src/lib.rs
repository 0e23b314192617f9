//! `site-forecast` library crate.
//!
//! Daily visitor forecasting per site: a decomposable multiplicative model
//! (piecewise-linear trend times seasonal, holiday and regressor effects)
//! fitted by penalized least squares, with simulated prediction intervals and
//! rolling-origin cross-validation.
//!
//! The binary (`sitecast`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the engine can sit behind other front-ends (services, notebooks)

pub mod app;
pub mod cli;
pub mod clock;
pub mod cv;
pub mod data;
pub mod domain;
pub mod error;
pub mod features;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod service;
pub mod uncertainty;
