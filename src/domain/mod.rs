//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - observations, feature rows and forecast rows (`types`)
//! - model, cross-validation and service configuration (`config`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
