//! Feature building: raw covariates to fixed-shape feature rows.
//!
//! - `calendar`: holiday rules
//! - `builder`: historical rows and the statistics used to fill gaps
//! - `synth`: future rows synthesized from those statistics

pub mod builder;
pub mod calendar;
pub mod synth;

pub use builder::*;
pub use calendar::*;
