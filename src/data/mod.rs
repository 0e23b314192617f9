//! Data sources that are not files: synthetic site histories.

pub mod sample;

pub use sample::*;
