//! Input/output adapters.
//!
//! - history sources and CSV ingest (`ingest`)
//! - model persistence (`store`)
//! - CSV exports (`export`)

pub mod export;
pub mod ingest;
pub mod store;

pub use export::*;
pub use ingest::*;
pub use store::*;
