//! The decomposable visitor model.
//!
//! - `layout`: the multiplicative components (seasonality, holidays,
//!   regressors) and their design columns
//! - `fitted`: the immutable fitted bundle
//! - `decomposable`: evaluation, breakdowns and the fit/predict wrapper

pub mod decomposable;
pub mod fitted;
pub mod layout;

pub use decomposable::*;
pub use fitted::*;
pub use layout::*;
