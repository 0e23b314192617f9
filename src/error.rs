//! Error types.
//!
//! - `ForecastError` is the library taxonomy. Engine operations return it and
//!   callers match on the variant to decide on retries or fallbacks.
//! - `AppError` is what the `sitecast` binary reports: a message plus a process
//!   exit code.

use thiserror::Error;

/// Failures surfaced by the forecasting engine and its adapters.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Too few observations to build features or fit.
    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("training set is empty")]
    EmptyTrainingSet,

    /// The target has zero variance over the training window.
    #[error("degenerate series: {0}")]
    DegenerateSeries(String),

    /// The optimizer did not stabilize within its iteration budget.
    #[error("optimizer did not converge: {0}")]
    ConvergenceFailure(String),

    #[error("model has not been fit")]
    ModelNotFit,

    /// Horizon, date range or input shape outside the allowed bounds.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("model store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker thread died before reporting an outcome.
    #[error("background task failed: {0}")]
    BackgroundTask(String),
}

/// Result type with the engine error.
pub type Result<T> = std::result::Result<T, ForecastError>;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        let exit_code = match &err {
            ForecastError::InvalidRequest(_) => 2,
            ForecastError::InsufficientHistory(_)
            | ForecastError::EmptyTrainingSet
            | ForecastError::DegenerateSeries(_) => 3,
            ForecastError::ConvergenceFailure(_) | ForecastError::ModelNotFit => 4,
            ForecastError::Store(_) | ForecastError::Io(_) | ForecastError::BackgroundTask(_) => 5,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_errors_map_to_exit_codes() {
        let invalid: AppError = ForecastError::InvalidRequest("horizon".into()).into();
        assert_eq!(invalid.exit_code(), 2);

        let short: AppError = ForecastError::InsufficientHistory("one row".into()).into();
        assert_eq!(short.exit_code(), 3);

        let diverged: AppError = ForecastError::ConvergenceFailure("budget".into()).into();
        assert_eq!(diverged.exit_code(), 4);
        assert!(diverged.to_string().contains("budget"));

        let died: AppError = ForecastError::BackgroundTask("retrain panicked".into()).into();
        assert_eq!(died.exit_code(), 5);
    }
}
