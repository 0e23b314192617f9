//! Run configuration: model priors, cross-validation windows and the service
//! environment.
//!
//! Defaults mirror the production settings of the visitor service; every
//! field can be overridden from a JSON file (`ModelConfig::from_json_file`) or,
//! for the service layer, from the environment (`ServiceConfig::from_env`).

use std::fs::File;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::Regressor;
use crate::error::{ForecastError, Result};

/// A feature that gates a seasonal block on or off per date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Block is active only on rows whose `is_holiday` feature is set.
    IsHoliday,
}

/// Which multiplicative factor a term belongs to.
///
/// `yhat = trend · level · weekly`, where both factors are `1 + Xβ` over
/// their own columns. Day-of-week terms live in `Weekly` so the weekend lift
/// stays a fixed ratio whatever the annual level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    #[default]
    Level,
    Weekly,
}

/// One truncated Fourier series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalitySpec {
    pub name: String,
    /// Period in days.
    pub period: f64,
    pub fourier_order: usize,
    /// Overrides `ModelConfig::seasonality_prior_scale` when set.
    #[serde(default)]
    pub prior_scale: Option<f64>,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub factor: Factor,
}

impl SeasonalitySpec {
    pub fn new(name: &str, period: f64, fourier_order: usize) -> Self {
        Self {
            name: name.to_string(),
            period,
            fourier_order,
            prior_scale: None,
            condition: None,
            factor: Factor::Level,
        }
    }

    pub fn with_factor(mut self, factor: Factor) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Number of design columns (a sine and a cosine per order).
    pub fn width(&self) -> usize {
        2 * self.fourier_order
    }
}

/// Prior scale for one regressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressorPrior {
    pub regressor: Regressor,
    pub prior_scale: f64,
}

/// Iteration budget for the MAP optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    /// Relative objective change below which the fit counts as converged.
    pub tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-6,
        }
    }
}

/// Model structure and priors for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub n_changepoints: usize,
    /// Leading fraction of the history eligible for changepoints.
    pub changepoint_range: f64,
    /// Prior scale of the changepoint slope deltas (trend flexibility).
    pub changepoint_prior_scale: f64,
    /// Prior scale of the base slope and intercept.
    pub trend_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub holidays_prior_scale: f64,
    pub seasonalities: Vec<SeasonalitySpec>,
    pub regressors: Vec<RegressorPrior>,
    /// Gate each holiday window on the row's `is_holiday` feature.
    pub holidays_conditioned: bool,
    /// Default prediction interval width.
    pub interval_width: f64,
    /// Simulated trajectories per forecast.
    pub uncertainty_samples: usize,
    /// Seed for trajectory simulation and covariate synthesis.
    pub seed: u64,
    pub optimizer: OptimizerConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.1,
            trend_prior_scale: 5.0,
            seasonality_prior_scale: 15.0,
            holidays_prior_scale: 15.0,
            seasonalities: vec![
                SeasonalitySpec::new("weekly", 7.0, 3).with_factor(Factor::Weekly),
                SeasonalitySpec::new("yearly", 365.25, 10),
                SeasonalitySpec::new("monthly", 30.5, 8),
                SeasonalitySpec::new("quarterly", 91.25, 4),
                SeasonalitySpec::new("holidays", 365.25, 2).with_condition(Condition::IsHoliday),
            ],
            regressors: Regressor::ALL
                .iter()
                .map(|&regressor| RegressorPrior {
                    regressor,
                    prior_scale: regressor.default_prior_scale(),
                })
                .collect(),
            holidays_conditioned: false,
            interval_width: 0.8,
            uncertainty_samples: 1000,
            seed: 42,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl ModelConfig {
    /// Load a (possibly partial) configuration from JSON; missing fields keep
    /// their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: ModelConfig = serde_json::from_reader(file).map_err(|e| {
            ForecastError::InvalidRequest(format!("invalid model config '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ForecastError::InvalidRequest(msg));

        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return invalid(format!(
                "changepoint_range must be in (0, 1], got {}",
                self.changepoint_range
            ));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return invalid(format!(
                "interval_width must be in (0, 1), got {}",
                self.interval_width
            ));
        }
        if self.uncertainty_samples == 0 {
            return invalid("uncertainty_samples must be > 0".to_string());
        }
        if self.optimizer.max_iterations == 0 || !(self.optimizer.tolerance > 0.0) {
            return invalid("optimizer needs max_iterations > 0 and tolerance > 0".to_string());
        }

        let scales = [
            ("changepoint_prior_scale", self.changepoint_prior_scale),
            ("trend_prior_scale", self.trend_prior_scale),
            ("seasonality_prior_scale", self.seasonality_prior_scale),
            ("holidays_prior_scale", self.holidays_prior_scale),
        ];
        for (name, value) in scales {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{name} must be finite and > 0, got {value}"));
            }
        }
        for s in &self.seasonalities {
            if !(s.period.is_finite() && s.period > 0.0) {
                return invalid(format!("seasonality '{}' has invalid period {}", s.name, s.period));
            }
            if let Some(scale) = s.prior_scale {
                if !(scale.is_finite() && scale > 0.0) {
                    return invalid(format!("seasonality '{}' has invalid prior scale", s.name));
                }
            }
        }
        for r in &self.regressors {
            if !(r.prior_scale.is_finite() && r.prior_scale > 0.0) {
                return invalid(format!("regressor '{}' has invalid prior scale", r.regressor.name()));
            }
        }
        Ok(())
    }

    pub fn seasonality_prior(&self, spec: &SeasonalitySpec) -> f64 {
        spec.prior_scale.unwrap_or(self.seasonality_prior_scale)
    }
}

/// How the training window moves between cross-validation cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CvWindow {
    /// Train on everything up to the cutoff.
    Expanding,
    /// Train on the last `initial_days` up to the cutoff.
    Rolling,
}

/// Rolling-origin cross-validation settings (all in days).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvConfig {
    pub initial_days: usize,
    pub period_days: usize,
    pub horizon_days: usize,
    pub window: CvWindow,
    /// Minimum share of planned folds that must succeed for metrics to be
    /// reported.
    pub min_fold_fraction: f64,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            initial_days: 60,
            period_days: 30,
            horizon_days: 30,
            window: CvWindow::Expanding,
            min_fold_fraction: 0.5,
        }
    }
}

/// Environment-driven settings of the service layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// CSV with the site history.
    pub data_path: Option<PathBuf>,
    pub model_dir: PathBuf,
    pub model_file_prefix: String,
    pub cache_ttl_hours: i64,
    pub model_config_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            model_dir: PathBuf::from("models"),
            model_file_prefix: "site_model".to_string(),
            cache_ttl_hours: 24,
            model_config_path: None,
        }
    }
}

impl ServiceConfig {
    /// Read `SITE_FORECAST_*` variables (a `.env` file is honoured).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = ServiceConfig::default();

        if let Ok(path) = std::env::var("SITE_FORECAST_DATA") {
            config.data_path = Some(PathBuf::from(path));
        }
        if let Ok(dir) = std::env::var("SITE_FORECAST_MODEL_DIR") {
            config.model_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("SITE_FORECAST_MODEL_PREFIX") {
            config.model_file_prefix = prefix;
        }
        if let Ok(raw) = std::env::var("SITE_FORECAST_CACHE_TTL_HOURS") {
            config.cache_ttl_hours = raw.trim().parse().map_err(|_| {
                ForecastError::InvalidRequest(format!(
                    "SITE_FORECAST_CACHE_TTL_HOURS must be an integer, got '{raw}'"
                ))
            })?;
        }
        if let Ok(path) = std::env::var("SITE_FORECAST_MODEL_CONFIG") {
            config.model_config_path = Some(PathBuf::from(path));
        }
        Ok(config)
    }

    /// The model configuration file if one is configured, else defaults.
    pub fn load_model_config(&self) -> Result<ModelConfig> {
        match &self.model_config_path {
            Some(path) => ModelConfig::from_json_file(path),
            None => Ok(ModelConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ModelConfig::default();
        config.validate().unwrap();
        assert_eq!(config.regressors.len(), Regressor::COUNT);
        assert_eq!(config.seasonalities.iter().map(|s| s.width()).sum::<usize>(), 54);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ModelConfig =
            serde_json::from_str(r#"{"n_changepoints": 5, "interval_width": 0.9}"#).unwrap();
        assert_eq!(config.n_changepoints, 5);
        assert_eq!(config.interval_width, 0.9);
        assert_eq!(config.seasonalities.len(), 5);
        assert_eq!(config.optimizer, OptimizerConfig::default());
    }

    #[test]
    fn validate_rejects_bad_interval() {
        let config = ModelConfig {
            interval_width: 1.5,
            ..ModelConfig::default()
        };
        assert!(matches!(config.validate(), Err(ForecastError::InvalidRequest(_))));
    }
}
