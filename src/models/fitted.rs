//! The fitted model bundle.
//!
//! A `FittedModel` is immutable once produced by the fitter and carries
//! everything needed to predict without the training data: scaling constants,
//! trend parameters, component coefficients, standardization statistics and the
//! history aggregates used for future covariate synthesis.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ModelConfig, ModelMetrics, SiteId};
use crate::features::{HistoryStats, HolidayCalendar};
use crate::math::piecewise_linear;
use crate::models::Components;

/// Version of the serialized model layout.
pub const MODEL_SCHEMA_VERSION: u32 = 2;

/// Maps dates onto the trend's time axis: `t = days since start / span`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeScale {
    pub start: NaiveDate,
    pub span_days: f64,
}

impl TimeScale {
    pub fn t(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.span_days
    }
}

/// Piecewise-linear trend on the scaled axis (history spans `[0, 1]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendParams {
    /// Base slope.
    pub k: f64,
    /// Intercept.
    pub m: f64,
    /// Slope change at each changepoint.
    pub deltas: Vec<f64>,
    /// Changepoint locations on the scaled axis.
    pub changepoints: Vec<f64>,
}

impl TrendParams {
    pub fn at(&self, t: f64) -> f64 {
        piecewise_linear(t, self.k, self.m, &self.deltas, &self.changepoints)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub schema_version: u32,
    pub site_id: SiteId,
    pub config: ModelConfig,
    pub calendar: HolidayCalendar,
    pub time: TimeScale,
    /// Target scale: `max |y|` over the training window.
    pub y_scale: f64,
    pub trend: TrendParams,
    pub components: Components,
    /// Residual standard deviation on the scaled target.
    pub sigma_obs: f64,
    pub window: TrainingWindow,
    pub history: HistoryStats,
    pub fit_timestamp: DateTime<Utc>,
    /// Optimizer iterations used.
    pub iterations: usize,
}

/// What the store and cache hold per site: the model plus its CV metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteModel {
    pub model: FittedModel,
    pub metrics: ModelMetrics,
}

impl SiteModel {
    pub fn site_id(&self) -> &str {
        &self.model.site_id
    }
}
