//! Evaluation of the decomposable model.
//!
//! ```text
//! yhat(date) = y_scale · trend(t) · level(date) · weekly(date)
//! ```
//!
//! `level` carries the annual, monthly, holiday and weather terms; `weekly`
//! the day-of-week terms.
//!
//! `FittedModel` evaluates components on already-built feature rows. The
//! `DecomposableModel` wrapper owns the configuration and holds the fitted
//! state once `fit` has run; predicting before that fails with `ModelNotFit`.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::clock::Clock;
use crate::domain::{FeatureRow, ForecastRow, ModelConfig, Observation};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureBuilder, HolidayCalendar};
use crate::fit::{Optimizer, RidgeSolver, fit_model};
use crate::uncertainty::TrajectorySample;

use super::FittedModel;

/// Per-date contributions in visitor units.
///
/// `seasonal + holidays + regressors` is the multiplicative part expressed in
/// visitors, so `trend + seasonal + holidays + regressors = yhat`. Weekly
/// terms act on `trend × level` and are folded into `seasonal` (weekly
/// Fourier block) and `regressors` (weekend indicators).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentBreakdown {
    pub date: NaiveDate,
    pub trend: f64,
    pub seasonal: f64,
    pub holidays: f64,
    pub regressors: f64,
    pub yhat: f64,
}

impl FittedModel {
    pub fn feature_builder(&self) -> FeatureBuilder<'_> {
        FeatureBuilder::new(&self.history, &self.calendar)
    }

    /// Trend in visitor units.
    pub fn trend_value(&self, date: NaiveDate) -> f64 {
        self.y_scale * self.trend.at(self.time.t(date))
    }

    /// Unclipped point prediction for one row.
    pub fn point(&self, row: &FeatureRow) -> f64 {
        self.trend_value(row.date) * self.components.multiplier(row).factor()
    }

    /// Point predictions clipped at zero (not rounded).
    pub fn point_forecast(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.iter().map(|r| self.point(r).max(0.0)).collect()
    }

    pub fn breakdown(&self, rows: &[FeatureRow]) -> Vec<ComponentBreakdown> {
        rows.iter()
            .map(|row| {
                let trend = self.trend_value(row.date);
                let parts = self.components.multiplier(row);
                let leveled = trend * parts.level();
                ComponentBreakdown {
                    date: row.date,
                    trend,
                    seasonal: trend * parts.seasonal + leveled * parts.weekly_seasonal,
                    holidays: trend * parts.holidays,
                    regressors: trend * parts.regressors + leveled * parts.weekly_regressors,
                    yhat: leveled * parts.weekly(),
                }
            })
            .collect()
    }

    /// Forecast rows with bounds at `width` (seeded by the model's config).
    pub fn predict_with_width(&self, rows: &[FeatureRow], width: f64) -> Result<Vec<ForecastRow>> {
        if !(width > 0.0 && width < 1.0) {
            return Err(ForecastError::InvalidRequest(format!(
                "interval width must be in (0, 1), got {width}"
            )));
        }
        let sample = TrajectorySample::simulate(
            self,
            rows,
            self.config.uncertainty_samples,
            self.config.seed,
        );
        Ok(sample.forecast_rows(width))
    }

    /// Forecast rows at the configured default width.
    pub fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<ForecastRow>> {
        self.predict_with_width(rows, self.config.interval_width)
    }

    /// Synthesized feature rows for `[start, start + horizon)`.
    ///
    /// Synthesis always begins the day after the training window so a given
    /// date gets the same covariates whatever the requested start.
    pub fn future_rows(&self, start: NaiveDate, horizon_days: u32) -> Result<Vec<FeatureRow>> {
        let end = start
            .checked_add_days(Days::new(u64::from(horizon_days.saturating_sub(1))))
            .ok_or_else(|| ForecastError::InvalidRequest(format!("horizon overflows from {start}")))?;
        let first = self
            .window
            .end
            .succ_opt()
            .map_or(start, |next| next.min(start));

        let dates: Vec<NaiveDate> = first.iter_days().take_while(|d| *d <= end).collect();
        let rows = self.feature_builder().synthesize(&dates, self.config.seed);
        Ok(rows.into_iter().filter(|r| r.date >= start).collect())
    }

    /// Synthesize covariates and forecast `horizon_days` from `start`.
    pub fn forecast(&self, start: NaiveDate, horizon_days: u32, width: f64) -> Result<Vec<ForecastRow>> {
        let rows = self.future_rows(start, horizon_days)?;
        self.predict_with_width(&rows, width)
    }
}

/// A model for one site that may or may not have been fit yet.
pub struct DecomposableModel {
    config: ModelConfig,
    calendar: HolidayCalendar,
    optimizer: Box<dyn Optimizer>,
    fitted: Option<FittedModel>,
}

impl DecomposableModel {
    pub fn new(config: ModelConfig, calendar: HolidayCalendar) -> Self {
        Self {
            config,
            calendar,
            optimizer: Box::new(RidgeSolver),
            fitted: None,
        }
    }

    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn from_fitted(model: FittedModel) -> Self {
        Self {
            config: model.config.clone(),
            calendar: model.calendar.clone(),
            optimizer: Box::new(RidgeSolver),
            fitted: Some(model),
        }
    }

    /// Fit on `observations`, replacing any previous fit.
    pub fn fit(&mut self, site_id: &str, observations: &[Observation], clock: &dyn Clock) -> Result<&FittedModel> {
        let model = fit_model(
            site_id,
            observations,
            &self.config,
            &self.calendar,
            self.optimizer.as_ref(),
            clock,
        )?;
        Ok(&*self.fitted.insert(model))
    }

    pub fn fitted(&self) -> Result<&FittedModel> {
        self.fitted.as_ref().ok_or(ForecastError::ModelNotFit)
    }

    pub fn into_fitted(self) -> Result<FittedModel> {
        self.fitted.ok_or(ForecastError::ModelNotFit)
    }

    pub fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<ForecastRow>> {
        self.fitted()?.predict(rows)
    }
}
