//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting and prediction
//! - persisted inside model artifacts
//! - exported to JSON/CSV

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::Factor;
use crate::error::{ForecastError, Result};

/// Identifier of an independent site (one model per site).
pub type SiteId = String;

/// Raw per-day covariates as supplied by the historical data source.
///
/// Every field is optional; the feature builder fills gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Covariates {
    /// Daily high temperature.
    pub temperature: Option<f64>,
    /// Precipitation amount.
    pub precipitation: Option<f64>,
    pub is_weekend: Option<bool>,
    pub is_holiday: Option<bool>,
    pub school_in_session: Option<bool>,
    /// Externally supplied seasonal factor (around 1.0).
    pub seasonal_index: Option<f64>,
    pub fuel_price: Option<f64>,
}

/// One day of history for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    /// Visitor count (the target).
    pub visitors: u32,
    pub covariates: Covariates,
}

impl Observation {
    pub fn new(date: NaiveDate, visitors: u32) -> Self {
        Self {
            date,
            visitors,
            covariates: Covariates::default(),
        }
    }
}

/// Exogenous features entering the regressor sub-model.
///
/// The discriminant doubles as the column index inside `FeatureRow::values`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Regressor {
    Temperature,
    TemperatureSquared,
    Rain,
    Precipitation,
    IsWeekend,
    IsHoliday,
    SchoolInSession,
    WeekendOrHoliday,
    SummerPeak,
    WinterLow,
    SeasonalIndex,
    FuelPrice,
}

impl Regressor {
    pub const COUNT: usize = 12;

    pub const ALL: [Regressor; Regressor::COUNT] = [
        Regressor::Temperature,
        Regressor::TemperatureSquared,
        Regressor::Rain,
        Regressor::Precipitation,
        Regressor::IsWeekend,
        Regressor::IsHoliday,
        Regressor::SchoolInSession,
        Regressor::WeekendOrHoliday,
        Regressor::SummerPeak,
        Regressor::WinterLow,
        Regressor::SeasonalIndex,
        Regressor::FuelPrice,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Regressor::Temperature => "temperature",
            Regressor::TemperatureSquared => "temp_squared",
            Regressor::Rain => "rain",
            Regressor::Precipitation => "precipitation_mm",
            Regressor::IsWeekend => "is_weekend",
            Regressor::IsHoliday => "is_holiday",
            Regressor::SchoolInSession => "school_in_session",
            Regressor::WeekendOrHoliday => "weekend_holiday",
            Regressor::SummerPeak => "summer_peak",
            Regressor::WinterLow => "winter_low",
            Regressor::SeasonalIndex => "seasonal_factor",
            Regressor::FuelPrice => "fuel_price",
        }
    }

    /// Prior scale used when the configuration does not override it.
    ///
    /// Well-understood calendar effects get more freedom than speculative
    /// ones such as fuel price.
    /// Day-of-week indicators scale with the weekly factor.
    pub fn factor(self) -> Factor {
        match self {
            Regressor::IsWeekend | Regressor::WeekendOrHoliday => Factor::Weekly,
            _ => Factor::Level,
        }
    }

    pub fn default_prior_scale(self) -> f64 {
        match self {
            Regressor::Temperature => 10.0,
            Regressor::TemperatureSquared => 5.0,
            Regressor::Rain => 10.0,
            Regressor::Precipitation => 5.0,
            Regressor::IsWeekend => 10.0,
            Regressor::IsHoliday => 15.0,
            Regressor::SchoolInSession => 8.0,
            Regressor::WeekendOrHoliday => 12.0,
            Regressor::SummerPeak => 10.0,
            Regressor::WinterLow => 8.0,
            Regressor::SeasonalIndex => 12.0,
            Regressor::FuelPrice => 5.0,
        }
    }
}

/// The fixed-shape feature vector consumed by the model for one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub values: [f64; Regressor::COUNT],
}

impl FeatureRow {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            values: [0.0; Regressor::COUNT],
        }
    }

    pub fn get(&self, regressor: Regressor) -> f64 {
        self.values[regressor.index()]
    }

    pub fn set(&mut self, regressor: Regressor, value: f64) {
        self.values[regressor.index()] = value;
    }

    pub fn is_holiday(&self) -> bool {
        self.get(Regressor::IsHoliday) > 0.5
    }
}

/// One forecast day. Visitor counts are whole and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub point_estimate: u64,
    pub lower_bound: u64,
    pub upper_bound: u64,
}

/// A forecast request as received from the serving layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub site_id: SiteId,
    pub start_date: NaiveDate,
    pub horizon_days: u32,
}

impl ForecastRequest {
    pub const MAX_HORIZON_DAYS: u32 = 365;

    /// Check horizon bounds and that the start date is not in the past.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        if self.horizon_days < 1 || self.horizon_days > Self::MAX_HORIZON_DAYS {
            return Err(ForecastError::InvalidRequest(format!(
                "horizon_days must be between 1 and {}, got {}",
                Self::MAX_HORIZON_DAYS,
                self.horizon_days
            )));
        }
        if self.start_date < today {
            return Err(ForecastError::InvalidRequest(format!(
                "start_date {} is in the past (today is {today})",
                self.start_date
            )));
        }
        if self.site_id.trim().is_empty() {
            return Err(ForecastError::InvalidRequest("site_id is empty".to_string()));
        }
        Ok(())
    }

    /// All requested dates, in order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.start_date
            .iter_days()
            .take(self.horizon_days as usize)
            .collect()
    }
}

/// A scored held-out day from one cross-validation cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldPoint {
    pub cutoff: NaiveDate,
    pub date: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
}

/// Accuracy summary exposed to the reporting layer.
///
/// `None` metrics mean "unavailable" (series too short or too few folds
/// succeeded), never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mae: Option<f64>,
    pub mape: Option<f64>,
    pub rmse: Option<f64>,
    pub training_points: usize,
    pub fit_timestamp: DateTime<Utc>,
    /// Number of cutoffs that contributed to the metrics.
    pub folds: usize,
}

impl ModelMetrics {
    pub fn unavailable(training_points: usize, fit_timestamp: DateTime<Utc>) -> Self {
        Self {
            mae: None,
            mape: None,
            rmse: None,
            training_points,
            fit_timestamp,
            folds: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.mae.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn regressor_indices_match_all_order() {
        for (i, r) in Regressor::ALL.iter().enumerate() {
            assert_eq!(r.index(), i);
        }
    }

    #[test]
    fn request_rejects_out_of_range_horizon() {
        let today = day(2025, 6, 1);
        let mut req = ForecastRequest {
            site_id: "YELL".to_string(),
            start_date: today,
            horizon_days: 400,
        };
        assert!(matches!(req.validate(today), Err(ForecastError::InvalidRequest(_))));
        req.horizon_days = 0;
        assert!(matches!(req.validate(today), Err(ForecastError::InvalidRequest(_))));
        req.horizon_days = 365;
        assert!(req.validate(today).is_ok());
    }

    #[test]
    fn request_rejects_past_start() {
        let req = ForecastRequest {
            site_id: "ZION".to_string(),
            start_date: day(2025, 5, 31),
            horizon_days: 7,
        };
        assert!(matches!(
            req.validate(day(2025, 6, 1)),
            Err(ForecastError::InvalidRequest(_))
        ));
        assert_eq!(req.dates().len(), 7);
        assert_eq!(req.dates()[6], day(2025, 6, 6));
    }
}
