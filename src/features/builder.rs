//! Historical feature rows.
//!
//! Gaps in the raw covariates are filled from the series' own history:
//!
//! - temperature, fuel price: historical mean
//! - precipitation: 0 (rain flag is derived as precipitation > 0.1)
//! - school in session: 1
//! - seasonal index: 1.0
//! - weekend / holiday flags: from the date and the holiday calendar
//!
//! Derived columns (temperature², weekend-or-holiday, summer peak, winter low)
//! are always recomputed from the filled values.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::{Covariates, FeatureRow, Observation, Regressor};
use crate::error::{ForecastError, Result};
use crate::features::HolidayCalendar;
use crate::math::mean;

/// Rain threshold for the derived rain flag.
pub const RAIN_THRESHOLD: f64 = 0.1;

/// Aggregates of the training history needed to fill gaps and to synthesize
/// future covariates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub mean_temperature: f64,
    /// Mean daily precipitation with missing days counted as dry.
    pub mean_precipitation: f64,
    pub mean_fuel_price: f64,
}

impl HistoryStats {
    /// Compute statistics over `observations` (any order).
    ///
    /// Fails with `InsufficientHistory` if the series is empty or temperature /
    /// fuel price were never observed.
    pub fn from_observations(observations: &[Observation]) -> Result<Self> {
        let (Some(start_date), Some(end_date)) = (
            observations.iter().map(|o| o.date).min(),
            observations.iter().map(|o| o.date).max(),
        ) else {
            return Err(ForecastError::InsufficientHistory(
                "no observations to compute covariate statistics".to_string(),
            ));
        };

        let observed = |f: fn(&Covariates) -> Option<f64>| -> Vec<f64> {
            observations
                .iter()
                .filter_map(|o| f(&o.covariates))
                .filter(|v| v.is_finite())
                .collect()
        };

        let mean_temperature = mean(&observed(|c| c.temperature)).ok_or_else(|| {
            ForecastError::InsufficientHistory("temperature was never observed".to_string())
        })?;
        let mean_fuel_price = mean(&observed(|c| c.fuel_price)).ok_or_else(|| {
            ForecastError::InsufficientHistory("fuel price was never observed".to_string())
        })?;

        let precipitation: Vec<f64> = observations
            .iter()
            .map(|o| finite(o.covariates.precipitation).unwrap_or(0.0))
            .collect();
        let mean_precipitation = mean(&precipitation).unwrap_or(0.0);

        Ok(Self {
            start_date,
            end_date,
            mean_temperature,
            mean_precipitation,
            mean_fuel_price,
        })
    }
}

/// Turns raw covariates into `FeatureRow`s using fixed history statistics.
#[derive(Debug, Clone, Copy)]
pub struct FeatureBuilder<'a> {
    pub stats: &'a HistoryStats,
    pub calendar: &'a HolidayCalendar,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(stats: &'a HistoryStats, calendar: &'a HolidayCalendar) -> Self {
        Self { stats, calendar }
    }

    /// One row per observation, in input order.
    pub fn historical(&self, observations: &[Observation]) -> Vec<FeatureRow> {
        observations
            .iter()
            .map(|o| self.row(o.date, &o.covariates))
            .collect()
    }

    /// Fill and derive the feature vector for one date.
    pub fn row(&self, date: NaiveDate, covariates: &Covariates) -> FeatureRow {
        let temperature = finite(covariates.temperature).unwrap_or(self.stats.mean_temperature);
        let precipitation = finite(covariates.precipitation).unwrap_or(0.0);
        let is_weekend = covariates.is_weekend.unwrap_or_else(|| is_weekend(date));
        let is_holiday = covariates
            .is_holiday
            .unwrap_or_else(|| self.calendar.is_holiday(date));
        let school = covariates.school_in_session.unwrap_or(true);
        let seasonal_index = finite(covariates.seasonal_index).unwrap_or(1.0);
        let fuel_price = finite(covariates.fuel_price).unwrap_or(self.stats.mean_fuel_price);

        let month = date.month();
        let mut row = FeatureRow::new(date);
        row.set(Regressor::Temperature, temperature);
        row.set(Regressor::TemperatureSquared, temperature * temperature);
        row.set(Regressor::Rain, flag(precipitation > RAIN_THRESHOLD));
        row.set(Regressor::Precipitation, precipitation);
        row.set(Regressor::IsWeekend, flag(is_weekend));
        row.set(Regressor::IsHoliday, flag(is_holiday));
        row.set(Regressor::SchoolInSession, flag(school));
        row.set(Regressor::WeekendOrHoliday, flag(is_weekend || is_holiday));
        row.set(Regressor::SummerPeak, flag((6..=8).contains(&month)));
        row.set(Regressor::WinterLow, flag(month <= 2 || month == 12));
        row.set(Regressor::SeasonalIndex, seasonal_index);
        row.set(Regressor::FuelPrice, fuel_price);
        row
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(date: NaiveDate, temperature: Option<f64>, fuel: Option<f64>, precip: Option<f64>) -> Observation {
        Observation {
            date,
            visitors: 100,
            covariates: Covariates {
                temperature,
                precipitation: precip,
                fuel_price: fuel,
                ..Covariates::default()
            },
        }
    }

    #[test]
    fn stats_use_observed_values_only() {
        let history = vec![
            obs(day(2024, 1, 1), Some(40.0), Some(3.0), Some(0.5)),
            obs(day(2024, 1, 2), None, Some(4.0), None),
            obs(day(2024, 1, 3), Some(60.0), None, Some(1.0)),
        ];
        let stats = HistoryStats::from_observations(&history).unwrap();
        assert_eq!(stats.mean_temperature, 50.0);
        assert_eq!(stats.mean_fuel_price, 3.5);
        assert_eq!(stats.mean_precipitation, 0.5);
        assert_eq!(stats.start_date, day(2024, 1, 1));
        assert_eq!(stats.end_date, day(2024, 1, 3));
    }

    #[test]
    fn stats_fail_without_temperature() {
        let history = vec![obs(day(2024, 1, 1), None, Some(3.0), None)];
        assert!(matches!(
            HistoryStats::from_observations(&history),
            Err(ForecastError::InsufficientHistory(_))
        ));
        assert!(matches!(
            HistoryStats::from_observations(&[]),
            Err(ForecastError::InsufficientHistory(_))
        ));
    }

    #[test]
    fn gaps_are_filled_and_derived() {
        let history = vec![
            obs(day(2024, 7, 1), Some(80.0), Some(3.0), Some(0.0)),
            obs(day(2024, 7, 3), Some(90.0), Some(4.0), Some(0.0)),
        ];
        let stats = HistoryStats::from_observations(&history).unwrap();
        let calendar = HolidayCalendar::default();
        let builder = FeatureBuilder::new(&stats, &calendar);

        // Thursday July 4th, nothing observed
        let row = builder.row(day(2024, 7, 4), &Covariates::default());
        assert_eq!(row.get(Regressor::Temperature), 85.0);
        assert_eq!(row.get(Regressor::TemperatureSquared), 85.0 * 85.0);
        assert_eq!(row.get(Regressor::Precipitation), 0.0);
        assert_eq!(row.get(Regressor::Rain), 0.0);
        assert_eq!(row.get(Regressor::IsWeekend), 0.0);
        assert_eq!(row.get(Regressor::IsHoliday), 1.0);
        assert_eq!(row.get(Regressor::WeekendOrHoliday), 1.0);
        assert_eq!(row.get(Regressor::SchoolInSession), 1.0);
        assert_eq!(row.get(Regressor::SummerPeak), 1.0);
        assert_eq!(row.get(Regressor::WinterLow), 0.0);
        assert_eq!(row.get(Regressor::SeasonalIndex), 1.0);
        assert_eq!(row.get(Regressor::FuelPrice), 3.5);
    }

    #[test]
    fn observed_flags_take_precedence() {
        let history = vec![obs(day(2024, 12, 1), Some(30.0), Some(3.0), None)];
        let stats = HistoryStats::from_observations(&history).unwrap();
        let calendar = HolidayCalendar::default();
        let builder = FeatureBuilder::new(&stats, &calendar);

        let covariates = Covariates {
            precipitation: Some(0.4),
            is_weekend: Some(true),
            is_holiday: Some(false),
            school_in_session: Some(false),
            ..Covariates::default()
        };
        let row = builder.row(day(2024, 12, 25), &covariates);
        assert_eq!(row.get(Regressor::Rain), 1.0);
        assert_eq!(row.get(Regressor::IsWeekend), 1.0);
        assert_eq!(row.get(Regressor::IsHoliday), 0.0);
        assert_eq!(row.get(Regressor::SchoolInSession), 0.0);
        assert_eq!(row.get(Regressor::WinterLow), 1.0);
    }
}
