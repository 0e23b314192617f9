//! Future covariate synthesis.
//!
//! Future dates have no observed weather or prices, so the builder fills them
//! from smooth climatology plus a seeded precipitation draw:
//!
//! ```text
//! temperature    = mean + 15·sin(2π(doy − 80)/365)
//! precipitation  ~ Poisson(mean precipitation)
//! fuel price     = mean·(1 + 0.03·years since history start)
//! seasonal index = 0.6 + 0.8·(sin(2π(doy − 80)/365) + 1)
//! school         = month ≤ 5 or month ≥ 9
//! ```
//!
//! Weekend and holiday flags come from the date and the calendar. The whole
//! range is synthesized in one batch from a single seeded generator, so the
//! same `(dates, seed)` always yields the same rows.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Poisson};

use crate::domain::{Covariates, FeatureRow};
use crate::features::FeatureBuilder;
use crate::features::builder::is_weekend;

const TEMPERATURE_AMPLITUDE: f64 = 15.0;
const FUEL_ANNUAL_GROWTH: f64 = 0.03;

impl FeatureBuilder<'_> {
    /// Synthesize feature rows for `dates` (typically after the training end).
    pub fn synthesize(&self, dates: &[NaiveDate], seed: u64) -> Vec<FeatureRow> {
        let mut rng = StdRng::seed_from_u64(seed);
        let poisson = Poisson::new(self.stats.mean_precipitation).ok();

        dates
            .iter()
            .map(|&date| {
                let wave = annual_wave(date);
                let precipitation = match &poisson {
                    Some(dist) => dist.sample(&mut rng),
                    None => 0.0,
                };
                let years = (date - self.stats.start_date).num_days() as f64 / 365.0;
                let month = date.month();

                let covariates = Covariates {
                    temperature: Some(self.stats.mean_temperature + TEMPERATURE_AMPLITUDE * wave),
                    precipitation: Some(precipitation),
                    is_weekend: Some(is_weekend(date)),
                    is_holiday: Some(self.calendar.is_holiday(date)),
                    school_in_session: Some(month <= 5 || month >= 9),
                    seasonal_index: Some(0.6 + 0.8 * (wave + 1.0)),
                    fuel_price: Some(self.stats.mean_fuel_price * (1.0 + FUEL_ANNUAL_GROWTH * years)),
                };
                self.row(date, &covariates)
            })
            .collect()
    }
}

/// `sin(2π(doy − 80)/365)`: zero near the March equinox, peaking in late June.
fn annual_wave(date: NaiveDate) -> f64 {
    (2.0 * PI * (date.ordinal() as f64 - 80.0) / 365.0).sin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Regressor;
    use crate::features::{HistoryStats, HolidayCalendar};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stats() -> HistoryStats {
        HistoryStats {
            start_date: day(2023, 1, 1),
            end_date: day(2023, 12, 31),
            mean_temperature: 60.0,
            mean_precipitation: 0.3,
            mean_fuel_price: 3.5,
        }
    }

    #[test]
    fn synthesis_follows_climatology() {
        let stats = stats();
        let calendar = HolidayCalendar::default();
        let builder = FeatureBuilder::new(&stats, &calendar);
        let dates: Vec<NaiveDate> = day(2024, 1, 1).iter_days().take(366).collect();
        let rows = builder.synthesize(&dates, 7);

        let summer = rows.iter().find(|r| r.date == day(2024, 6, 25)).unwrap();
        let winter = rows.iter().find(|r| r.date == day(2024, 12, 25)).unwrap();
        assert!(summer.get(Regressor::Temperature) > 74.0);
        assert!(winter.get(Regressor::Temperature) < 47.0);
        assert!(summer.get(Regressor::SeasonalIndex) > 2.1);
        assert_eq!(summer.get(Regressor::SchoolInSession), 0.0);
        assert_eq!(winter.get(Regressor::IsHoliday), 1.0);

        // one year in: fuel grows by 3%
        let first = rows[0].get(Regressor::FuelPrice);
        assert!((first - 3.5 * (1.0 + 0.03 * 365.0 / 365.0)).abs() < 1e-12);
        for r in &rows {
            let p = r.get(Regressor::Precipitation);
            assert!(p >= 0.0 && p.fract() == 0.0);
            assert_eq!(r.get(Regressor::Rain), if p > 0.1 { 1.0 } else { 0.0 });
        }
    }

    #[test]
    fn synthesis_is_seeded() {
        let stats = stats();
        let calendar = HolidayCalendar::default();
        let builder = FeatureBuilder::new(&stats, &calendar);
        let dates: Vec<NaiveDate> = day(2024, 3, 1).iter_days().take(60).collect();
        assert_eq!(builder.synthesize(&dates, 11), builder.synthesize(&dates, 11));
    }

    #[test]
    fn dry_history_synthesizes_dry_future() {
        let stats = HistoryStats {
            mean_precipitation: 0.0,
            ..stats()
        };
        let calendar = HolidayCalendar::default();
        let builder = FeatureBuilder::new(&stats, &calendar);
        let dates: Vec<NaiveDate> = day(2024, 3, 1).iter_days().take(30).collect();
        assert!(builder.synthesize(&dates, 1).iter().all(|r| r.get(Regressor::Rain) == 0.0));
    }
}
