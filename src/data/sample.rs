//! Synthetic visitor histories.
//!
//! Produces realistic daily series for demos and tests: annual cycle, weekend
//! lift, holiday spikes, weather dips, a slow trend and multiplicative noise,
//! with every covariate populated. Everything is driven by a seeded `StdRng`,
//! so the same `(site, start, days, profile, seed)` always yields the same
//! series.

use std::collections::hash_map::DefaultHasher;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Covariates, Observation, SiteId};
use crate::features::HolidayCalendar;
use crate::features::builder::is_weekend;

/// Day of year at which the annual cycle peaks (mid-July).
const PEAK_DOY: f64 = 196.0;

/// Mean of `cos` over a ±45 day band around the peak; converts the
/// summer/winter ratio of monthly means into a peak amplitude.
const BAND_MEAN_COS: f64 = 0.9;

/// Monthly seasonal factor reported alongside the counts.
const MONTH_FACTORS: [f64; 12] = [0.6, 0.65, 0.8, 1.1, 1.3, 1.5, 1.6, 1.5, 1.2, 1.1, 0.8, 0.7];

#[derive(Debug, Clone, PartialEq)]
pub struct SampleProfile {
    /// Typical daily visitors at the start of the series.
    pub base_visitors: f64,
    /// Linear growth per year, as a fraction of the base.
    pub annual_growth: f64,
    /// Weekend multiplier.
    pub weekend_lift: f64,
    /// Ratio of mean summer (Jun–Aug) to mean winter (Dec–Feb) visitors.
    pub summer_winter_ratio: f64,
    /// Standard deviation of the log-normal day-to-day noise.
    pub noise_sd: f64,
    pub rain_probability: f64,
    pub mean_temperature: f64,
    pub temperature_swing: f64,
    pub fuel_price: f64,
}

impl Default for SampleProfile {
    fn default() -> Self {
        Self {
            base_visitors: 2000.0,
            annual_growth: 0.03,
            weekend_lift: 1.3,
            summer_winter_ratio: 2.5,
            noise_sd: 0.05,
            rain_probability: 0.25,
            mean_temperature: 60.0,
            temperature_swing: 25.0,
            fuel_price: 3.5,
        }
    }
}

/// Generate `days` consecutive observations for one site starting at `start`.
pub fn generate_site_history(
    site_id: &str,
    start: NaiveDate,
    days: usize,
    profile: &SampleProfile,
    seed: u64,
) -> Vec<Observation> {
    let mut rng = StdRng::seed_from_u64(site_seed(site_id, seed));
    let noise = Normal::new(0.0, profile.noise_sd).ok();
    let temp_noise = Normal::new(0.0, 5.0).ok();
    let fuel_noise = Normal::new(0.0, 0.03).ok();
    let calendar = HolidayCalendar::default();

    let amplitude = profile.summer_winter_ratio.max(1.0).ln() / (2.0 * BAND_MEAN_COS);
    let mut fuel = profile.fuel_price;

    start
        .iter_days()
        .take(days)
        .enumerate()
        .map(|(i, date)| {
            let phase = 2.0 * PI * (date.ordinal() as f64 - PEAK_DOY) / 365.25;
            let years = i as f64 / 365.25;

            let temperature = profile.mean_temperature
                + profile.temperature_swing * phase.cos()
                + draw(&temp_noise, &mut rng);
            let precipitation = if rng.gen_bool(profile.rain_probability.clamp(0.0, 1.0)) {
                rng.gen_range(1..20) as f64 / 10.0
            } else {
                0.0
            };
            fuel += 0.05 * (profile.fuel_price - fuel) + draw(&fuel_noise, &mut rng);

            let weekend = is_weekend(date);
            let holiday = calendar.holiday_on(date);

            let mut level = profile.base_visitors * (1.0 + profile.annual_growth * years);
            level *= (amplitude * phase.cos()).exp();
            if weekend {
                level *= profile.weekend_lift;
            }
            if let Some(rule) = holiday {
                level *= rule.weight;
            }
            level *= weather_factor(temperature, precipitation);
            level *= draw(&noise, &mut rng).exp();

            Observation {
                date,
                visitors: level.round().max(0.0) as u32,
                covariates: Covariates {
                    temperature: Some(temperature.round()),
                    precipitation: Some(precipitation),
                    is_weekend: Some(weekend),
                    is_holiday: Some(holiday.is_some()),
                    school_in_session: Some(school_in_session(date)),
                    seasonal_index: Some(MONTH_FACTORS[date.month0() as usize]),
                    fuel_price: Some((fuel * 100.0).round() / 100.0),
                },
            }
        })
        .collect()
}

/// Generate histories for several sites; each site gets its own size and
/// seasonality derived from its id.
pub fn generate_dataset(sites: &[SiteId], start: NaiveDate, days: usize, seed: u64) -> Vec<(SiteId, Vec<Observation>)> {
    sites
        .iter()
        .map(|site| {
            let mut rng = StdRng::seed_from_u64(site_seed(site, seed ^ 0x5eed));
            let profile = SampleProfile {
                base_visitors: rng.gen_range(300.0..5000.0_f64).round(),
                summer_winter_ratio: rng.gen_range(1.5..3.5),
                weekend_lift: rng.gen_range(1.15..1.45),
                ..SampleProfile::default()
            };
            (site.clone(), generate_site_history(site, start, days, &profile, seed))
        })
        .collect()
}

fn draw(dist: &Option<Normal<f64>>, rng: &mut StdRng) -> f64 {
    dist.as_ref().map_or(0.0, |d| d.sample(rng))
}

/// Visitor multiplier for the day's weather.
fn weather_factor(temperature: f64, precipitation: f64) -> f64 {
    if precipitation > 1.0 {
        0.6
    } else if precipitation > 0.1 {
        0.8
    } else if temperature > 95.0 {
        0.85
    } else if temperature < 25.0 {
        0.7
    } else {
        1.0
    }
}

/// School calendar with summer, winter and spring breaks.
fn school_in_session(date: NaiveDate) -> bool {
    let (month, day) = (date.month(), date.day());
    if (6..=8).contains(&month) {
        return false;
    }
    if (month == 12 && day > 20) || (month == 1 && day < 8) {
        return false;
    }
    !(month == 3 && (10..=20).contains(&day))
}

fn site_seed(site_id: &str, seed: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    site_id.hash(&mut hasher);
    seed.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn mean_where(history: &[Observation], pred: impl Fn(&Observation) -> bool) -> f64 {
        let v: Vec<f64> = history
            .iter()
            .filter(|o| pred(o))
            .map(|o| f64::from(o.visitors))
            .collect();
        v.iter().sum::<f64>() / v.len() as f64
    }

    #[test]
    fn generation_is_deterministic_per_site_and_seed() {
        let p = SampleProfile::default();
        let a = generate_site_history("GRCA", day(2023, 1, 1), 90, &p, 1);
        let b = generate_site_history("GRCA", day(2023, 1, 1), 90, &p, 1);
        let c = generate_site_history("YOSE", day(2023, 1, 1), 90, &p, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 90);
        assert_eq!(a[89].date, day(2023, 3, 31));
    }

    #[test]
    fn weekly_and_annual_shape() {
        let p = SampleProfile::default();
        let history = generate_site_history("GRCA", day(2022, 1, 1), 3 * 365, &p, 2);

        let weekend = mean_where(&history, |o| is_weekend(o.date));
        let weekday = mean_where(&history, |o| !is_weekend(o.date));
        let ratio = weekend / weekday;
        assert!((ratio - 1.3).abs() < 0.08, "weekend ratio {ratio}");

        let summer = mean_where(&history, |o| (6..=8).contains(&o.date.month()));
        let winter = mean_where(&history, |o| o.date.month() <= 2 || o.date.month() == 12);
        let seasonal = summer / winter;
        assert!(seasonal > 2.0 && seasonal < 3.2, "summer/winter {seasonal}");
    }

    #[test]
    fn covariates_are_populated() {
        let history = generate_site_history("GRCA", day(2024, 7, 1), 10, &SampleProfile::default(), 3);
        let july4 = &history[3];
        assert_eq!(july4.covariates.is_holiday, Some(true));
        assert_eq!(july4.covariates.school_in_session, Some(false));
        assert!(history.iter().all(|o| o.covariates.temperature.is_some()));
        assert!(history.iter().all(|o| o.covariates.fuel_price.is_some()));
    }
}
