//! Reporting utilities: forecast summaries and formatted terminal output.
//!
//! Formatting lives here so the engine stays free of presentation code and
//! output changes are localized.

pub mod format;

pub use format::*;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::domain::ForecastRow;

/// Headline numbers of a forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSummary {
    pub days: usize,
    pub total_visitors: u64,
    pub mean_daily: f64,
    pub peak: Option<(NaiveDate, u64)>,
    /// Mean weekend day over mean weekday; `None` if either is absent.
    pub weekend_ratio: Option<f64>,
}

pub fn summarize(rows: &[ForecastRow]) -> ForecastSummary {
    let total: u64 = rows.iter().map(|r| r.point_estimate).sum();
    let mean_daily = if rows.is_empty() {
        0.0
    } else {
        total as f64 / rows.len() as f64
    };
    // Earliest date wins ties.
    let peak = rows
        .iter()
        .fold(None::<&ForecastRow>, |best, r| match best {
            Some(b) if b.point_estimate >= r.point_estimate => Some(b),
            _ => Some(r),
        })
        .map(|r| (r.date, r.point_estimate));

    ForecastSummary {
        days: rows.len(),
        total_visitors: total,
        mean_daily,
        peak,
        weekend_ratio: weekend_ratio(rows.iter().map(|r| (r.date, r.point_estimate as f64))),
    }
}

/// Mean weekend value over mean weekday value.
pub fn weekend_ratio(values: impl IntoIterator<Item = (NaiveDate, f64)>) -> Option<f64> {
    let (mut we, mut we_n, mut wd, mut wd_n) = (0.0, 0usize, 0.0, 0usize);
    for (date, v) in values {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            we += v;
            we_n += 1;
        } else {
            wd += v;
            wd_n += 1;
        }
    }
    if we_n == 0 || wd_n == 0 || wd == 0.0 {
        return None;
    }
    Some((we / we_n as f64) / (wd / wd_n as f64))
}
