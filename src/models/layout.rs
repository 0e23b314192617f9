//! Column layout of the multiplicative part of the model.
//!
//! Everything other than the trend enters as a linear term inside one of two
//! factors, `level = 1 + X_Lβ_L` and `weekly = 1 + X_Wβ_W`, with
//! `yhat = trend · level · weekly`. Each column belongs to exactly one factor
//! (see `Factor`). The columns of `X` are, in order:
//!
//! 1. one Fourier block per seasonality (`2 × order` columns, optionally
//!    gated by the row's `is_holiday` flag)
//! 2. one indicator per holiday rule (optionally gated by `is_holiday`)
//! 3. one standardized column per regressor
//!
//! `Components` holds both the structure (periods, priors, standardization)
//! and the fitted coefficients. The fitter builds it with zero coefficients,
//! solves, then writes the coefficients back.

use serde::{Deserialize, Serialize};

use crate::domain::{Condition, Factor, FeatureRow, ModelConfig, Regressor};
use crate::features::{HolidayCalendar, HolidayDate};
use crate::math::{epoch_days, fill_fourier, mean, std_dev};

/// Standard deviations below this are treated as constant columns.
const MIN_STD: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalBlock {
    pub name: String,
    pub period: f64,
    pub fourier_order: usize,
    pub prior_scale: f64,
    pub condition: Option<Condition>,
    #[serde(default)]
    pub factor: Factor,
    /// `[sin_1, cos_1, ..., sin_K, cos_K]`.
    pub coefficients: Vec<f64>,
}

impl SeasonalBlock {
    pub fn width(&self) -> usize {
        2 * self.fourier_order
    }

    fn active(&self, row: &FeatureRow) -> bool {
        match self.condition {
            None => true,
            Some(Condition::IsHoliday) => row.is_holiday(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayTerm {
    pub name: String,
    pub date: HolidayDate,
    /// Calendar impact weight; scales this holiday's prior.
    pub weight: f64,
    pub prior_scale: f64,
    /// Only active on rows flagged `is_holiday`.
    pub conditioned: bool,
    pub coefficient: f64,
}

impl HolidayTerm {
    fn value(&self, row: &FeatureRow) -> f64 {
        let hit = self.date.matches(row.date) && (!self.conditioned || row.is_holiday());
        if hit { 1.0 } else { 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressorTerm {
    pub regressor: Regressor,
    pub prior_scale: f64,
    /// Training mean used for standardization.
    pub mean: f64,
    /// Training standard deviation (1.0 for constant columns).
    pub std: f64,
    pub coefficient: f64,
}

impl RegressorTerm {
    fn value(&self, row: &FeatureRow) -> f64 {
        (row.get(self.regressor) - self.mean) / self.std
    }
}

/// Per-date contribution of each component group to the two factors.
///
/// `seasonal`, `holidays` and `regressors` sum to `level − 1`;
/// `weekly_seasonal` and `weekly_regressors` sum to `weekly − 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MultiplierParts {
    pub seasonal: f64,
    pub holidays: f64,
    pub regressors: f64,
    pub weekly_seasonal: f64,
    pub weekly_regressors: f64,
}

impl MultiplierParts {
    pub fn level(&self) -> f64 {
        1.0 + self.seasonal + self.holidays + self.regressors
    }

    pub fn weekly(&self) -> f64 {
        1.0 + self.weekly_seasonal + self.weekly_regressors
    }

    /// What the trend is multiplied by.
    pub fn factor(&self) -> f64 {
        self.level() * self.weekly()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub seasonalities: Vec<SeasonalBlock>,
    pub holidays: Vec<HolidayTerm>,
    pub regressors: Vec<RegressorTerm>,
}

impl Components {
    /// Lay out all components for a training set, with standardization taken
    /// from `rows` and coefficients at zero.
    pub fn for_training(config: &ModelConfig, calendar: &HolidayCalendar, rows: &[FeatureRow]) -> Self {
        let seasonalities = config
            .seasonalities
            .iter()
            .map(|s| SeasonalBlock {
                name: s.name.clone(),
                period: s.period,
                fourier_order: s.fourier_order,
                prior_scale: config.seasonality_prior(s),
                condition: s.condition,
                factor: s.factor,
                coefficients: vec![0.0; s.width()],
            })
            .collect();

        let holidays = calendar
            .rules
            .iter()
            .map(|rule| HolidayTerm {
                name: rule.name.clone(),
                date: rule.date,
                weight: rule.weight,
                prior_scale: config.holidays_prior_scale * rule.weight,
                conditioned: config.holidays_conditioned,
                coefficient: 0.0,
            })
            .collect();

        let regressors = config
            .regressors
            .iter()
            .map(|prior| {
                let values: Vec<f64> = rows.iter().map(|r| r.get(prior.regressor)).collect();
                let mu = mean(&values).unwrap_or(0.0);
                let sd = std_dev(&values).unwrap_or(0.0);
                RegressorTerm {
                    regressor: prior.regressor,
                    prior_scale: prior.prior_scale,
                    mean: mu,
                    std: if sd > MIN_STD { sd } else { 1.0 },
                    coefficient: 0.0,
                }
            })
            .collect();

        Self {
            seasonalities,
            holidays,
            regressors,
        }
    }

    /// Total number of design columns.
    pub fn width(&self) -> usize {
        self.seasonalities.iter().map(|s| s.width()).sum::<usize>()
            + self.holidays.len()
            + self.regressors.len()
    }

    /// Fill a design row for `row` (length must be `self.width()`).
    pub fn fill_design_row(&self, row: &FeatureRow, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.width());
        let t_days = epoch_days(row.date);
        let mut offset = 0;

        for block in &self.seasonalities {
            let w = block.width();
            let cols = &mut out[offset..offset + w];
            if block.active(row) {
                fill_fourier(t_days, block.period, block.fourier_order, cols);
            } else {
                cols.fill(0.0);
            }
            offset += w;
        }
        for h in &self.holidays {
            out[offset] = h.value(row);
            offset += 1;
        }
        for r in &self.regressors {
            out[offset] = r.value(row);
            offset += 1;
        }
    }

    /// Factor of each design column.
    pub fn column_factors(&self) -> Vec<Factor> {
        let mut out = Vec::with_capacity(self.width());
        for block in &self.seasonalities {
            out.extend(std::iter::repeat_n(block.factor, block.width()));
        }
        out.extend(std::iter::repeat_n(Factor::Level, self.holidays.len()));
        out.extend(self.regressors.iter().map(|r| r.regressor.factor()));
        out
    }

    /// L2 penalties `1 / prior_scale²`, aligned with the design columns.
    pub fn penalties(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.width());
        for block in &self.seasonalities {
            out.extend(std::iter::repeat_n(inv_sq(block.prior_scale), block.width()));
        }
        out.extend(self.holidays.iter().map(|h| inv_sq(h.prior_scale)));
        out.extend(self.regressors.iter().map(|r| inv_sq(r.prior_scale)));
        out
    }

    /// Coefficients flattened in design-column order.
    pub fn coefficients(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.width());
        for block in &self.seasonalities {
            out.extend_from_slice(&block.coefficients);
        }
        out.extend(self.holidays.iter().map(|h| h.coefficient));
        out.extend(self.regressors.iter().map(|r| r.coefficient));
        out
    }

    /// Inverse of `coefficients`.
    pub fn set_coefficients(&mut self, beta: &[f64]) {
        debug_assert_eq!(beta.len(), self.width());
        let mut offset = 0;
        for block in &mut self.seasonalities {
            let w = block.width();
            block.coefficients.copy_from_slice(&beta[offset..offset + w]);
            offset += w;
        }
        for h in &mut self.holidays {
            h.coefficient = beta[offset];
            offset += 1;
        }
        for r in &mut self.regressors {
            r.coefficient = beta[offset];
            offset += 1;
        }
    }

    /// Evaluate both factors for one row, split by component group.
    pub fn multiplier(&self, row: &FeatureRow) -> MultiplierParts {
        let t_days = epoch_days(row.date);
        let mut parts = MultiplierParts::default();
        let mut buf = Vec::new();

        for block in &self.seasonalities {
            if !block.active(row) {
                continue;
            }
            buf.resize(block.width(), 0.0);
            fill_fourier(t_days, block.period, block.fourier_order, &mut buf);
            let effect = dot(&buf, &block.coefficients);
            match block.factor {
                Factor::Level => parts.seasonal += effect,
                Factor::Weekly => parts.weekly_seasonal += effect,
            }
        }
        parts.holidays = self.holidays.iter().map(|h| h.value(row) * h.coefficient).sum();
        for r in &self.regressors {
            let effect = r.value(row) * r.coefficient;
            match r.regressor.factor() {
                Factor::Level => parts.regressors += effect,
                Factor::Weekly => parts.weekly_regressors += effect,
            }
        }
        parts
    }
}

fn inv_sq(scale: f64) -> f64 {
    1.0 / (scale * scale)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rows() -> Vec<FeatureRow> {
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        start
            .iter_days()
            .take(10)
            .enumerate()
            .map(|(i, date)| {
                let mut row = FeatureRow::new(date);
                row.set(Regressor::Temperature, 70.0 + i as f64);
                row.set(Regressor::FuelPrice, 3.0);
                row.set(Regressor::IsHoliday, if i == 3 { 1.0 } else { 0.0 });
                row
            })
            .collect()
    }

    #[test]
    fn default_layout_width_and_penalties() {
        let config = ModelConfig::default();
        let calendar = HolidayCalendar::default();
        let c = Components::for_training(&config, &calendar, &rows());
        assert_eq!(c.width(), 54 + 6 + 12);
        let p = c.penalties();
        assert_eq!(p.len(), c.width());
        // weekly block uses the seasonality prior
        assert!((p[0] - 1.0 / 225.0).abs() < 1e-15);
        // Independence Day: holiday prior scaled by its weight
        assert!((p[54 + 2] - 1.0 / (22.5 * 22.5)).abs() < 1e-15);
    }

    #[test]
    fn constant_regressor_contributes_nothing() {
        let config = ModelConfig::default();
        let calendar = HolidayCalendar::default();
        let mut c = Components::for_training(&config, &calendar, &rows());
        let fuel = c
            .regressors
            .iter()
            .position(|r| r.regressor == Regressor::FuelPrice)
            .unwrap();
        assert_eq!(c.regressors[fuel].std, 1.0);

        let mut beta = vec![0.0; c.width()];
        beta[60 + fuel] = 5.0;
        c.set_coefficients(&beta);
        assert_eq!(c.coefficients(), beta);
        for row in rows() {
            assert_eq!(c.multiplier(&row).factor(), 1.0);
        }
    }

    #[test]
    fn design_row_matches_multiplier() {
        let config = ModelConfig::default();
        let calendar = HolidayCalendar::default();
        let training = rows();
        let mut c = Components::for_training(&config, &calendar, &training);
        let beta: Vec<f64> = (0..c.width()).map(|j| 0.01 * (j as f64 + 1.0)).collect();
        c.set_coefficients(&beta);

        let factors = c.column_factors();
        let mut x = vec![0.0; c.width()];
        for row in &training {
            c.fill_design_row(row, &mut x);
            let mut level = 1.0;
            let mut weekly = 1.0;
            for ((v, b), f) in x.iter().zip(beta.iter()).zip(factors.iter()) {
                match f {
                    Factor::Level => level += v * b,
                    Factor::Weekly => weekly += v * b,
                }
            }
            let parts = c.multiplier(row);
            assert!((level - parts.level()).abs() < 1e-12);
            assert!((weekly - parts.weekly()).abs() < 1e-12);
        }
    }

    #[test]
    fn day_of_week_columns_form_the_weekly_factor() {
        let config = ModelConfig::default();
        let calendar = HolidayCalendar::default();
        let c = Components::for_training(&config, &calendar, &rows());
        let factors = c.column_factors();
        assert_eq!(factors.len(), c.width());

        let weekly: Vec<usize> = (0..factors.len()).filter(|&j| factors[j] == Factor::Weekly).collect();
        let weekend = 60 + Regressor::IsWeekend.index();
        let weekend_or_holiday = 60 + Regressor::WeekendOrHoliday.index();
        assert_eq!(weekly, vec![0, 1, 2, 3, 4, 5, weekend, weekend_or_holiday]);
    }

    #[test]
    fn conditional_block_is_gated() {
        let config = ModelConfig::default();
        let calendar = HolidayCalendar::default();
        let training = rows();
        let c = Components::for_training(&config, &calendar, &training);
        let mut x = vec![0.0; c.width()];
        // "holidays" block occupies columns 50..54
        c.fill_design_row(&training[0], &mut x);
        assert!(x[50..54].iter().all(|&v| v == 0.0));
        c.fill_design_row(&training[3], &mut x);
        assert!(x[50..54].iter().any(|&v| v != 0.0));
    }
}
