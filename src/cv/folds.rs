//! Cutoff planning for rolling-origin cross-validation.
//!
//! With `L` daily observations, initial window `I`, horizon `H` and step `S`,
//! cutoff `k` is the row `I − 1 + k·S`. Each fold needs `H` rows after its
//! cutoff, so there are `floor((L − I − H) / S) + 1` folds when `L ≥ I + H`
//! and none otherwise.

use crate::domain::{CvConfig, CvWindow};
use crate::error::{ForecastError, Result};

/// Row ranges for one fold (half-open, indices into the sorted history).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldPlan {
    pub train_start: usize,
    /// Index of the cutoff row (last training row).
    pub cutoff: usize,
    /// One past the last scored row.
    pub horizon_end: usize,
}

impl FoldPlan {
    pub fn train(&self) -> std::ops::Range<usize> {
        self.train_start..self.cutoff + 1
    }

    pub fn horizon(&self) -> std::ops::Range<usize> {
        self.cutoff + 1..self.horizon_end
    }
}

pub fn validate(config: &CvConfig) -> Result<()> {
    if config.initial_days < 2 {
        return Err(ForecastError::InvalidRequest(format!(
            "cv initial window must be at least 2 days, got {}",
            config.initial_days
        )));
    }
    if config.period_days == 0 || config.horizon_days == 0 {
        return Err(ForecastError::InvalidRequest(
            "cv period and horizon must be > 0".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.min_fold_fraction) {
        return Err(ForecastError::InvalidRequest(format!(
            "min_fold_fraction must be in [0, 1], got {}",
            config.min_fold_fraction
        )));
    }
    Ok(())
}

pub fn fold_count(len: usize, config: &CvConfig) -> usize {
    let needed = config.initial_days + config.horizon_days;
    if len < needed || config.period_days == 0 {
        return 0;
    }
    (len - needed) / config.period_days + 1
}

pub fn plan_folds(len: usize, config: &CvConfig) -> Vec<FoldPlan> {
    (0..fold_count(len, config))
        .map(|k| {
            let cutoff = config.initial_days - 1 + k * config.period_days;
            let train_start = match config.window {
                CvWindow::Expanding => 0,
                CvWindow::Rolling => cutoff + 1 - config.initial_days,
            };
            FoldPlan {
                train_start,
                cutoff,
                horizon_end: cutoff + 1 + config.horizon_days,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(i: usize, s: usize, h: usize, window: CvWindow) -> CvConfig {
        CvConfig {
            initial_days: i,
            period_days: s,
            horizon_days: h,
            window,
            ..CvConfig::default()
        }
    }

    #[test]
    fn fold_count_formula() {
        let c = cfg(60, 30, 30, CvWindow::Expanding);
        assert_eq!(fold_count(89, &c), 0);
        assert_eq!(fold_count(90, &c), 1);
        assert_eq!(fold_count(119, &c), 1);
        assert_eq!(fold_count(120, &c), 2);
        assert_eq!(fold_count(200, &c), 4);
    }

    #[test]
    fn plans_stay_inside_the_series() {
        let len = 200;
        let c = cfg(60, 30, 30, CvWindow::Expanding);
        let plans = plan_folds(len, &c);
        assert_eq!(plans.len(), 4);
        assert_eq!(plans[0].train(), 0..60);
        assert_eq!(plans[0].horizon(), 60..90);
        assert_eq!(plans[3].cutoff, 149);
        assert!(plans.iter().all(|p| p.horizon_end <= len));
    }

    #[test]
    fn rolling_window_keeps_initial_length() {
        let c = cfg(60, 30, 30, CvWindow::Rolling);
        for p in plan_folds(200, &c) {
            assert_eq!(p.train().len(), 60);
        }
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(validate(&cfg(1, 30, 30, CvWindow::Expanding)).is_err());
        assert!(validate(&cfg(60, 0, 30, CvWindow::Expanding)).is_err());
        assert!(validate(&CvConfig::default()).is_ok());
    }
}
