//! Rolling-origin cross-validation.
//!
//! Each fold fits on observations up to its cutoff, predicts the following
//! `horizon_days` with the observed covariates of those days, and records
//! `(actual, predicted)` pairs. Folds are independent and run in parallel
//! over the read-only history. A fold that fails to fit is logged and
//! omitted; if fewer than `min_fold_fraction` of the planned folds succeed the
//! metrics are reported unavailable.

pub mod folds;
pub mod metrics;

pub use folds::*;
pub use metrics::*;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::domain::{CvConfig, FoldPoint, ModelConfig, ModelMetrics, Observation};
use crate::error::{ForecastError, Result};
use crate::features::HolidayCalendar;
use crate::fit::{Optimizer, fit_model};

/// Outcome of one cross-validation run.
#[derive(Debug, Clone)]
pub struct CvReport {
    pub planned_folds: usize,
    pub successful_folds: usize,
    /// Scored points of the successful folds, ordered by cutoff then date.
    pub points: Vec<FoldPoint>,
    /// `None` when CV was skipped or too few folds succeeded.
    pub accuracy: Option<Accuracy>,
}

impl CvReport {
    fn skipped(planned_folds: usize) -> Self {
        Self {
            planned_folds,
            successful_folds: 0,
            points: Vec::new(),
            accuracy: None,
        }
    }

    /// Metrics surface for a model trained on `training_points` observations.
    pub fn metrics(&self, training_points: usize, fit_timestamp: DateTime<Utc>) -> ModelMetrics {
        match &self.accuracy {
            Some(acc) => ModelMetrics {
                mae: Some(acc.mae),
                mape: acc.mape,
                rmse: Some(acc.rmse),
                training_points,
                fit_timestamp,
                folds: self.successful_folds,
            },
            None => ModelMetrics::unavailable(training_points, fit_timestamp),
        }
    }
}

/// Run rolling-origin CV for one site.
///
/// Returns `InvalidRequest` for a bad CV configuration or duplicate dates. A
/// series shorter than `initial_days + horizon_days` is not an error: the
/// report has zero folds and no accuracy.
pub fn cross_validate(
    site_id: &str,
    observations: &[Observation],
    model_config: &ModelConfig,
    cv_config: &CvConfig,
    calendar: &HolidayCalendar,
    optimizer: &dyn Optimizer,
    clock: &dyn Clock,
) -> Result<CvReport> {
    folds::validate(cv_config)?;

    let mut obs = observations.to_vec();
    obs.sort_by_key(|o| o.date);
    if let Some(dup) = obs.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(ForecastError::InvalidRequest(format!(
            "site {site_id}: duplicate observation for {}",
            dup[0].date
        )));
    }

    let plans = plan_folds(obs.len(), cv_config);
    if plans.is_empty() {
        warn!(
            site = site_id,
            points = obs.len(),
            needed = cv_config.initial_days + cv_config.horizon_days,
            "series too short for cross-validation; metrics unavailable"
        );
        return Ok(CvReport::skipped(0));
    }

    let horizon = Duration::days(cv_config.horizon_days as i64);
    let mut scored: Vec<(usize, Vec<FoldPoint>)> = plans
        .par_iter()
        .enumerate()
        .filter_map(|(idx, plan)| {
            let train = &obs[plan.train()];
            let cutoff = obs[plan.cutoff].date;
            let model = match fit_model(site_id, train, model_config, calendar, optimizer, clock) {
                Ok(m) => m,
                Err(e) => {
                    warn!(site = site_id, %cutoff, error = %e, "cv fold failed; omitting");
                    return None;
                }
            };

            let held_out: Vec<Observation> = obs[plan.horizon()]
                .iter()
                .filter(|o| o.date > cutoff && o.date <= cutoff + horizon)
                .cloned()
                .collect();
            let rows = model.feature_builder().historical(&held_out);
            let predicted = model.point_forecast(&rows);

            let points = held_out
                .iter()
                .zip(predicted)
                .map(|(o, p)| FoldPoint {
                    cutoff,
                    date: o.date,
                    actual: o.visitors as f64,
                    predicted: p,
                })
                .collect();
            Some((idx, points))
        })
        .collect();
    scored.sort_by_key(|(idx, _)| *idx);

    let planned = plans.len();
    let successful = scored.len();
    let points: Vec<FoldPoint> = scored.into_iter().flat_map(|(_, p)| p).collect();

    let required = (cv_config.min_fold_fraction * planned as f64).ceil() as usize;
    let accuracy = if successful >= required.max(1) {
        accuracy(&points)
    } else {
        warn!(
            site = site_id,
            planned,
            successful,
            required,
            "too few cv folds succeeded; metrics unavailable"
        );
        None
    };

    if let Some(acc) = &accuracy {
        info!(
            site = site_id,
            folds = successful,
            planned,
            mae = acc.mae,
            rmse = acc.rmse,
            mape = ?acc.mape,
            "cross-validation complete"
        );
    }

    Ok(CvReport {
        planned_folds: planned,
        successful_folds: successful,
        points,
        accuracy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::data::sample::{SampleProfile, generate_site_history};
    use crate::domain::CvWindow;
    use crate::fit::RidgeSolver;
    use chrono::{NaiveDate, TimeZone};
    use nalgebra::{DMatrix, DVector};

    /// Fails every solve whose design has one of the given row counts. Under
    /// an expanding window that is the fold's training length.
    struct FailOnRows(Vec<usize>);

    impl Optimizer for FailOnRows {
        fn solve(&self, design: &DMatrix<f64>, target: &DVector<f64>, penalties: &[f64]) -> Result<DVector<f64>> {
            if self.0.contains(&design.nrows()) {
                return Err(ForecastError::ConvergenceFailure(format!(
                    "refusing {} rows",
                    design.nrows()
                )));
            }
            RidgeSolver.solve(design, target, penalties)
        }
    }

    /// Six expanding folds trained on 60, 90, ..., 210 days.
    fn six_folds(obs: &[Observation], failing: &[usize]) -> CvReport {
        let cv = CvConfig {
            initial_days: 60,
            period_days: 30,
            horizon_days: 30,
            window: CvWindow::Expanding,
            min_fold_fraction: 0.5,
        };
        cross_validate(
            "ACAD",
            obs,
            &ModelConfig::default(),
            &cv,
            &HolidayCalendar::default(),
            &FailOnRows(failing.to_vec()),
            &clock(),
        )
        .unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    }

    fn history(days: usize) -> Vec<Observation> {
        generate_site_history(
            "ACAD",
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            days,
            &SampleProfile::default(),
            11,
        )
    }

    #[test]
    fn short_series_skips_cv() {
        let report = cross_validate(
            "ACAD",
            &history(80),
            &ModelConfig::default(),
            &CvConfig::default(),
            &HolidayCalendar::default(),
            &RidgeSolver,
            &clock(),
        )
        .unwrap();
        assert_eq!(report.planned_folds, 0);
        assert!(report.accuracy.is_none());
        let m = report.metrics(80, clock().now());
        assert!(!m.is_available());
    }

    #[test]
    fn folds_score_only_dates_after_their_cutoff() {
        let cv = CvConfig {
            initial_days: 120,
            period_days: 60,
            horizon_days: 30,
            window: CvWindow::Expanding,
            ..CvConfig::default()
        };
        let obs = history(240);
        let report = cross_validate(
            "ACAD",
            &obs,
            &ModelConfig::default(),
            &cv,
            &HolidayCalendar::default(),
            &RidgeSolver,
            &clock(),
        )
        .unwrap();

        // floor((240 - 120 - 30) / 60) + 1
        assert_eq!(report.planned_folds, 2);
        assert_eq!(report.successful_folds, 2);
        assert_eq!(report.points.len(), 60);
        for p in &report.points {
            assert!(p.date > p.cutoff);
            assert!(p.date <= p.cutoff + Duration::days(30));
            assert!(p.predicted >= 0.0);
        }
        let acc = report.accuracy.unwrap();
        assert!(acc.mape.unwrap() < 0.5);
    }

    #[test]
    fn all_folds_failing_leaves_metrics_unavailable() {
        // Constant visitors make every fold degenerate.
        let obs: Vec<Observation> = history(120)
            .into_iter()
            .map(|mut o| {
                o.visitors = 500;
                o
            })
            .collect();
        let report = cross_validate(
            "ACAD",
            &obs,
            &ModelConfig::default(),
            &CvConfig::default(),
            &HolidayCalendar::default(),
            &RidgeSolver,
            &clock(),
        )
        .unwrap();
        assert_eq!(report.planned_folds, 2);
        assert_eq!(report.successful_folds, 0);
        assert!(report.accuracy.is_none());
    }

    #[test]
    fn half_the_folds_failing_still_reports_metrics() {
        let obs = history(240);
        let failing = [90, 150, 210];
        let report = six_folds(&obs, &failing);

        assert_eq!(report.planned_folds, 6);
        assert_eq!(report.successful_folds, 3);
        assert_eq!(report.points.len(), 3 * 30);
        let failed_cutoffs: Vec<NaiveDate> = failing.iter().map(|&len| obs[len - 1].date).collect();
        assert!(report.points.iter().all(|p| !failed_cutoffs.contains(&p.cutoff)));
        assert!(report.points.windows(2).all(|w| w[0].cutoff <= w[1].cutoff));

        let metrics = report.metrics(240, clock().now());
        assert!(metrics.is_available());
        assert_eq!(metrics.folds, 3);
    }

    #[test]
    fn one_fold_short_of_the_fraction_is_unavailable() {
        let obs = history(240);
        let report = six_folds(&obs, &[60, 90, 150, 210]);

        assert_eq!(report.planned_folds, 6);
        assert_eq!(report.successful_folds, 2);
        assert_eq!(report.points.len(), 2 * 30);
        let kept: Vec<NaiveDate> = [120, 180].iter().map(|&len| obs[len - 1].date).collect();
        assert!(report.points.iter().all(|p| kept.contains(&p.cutoff)));
        assert!(report.accuracy.is_none());
        assert!(!report.metrics(240, clock().now()).is_available());
    }
}
