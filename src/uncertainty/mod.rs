//! Prediction intervals from simulated trend continuations.
//!
//! For each of `N` trajectories:
//!
//! - draw the number of future changepoints from a Poisson with the
//!   historical rate (changepoints per unit of scaled history) times the
//!   scaled horizon, and place them uniformly after the training end
//! - give each a slope change resampled (with replacement) from the fitted
//!   historical deltas
//! - evaluate `trend × level × weekly` with both factors held at their
//!   fitted values, plus Gaussian observation noise with the residual scale
//!
//! Bounds are empirical quantiles `(1 − w)/2` and `(1 + w)/2` of the draws. The
//! sample is kept, so asking for several widths reuses one simulation and wider
//! widths can never produce narrower bounds.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use tracing::debug;

use crate::domain::{FeatureRow, ForecastRow};
use crate::math::{hinge, quantile_sorted, sort_f64};
use crate::models::FittedModel;

/// Simulated outcomes for a set of dates (visitor units, unclipped).
#[derive(Debug, Clone)]
pub struct TrajectorySample {
    dates: Vec<NaiveDate>,
    point: Vec<f64>,
    /// Sorted draws per date.
    draws: Vec<Vec<f64>>,
}

impl TrajectorySample {
    /// Run the simulation for `rows` with a fixed seed.
    pub fn simulate(model: &FittedModel, rows: &[FeatureRow], samples: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let ts: Vec<f64> = rows.iter().map(|r| model.time.t(r.date)).collect();
        let base: Vec<f64> = ts.iter().map(|&t| model.trend.at(t)).collect();
        let factor: Vec<f64> = rows
            .iter()
            .map(|r| model.components.multiplier(r).factor())
            .collect();
        let point: Vec<f64> = base
            .iter()
            .zip(factor.iter())
            .map(|(g, f)| model.y_scale * g * f)
            .collect();

        // history occupies [0, 1] on the scaled axis
        let t_end = 1.0;
        let t_max = ts.iter().copied().fold(t_end, f64::max);
        let historical = &model.trend.deltas;
        let expected_changes = historical.len() as f64 * (t_max - t_end);
        let poisson = if historical.is_empty() {
            None
        } else {
            Poisson::new(expected_changes).ok()
        };
        let noise = Normal::new(0.0, model.sigma_obs).ok();

        debug!(
            site = %model.site_id,
            dates = rows.len(),
            samples,
            expected_changes,
            "simulating trend trajectories"
        );

        let mut draws: Vec<Vec<f64>> = vec![Vec::with_capacity(samples); rows.len()];
        let mut extra: Vec<(f64, f64)> = Vec::new();
        for _ in 0..samples {
            extra.clear();
            if let Some(dist) = &poisson {
                let n_changes = dist.sample(&mut rng) as usize;
                for _ in 0..n_changes {
                    let s = rng.gen_range(t_end..=t_max);
                    let delta = historical[rng.gen_range(0..historical.len())];
                    extra.push((s, delta));
                }
            }

            for (i, &t) in ts.iter().enumerate() {
                let bend: f64 = extra.iter().map(|&(s, d)| d * hinge(t, s)).sum();
                let eps = noise.as_ref().map_or(0.0, |n| n.sample(&mut rng));
                draws[i].push(model.y_scale * ((base[i] + bend) * factor[i] + eps));
            }
        }
        for d in &mut draws {
            sort_f64(d);
        }

        Self {
            dates: rows.iter().map(|r| r.date).collect(),
            point,
            draws,
        }
    }

    /// Raw `(lower, upper)` quantile pair per date for interval width `width`.
    pub fn bands(&self, width: f64) -> Vec<(f64, f64)> {
        let lo_q = (1.0 - width) / 2.0;
        let hi_q = (1.0 + width) / 2.0;
        self.draws
            .iter()
            .zip(self.point.iter())
            .map(|(d, &p)| {
                (
                    quantile_sorted(d, lo_q).unwrap_or(p),
                    quantile_sorted(d, hi_q).unwrap_or(p),
                )
            })
            .collect()
    }

    /// Final forecast rows: bounds bracket the point, all clipped at zero and
    /// rounded to whole visitors.
    pub fn forecast_rows(&self, width: f64) -> Vec<ForecastRow> {
        self.bands(width)
            .into_iter()
            .zip(self.point.iter().zip(self.dates.iter()))
            .map(|((lo, hi), (&p, &date))| ForecastRow {
                date,
                point_estimate: to_count(p),
                lower_bound: to_count(lo.min(p)),
                upper_bound: to_count(hi.max(p)),
            })
            .collect()
    }
}

/// Clip at zero and round to the nearest whole visitor.
pub fn to_count(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 {
        v.round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_clipped_and_rounded() {
        assert_eq!(to_count(-12.3), 0);
        assert_eq!(to_count(f64::NAN), 0);
        assert_eq!(to_count(10.5), 11);
        assert_eq!(to_count(10.49), 10);
    }
}
