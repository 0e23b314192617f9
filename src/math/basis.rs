//! Basis functions for the decomposable model.
//!
//! - Fourier terms: `sin(2πnt/P)`, `cos(2πnt/P)` for `n = 1..=order`, with `t`
//!   measured in days since the Unix epoch so that phases are absolute (the same
//!   calendar day always lands on the same phase, whatever the training window).
//! - Trend hinges: `(t - s)+` for changepoint `s`, on the scaled time axis.

use std::f64::consts::PI;

use chrono::NaiveDate;

/// Days since 1970-01-01 as `f64`.
pub fn epoch_days(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
    (date - epoch).num_days() as f64
}

/// Write `[sin(2π·1·t/P), cos(2π·1·t/P), ..., sin(2π·K·t/P), cos(2π·K·t/P)]`
/// into `out` (length must be `2 * order`).
pub fn fill_fourier(t_days: f64, period: f64, order: usize, out: &mut [f64]) {
    debug_assert_eq!(out.len(), 2 * order);
    for n in 1..=order {
        let x = 2.0 * PI * n as f64 * t_days / period;
        out[2 * (n - 1)] = x.sin();
        out[2 * (n - 1) + 1] = x.cos();
    }
}

/// `max(t - s, 0)`.
#[inline]
pub fn hinge(t: f64, s: f64) -> f64 {
    (t - s).max(0.0)
}

/// Piecewise-linear trend `k·t + m + Σ δ_j·(t − s_j)+`.
///
/// Continuous at every changepoint: the offset adjusts implicitly through the
/// hinge form.
pub fn piecewise_linear(t: f64, k: f64, m: f64, deltas: &[f64], changepoints: &[f64]) -> f64 {
    let bend: f64 = deltas
        .iter()
        .zip(changepoints.iter())
        .map(|(&d, &s)| d * hinge(t, s))
        .sum();
    k * t + m + bend
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourier_is_periodic_in_whole_days() {
        let mut a = [0.0; 6];
        let mut b = [0.0; 6];
        fill_fourier(20_000.0, 7.0, 3, &mut a);
        fill_fourier(20_007.0, 7.0, 3, &mut b);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn epoch_days_counts_from_1970() {
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 11).unwrap()), 10.0);
    }

    #[test]
    fn piecewise_linear_is_continuous_at_changepoint() {
        let (k, m) = (1.0, 0.5);
        let deltas = [-2.0];
        let cps = [0.4];
        let left = piecewise_linear(0.4 - 1e-9, k, m, &deltas, &cps);
        let right = piecewise_linear(0.4 + 1e-9, k, m, &deltas, &cps);
        assert!((left - right).abs() < 1e-8);
        // slope after the changepoint is k + delta
        let slope = piecewise_linear(0.9, k, m, &deltas, &cps) - piecewise_linear(0.8, k, m, &deltas, &cps);
        assert!((slope / 0.1 - (-1.0)).abs() < 1e-9);
    }
}
