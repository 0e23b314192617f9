//! Accuracy metrics over scored fold points.

use serde::{Deserialize, Serialize};

use crate::domain::FoldPoint;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accuracy {
    pub mae: f64,
    /// Mean absolute percentage error, as a fraction. `None` when every actual
    /// is zero.
    pub mape: Option<f64>,
    pub rmse: f64,
    pub points: usize,
}

/// MAE, MAPE and RMSE over `points`; `None` if there are no points.
///
/// MAPE skips days with zero actual visitors.
pub fn accuracy(points: &[FoldPoint]) -> Option<Accuracy> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let mae = points.iter().map(|p| (p.actual - p.predicted).abs()).sum::<f64>() / n;
    let rmse = (points
        .iter()
        .map(|p| (p.actual - p.predicted).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let pct: Vec<f64> = points
        .iter()
        .filter(|p| p.actual != 0.0)
        .map(|p| ((p.actual - p.predicted) / p.actual).abs())
        .collect();
    let mape = if pct.is_empty() {
        None
    } else {
        Some(pct.iter().sum::<f64>() / pct.len() as f64)
    };

    Some(Accuracy {
        mae,
        mape,
        rmse,
        points: points.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(actual: f64, predicted: f64) -> FoldPoint {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        FoldPoint {
            cutoff: d,
            date: d,
            actual,
            predicted,
        }
    }

    #[test]
    fn metrics_basic() {
        let pts = [point(100.0, 110.0), point(200.0, 170.0), point(0.0, 5.0)];
        let acc = accuracy(&pts).unwrap();
        assert!((acc.mae - 15.0).abs() < 1e-12);
        assert!((acc.rmse - ((100.0 + 900.0 + 25.0) / 3.0_f64).sqrt()).abs() < 1e-12);
        // zero actual excluded: (0.10 + 0.15) / 2
        assert!((acc.mape.unwrap() - 0.125).abs() < 1e-12);
        assert_eq!(acc.points, 3);
    }

    #[test]
    fn empty_and_all_zero() {
        assert!(accuracy(&[]).is_none());
        assert_eq!(accuracy(&[point(0.0, 3.0)]).unwrap().mape, None);
    }
}
