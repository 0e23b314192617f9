//! Changepoint placement.
//!
//! Candidates sit at evenly spaced positions over the first
//! `changepoint_range` fraction of the history; the trailing part is left free
//! of changepoints so the end of the trend is not fit to the last few points.
//!
//! With `n` training rows the eligible prefix has `h = floor(n · range)` rows.
//! The count is capped at `h − 1`, positions are
//! `round(linspace(0, h − 1, count + 1))` with the leading 0 dropped.

/// Row indices of the changepoints for `n` rows.
pub fn changepoint_indices(n: usize, requested: usize, range: f64) -> Vec<usize> {
    let hist = ((n as f64) * range).floor() as usize;
    let count = requested.min(hist.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let last = (hist - 1) as f64;
    let mut out: Vec<usize> = (1..=count)
        .map(|i| (last * i as f64 / count as f64).round() as usize)
        .collect();
    out.dedup();
    out
}

/// Changepoint locations on the scaled time axis given the training `ts`.
pub fn changepoint_positions(ts: &[f64], requested: usize, range: f64) -> Vec<f64> {
    changepoint_indices(ts.len(), requested, range)
        .into_iter()
        .map(|i| ts[i])
        .collect()
}
