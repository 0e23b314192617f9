//! Formatted terminal output.

use crate::cv::CvReport;
use crate::domain::{ForecastRow, ModelMetrics};
use crate::models::SiteModel;
use crate::report::summarize;
use crate::service::TrainOutcome;

/// Forecast table plus a short summary block.
pub fn format_forecast(site_id: &str, rows: &[ForecastRow], width: f64) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== sitecast - forecast for {site_id} ===\n"));
    out.push_str(&format!("Interval: {:.0}%\n\n", width * 100.0));

    out.push_str(&format!(
        "{:<12} {:<4} {:>10} {:>10} {:>10}\n",
        "date", "day", "visitors", "lower", "upper"
    ));
    out.push_str(&format!("{:-<12} {:-<4} {:-<10} {:-<10} {:-<10}\n", "", "", "", "", ""));
    for r in rows {
        out.push_str(&format!(
            "{:<12} {:<4} {:>10} {:>10} {:>10}\n",
            r.date.to_string(),
            r.date.format("%a").to_string(),
            r.point_estimate,
            r.lower_bound,
            r.upper_bound
        ));
    }

    let s = summarize(rows);
    out.push('\n');
    out.push_str(&format!("Total: {} over {} days (mean {:.1}/day)\n", s.total_visitors, s.days, s.mean_daily));
    if let Some((date, v)) = s.peak {
        out.push_str(&format!("Peak : {v} on {date}\n"));
    }
    if let Some(ratio) = s.weekend_ratio {
        out.push_str(&format!("Weekend/weekday: {ratio:.2}\n"));
    }
    out
}

pub fn format_metrics(site_id: &str, metrics: &ModelMetrics) -> String {
    let mut out = String::new();
    out.push_str(&format!("Model metrics for {site_id}:\n"));
    out.push_str(&format!("- fit timestamp  : {}\n", metrics.fit_timestamp.to_rfc3339()));
    out.push_str(&format!("- training points: {}\n", metrics.training_points));
    if metrics.is_available() {
        out.push_str(&format!("- cv folds       : {}\n", metrics.folds));
        out.push_str(&format!("- MAE            : {}\n", fmt_opt(metrics.mae, 1)));
        out.push_str(&format!("- RMSE           : {}\n", fmt_opt(metrics.rmse, 1)));
        out.push_str(&format!("- MAPE           : {}\n", fmt_pct(metrics.mape)));
    } else {
        out.push_str("- accuracy       : unavailable (history too short or too few CV folds)\n");
    }
    out
}

/// Model parameters worth eyeballing after a fit.
pub fn format_model_summary(site: &SiteModel) -> String {
    let m = &site.model;
    let mut out = String::new();
    out.push_str(&format!(
        "Window: {} .. {} ({} points), {} iterations\n",
        m.window.start, m.window.end, m.window.points, m.iterations
    ));
    out.push_str(&format!(
        "Trend: k={:.4} m={:.4} changepoints={} | sigma={:.4} | scale={:.0}\n",
        m.trend.k,
        m.trend.m,
        m.trend.changepoints.len(),
        m.sigma_obs,
        m.y_scale
    ));
    out
}

pub fn format_cv_report(site_id: &str, report: &CvReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Cross-validation for {site_id}: {}/{} folds succeeded, {} scored days\n",
        report.successful_folds,
        report.planned_folds,
        report.points.len()
    ));
    match &report.accuracy {
        Some(acc) => {
            out.push_str(&format!("- MAE : {:.1}\n", acc.mae));
            out.push_str(&format!("- RMSE: {:.1}\n", acc.rmse));
            out.push_str(&format!("- MAPE: {}\n", fmt_pct(acc.mape)));
        }
        None => out.push_str("- metrics unavailable\n"),
    }
    out
}

pub fn format_train_outcomes(outcomes: &[TrainOutcome]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<12} {:<8} {:>10} {:>10}\n", "site", "status", "MAE", "MAPE"));
    out.push_str(&format!("{:-<12} {:-<8} {:-<10} {:-<10}\n", "", "", "", ""));
    for o in outcomes {
        match &o.result {
            Ok(m) => out.push_str(&format!(
                "{:<12} {:<8} {:>10} {:>10}\n",
                truncate(&o.site_id, 12),
                "ok",
                fmt_opt(m.mae, 1),
                fmt_pct(m.mape)
            )),
            Err(e) => out.push_str(&format!("{:<12} {:<8} {e}\n", truncate(&o.site_id, 12), "failed")),
        }
    }
    out
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) => format!("{x:.decimals$}"),
        None => "n/a".to_string(),
    }
}

fn fmt_pct(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{:.2}%", x * 100.0),
        None => "n/a".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
