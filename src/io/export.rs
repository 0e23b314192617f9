//! CSV exports.
//!
//! Files are meant to be easy to consume in spreadsheets or downstream
//! scripts. The history export uses the same columns `io::ingest` reads, so a
//! generated sample can be fed straight back into training.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{ForecastRow, Observation};
use crate::error::{ForecastError, Result};
use crate::models::ComponentBreakdown;

/// Write forecast rows for one site.
pub fn write_forecast_csv(path: &Path, site_id: &str, rows: &[ForecastRow]) -> Result<()> {
    let mut out = create(path)?;
    writeln!(out, "site_id,date,point_estimate,lower_bound,upper_bound").map_err(write_err)?;
    for r in rows {
        writeln!(
            out,
            "{},{},{},{},{}",
            site_id, r.date, r.point_estimate, r.lower_bound, r.upper_bound
        )
        .map_err(write_err)?;
    }
    out.flush().map_err(write_err)
}

/// Write per-date component contributions.
pub fn write_breakdown_csv(path: &Path, site_id: &str, rows: &[ComponentBreakdown]) -> Result<()> {
    let mut out = create(path)?;
    writeln!(out, "site_id,date,trend,seasonal,holidays,regressors,yhat").map_err(write_err)?;
    for r in rows {
        writeln!(
            out,
            "{},{},{:.4},{:.4},{:.4},{:.4},{:.4}",
            site_id, r.date, r.trend, r.seasonal, r.holidays, r.regressors, r.yhat
        )
        .map_err(write_err)?;
    }
    out.flush().map_err(write_err)
}

/// Write site histories in the ingest schema.
pub fn write_history_csv<'a>(
    path: &Path,
    sites: impl IntoIterator<Item = (&'a str, &'a [Observation])>,
) -> Result<()> {
    let mut out = create(path)?;
    writeln!(
        out,
        "site_id,date,visitor_count,temperature_high,precipitation,is_weekend,is_holiday,school_in_session,seasonal_factor,gas_price"
    )
    .map_err(write_err)?;

    for (site_id, observations) in sites {
        for o in observations {
            let c = &o.covariates;
            writeln!(
                out,
                "{},{},{},{},{},{},{},{},{},{}",
                site_id,
                o.date,
                o.visitors,
                opt_f64(c.temperature),
                opt_f64(c.precipitation),
                opt_bool(c.is_weekend),
                opt_bool(c.is_holiday),
                opt_bool(c.school_in_session),
                opt_f64(c.seasonal_index),
                opt_f64(c.fuel_price),
            )
            .map_err(write_err)?;
        }
    }
    out.flush().map_err(write_err)
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| {
        ForecastError::Store(format!("failed to create CSV '{}': {e}", path.display()))
    })?;
    Ok(BufWriter::new(file))
}

fn write_err(e: std::io::Error) -> ForecastError {
    ForecastError::Store(format!("failed to write CSV: {e}"))
}

fn opt_f64(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn opt_bool(v: Option<bool>) -> &'static str {
    match v {
        Some(true) => "1",
        Some(false) => "0",
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{SampleProfile, generate_site_history};
    use crate::io::{HistorySource, read_history};
    use chrono::NaiveDate;

    #[test]
    fn history_export_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let history = generate_site_history("OLYM", start, 20, &SampleProfile::default(), 1);

        write_history_csv(&path, [("OLYM", history.as_slice())]).unwrap();
        let (data, report) = read_history(File::open(&path).unwrap()).unwrap();
        assert!(report.row_errors.is_empty());
        assert_eq!(data.history("OLYM").unwrap(), history);
    }

    #[test]
    fn forecast_export_has_one_line_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.csv");
        let date = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let rows = vec![
            ForecastRow {
                date,
                point_estimate: 10,
                lower_bound: 8,
                upper_bound: 13,
            };
            3
        ];
        write_forecast_csv(&path, "OLYM", &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert_eq!(text.lines().nth(1), Some("OLYM,2025-05-01,10,8,13"));
    }
}
