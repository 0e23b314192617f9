//! Historical data sources.
//!
//! The engine reads history through `HistorySource`, which returns one site's
//! observations in ascending date order. Two implementations ship here:
//!
//! - `MemoryHistory`: an in-memory table (tests, synthetic data)
//! - `CsvHistory`: a CSV export with one row per site and day
//!
//! CSV ingest goals:
//! - **Strict schema** for required columns (`site_id`, `date`, `visitor_count`)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior**: rows are sorted per site; for duplicate dates
//!   the first row wins and the rest are reported

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::{Covariates, Observation, SiteId};
use crate::error::{ForecastError, Result};

/// Supplies ordered, duplicate-free observations per site.
pub trait HistorySource: Send + Sync {
    fn sites(&self) -> Result<Vec<SiteId>>;

    /// Observations for `site_id` in ascending date order (empty if unknown).
    fn history(&self, site_id: &str) -> Result<Vec<Observation>>;
}

/// History held in memory, keyed by site.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    sites: BTreeMap<SiteId, Vec<Observation>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a site's history; rows are sorted by date.
    pub fn insert(&mut self, site_id: impl Into<SiteId>, mut observations: Vec<Observation>) {
        observations.sort_by_key(|o| o.date);
        self.sites.insert(site_id.into(), observations);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SiteId, &Vec<Observation>)> {
        self.sites.iter()
    }
}

impl FromIterator<(SiteId, Vec<Observation>)> for MemoryHistory {
    fn from_iter<I: IntoIterator<Item = (SiteId, Vec<Observation>)>>(iter: I) -> Self {
        let mut out = MemoryHistory::new();
        for (site, obs) in iter {
            out.insert(site, obs);
        }
        out
    }
}

impl HistorySource for MemoryHistory {
    fn sites(&self) -> Result<Vec<SiteId>> {
        Ok(self.sites.keys().cloned().collect())
    }

    fn history(&self, site_id: &str) -> Result<Vec<Observation>> {
        Ok(self.sites.get(site_id).cloned().unwrap_or_default())
    }
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub site_id: Option<SiteId>,
    pub message: String,
}

/// What happened while reading a CSV.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub rows_read: usize,
    pub rows_used: usize,
    pub row_errors: Vec<RowError>,
}

/// History loaded from a CSV file.
#[derive(Debug, Clone)]
pub struct CsvHistory {
    path: PathBuf,
    data: MemoryHistory,
    report: IngestReport,
}

impl CsvHistory {
    /// Read and validate the whole file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            ForecastError::InvalidRequest(format!("failed to open CSV '{}': {e}", path.display()))
        })?;
        let (data, report) = read_history(file)?;

        info!(
            path = %path.display(),
            sites = data.sites.len(),
            rows_used = report.rows_used,
            row_errors = report.row_errors.len(),
            "loaded history"
        );
        for err in report.row_errors.iter().take(10) {
            warn!(line = err.line, site = ?err.site_id, "{}", err.message);
        }

        Ok(Self {
            path: path.to_path_buf(),
            data,
            report,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn report(&self) -> &IngestReport {
        &self.report
    }
}

impl HistorySource for CsvHistory {
    fn sites(&self) -> Result<Vec<SiteId>> {
        self.data.sites()
    }

    fn history(&self, site_id: &str) -> Result<Vec<Observation>> {
        self.data.history(site_id)
    }
}

/// Parse history CSV from any reader.
pub fn read_history<R: std::io::Read>(reader: R) -> Result<(MemoryHistory, IngestReport)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| ForecastError::InvalidRequest(format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map)?;

    let mut by_site: BTreeMap<SiteId, BTreeMap<NaiveDate, Observation>> = BTreeMap::new();
    let mut report = IngestReport::default();

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header line, and lines are 1-based
        let line = idx + 2;
        report.rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                report.row_errors.push(RowError {
                    line,
                    site_id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map) {
            Ok((site, obs)) => {
                let rows = by_site.entry(site.clone()).or_default();
                if rows.contains_key(&obs.date) {
                    report.row_errors.push(RowError {
                        line,
                        site_id: Some(site),
                        message: format!("duplicate date {} (keeping the first row)", obs.date),
                    });
                } else {
                    rows.insert(obs.date, obs);
                    report.rows_used += 1;
                }
            }
            Err((site_id, message)) => report.row_errors.push(RowError { line, site_id, message }),
        }
    }

    let data = by_site
        .into_iter()
        .map(|(site, rows)| (site, rows.into_values().collect()))
        .collect();
    Ok((data, report))
}

const REQUIRED_COLUMNS: [&str; 3] = ["site_id", "date", "visitor_count"];

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    let name = name.to_ascii_lowercase();
    match name.as_str() {
        "park_id" | "site" => "site_id".to_string(),
        "visitors" | "y" => "visitor_count".to_string(),
        "temperature" => "temperature_high".to_string(),
        "precipitation_mm" => "precipitation".to_string(),
        "fuel_price" => "gas_price".to_string(),
        _ => name,
    }
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !header_map.contains_key(*c))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ForecastError::InvalidRequest(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )))
    }
}

fn parse_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> std::result::Result<(SiteId, Observation), (Option<SiteId>, String)> {
    let site = get_required(record, header_map, "site_id").map_err(|e| (None, e))?;
    let site = site.to_string();
    let with_site = |e: String| (Some(site.clone()), e);

    let date = parse_date(get_required(record, header_map, "date").map_err(with_site)?).map_err(with_site)?;
    let raw_count = get_required(record, header_map, "visitor_count").map_err(with_site)?;
    let visitors = parse_count(raw_count).map_err(with_site)?;

    let covariates = Covariates {
        temperature: parse_opt_f64(get_optional(record, header_map, "temperature_high")),
        precipitation: parse_opt_f64(get_optional(record, header_map, "precipitation")),
        is_weekend: parse_opt_bool(get_optional(record, header_map, "is_weekend")),
        is_holiday: parse_opt_bool(get_optional(record, header_map, "is_holiday")),
        school_in_session: parse_opt_bool(get_optional(record, header_map, "school_in_session")),
        seasonal_index: parse_opt_f64(get_optional(record, header_map, "seasonal_factor")),
        fuel_price: parse_opt_f64(get_optional(record, header_map, "gas_price")),
    };

    Ok((
        site,
        Observation {
            date,
            visitors,
            covariates,
        },
    ))
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> std::result::Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    const FMTS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, YYYY/MM/DD, MM/DD/YYYY."
    ))
}

fn parse_count(s: &str) -> std::result::Result<u32, String> {
    if let Ok(v) = s.parse::<u32>() {
        return Ok(v);
    }
    // tolerate "123.0" style exports
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) => Ok(v as u32),
        _ => Err(format!("Invalid visitor_count '{s}': expected a non-negative integer")),
    }
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

fn parse_opt_bool(s: Option<&str>) -> Option<bool> {
    match s?.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "false" | "f" | "no" | "n" => Some(false),
        other => other.parse::<f64>().ok().map(|v| v != 0.0),
    }
}
