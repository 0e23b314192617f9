//! Shared wiring between the CLI handlers and the service layer.
//!
//! Building the service from `ServiceConfig` (history CSV, JSON model store,
//! model configuration) lives here so the handlers in `app` only deal with
//! presentation.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::clock::Clock;
use crate::cv::{CvReport, cross_validate};
use crate::data::generate_dataset;
use crate::domain::{CvConfig, ForecastRequest, ForecastRow, ModelMetrics, ServiceConfig, SiteId};
use crate::error::{ForecastError, Result};
use crate::features::HolidayCalendar;
use crate::fit::RidgeSolver;
use crate::io::{CsvHistory, HistorySource, JsonModelStore, ModelStore, write_history_csv};
use crate::models::{ComponentBreakdown, SiteModel};
use crate::service::ForecastService;

/// Everything a `forecast` run produced.
#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub model: Arc<SiteModel>,
    pub width: f64,
    pub rows: Vec<ForecastRow>,
    pub breakdown: Vec<ComponentBreakdown>,
}

pub fn load_history(config: &ServiceConfig) -> Result<CsvHistory> {
    let path = config.data_path.as_deref().ok_or_else(|| {
        ForecastError::InvalidRequest(
            "no history CSV configured; set SITE_FORECAST_DATA or pass --data".to_string(),
        )
    })?;
    CsvHistory::load(path)
}

/// Service over the configured CSV history and JSON model store.
pub fn build_service(config: &ServiceConfig, clock: Arc<dyn Clock>) -> Result<ForecastService> {
    let history = load_history(config)?;
    let model_config = config.load_model_config()?;
    model_config.validate()?;
    let store = JsonModelStore::new(&config.model_dir, config.model_file_prefix.clone());

    Ok(ForecastService::new(Arc::new(history), Arc::new(store), clock)
        .with_model_config(model_config)
        .with_cache_ttl_hours(config.cache_ttl_hours))
}

/// Forecast `horizon_days` from `start` plus the matching component breakdown.
pub fn run_forecast(
    service: &ForecastService,
    site_id: &str,
    start: NaiveDate,
    horizon_days: u32,
    width: Option<f64>,
) -> Result<ForecastRun> {
    let request = ForecastRequest {
        site_id: site_id.to_string(),
        start_date: start,
        horizon_days,
    };
    let width = width.unwrap_or(service.model_config().interval_width);
    let rows = service.predict_with_width(&request, width)?;

    // Resolved by the prediction above; a cache hit here.
    let model = service.resolve(site_id)?;
    let future = model.model.future_rows(start, horizon_days)?;
    let breakdown = model.model.breakdown(&future);

    Ok(ForecastRun {
        model,
        width,
        rows,
        breakdown,
    })
}

/// Metrics of the persisted model; needs no history.
pub fn stored_metrics(config: &ServiceConfig, site_id: &str) -> Result<ModelMetrics> {
    let store = JsonModelStore::new(&config.model_dir, config.model_file_prefix.clone());
    store
        .load(site_id)?
        .map(|model| model.metrics)
        .ok_or(ForecastError::ModelNotFit)
}

/// CV on the configured history, without touching the store.
pub fn run_cv(config: &ServiceConfig, site_id: &str, cv_config: &CvConfig, clock: &dyn Clock) -> Result<CvReport> {
    let history = load_history(config)?;
    let observations = history.history(site_id)?;
    if observations.is_empty() {
        return Err(ForecastError::InvalidRequest(format!("no history for site '{site_id}'")));
    }
    let model_config = config.load_model_config()?;
    cross_validate(
        site_id,
        &observations,
        &model_config,
        cv_config,
        &HolidayCalendar::default(),
        &RidgeSolver,
        clock,
    )
}

/// Write a synthetic multi-site history CSV; returns the row count.
pub fn write_sample(path: &Path, sites: &[SiteId], start: NaiveDate, days: usize, seed: u64) -> Result<usize> {
    let dataset = generate_dataset(sites, start, days, seed);
    write_history_csv(path, dataset.iter().map(|(site, obs)| (site.as_str(), obs.as_slice())))?;
    Ok(dataset.iter().map(|(_, obs)| obs.len()).sum())
}
