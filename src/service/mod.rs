//! Forecast service: the request-facing layer over the engine.
//!
//! A prediction request is validated first (horizon bounds, start date per the
//! injected clock). The site's model is then resolved from the cache, the
//! store, or trained on a miss. Training always runs CV for the metrics
//! surface, persists the bundle, and publishes it to the cache.

pub mod cache;

pub use cache::*;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{error, info};

use crate::clock::Clock;
use crate::cv::cross_validate;
use crate::domain::{CvConfig, ForecastRequest, ForecastRow, ModelConfig, ModelMetrics, SiteId};
use crate::error::{ForecastError, Result};
use crate::features::HolidayCalendar;
use crate::fit::{Optimizer, RidgeSolver, fit_model};
use crate::io::{HistorySource, ModelStore};
use crate::models::SiteModel;

/// Default cache time-to-live.
pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;

/// Per-site outcome of a batch training run.
#[derive(Debug)]
pub struct TrainOutcome {
    pub site_id: SiteId,
    pub result: Result<ModelMetrics>,
}

/// Acknowledgment of a background retrain.
///
/// The retrain runs on its own thread; callers poll `model_metrics` for a
/// newer fit timestamp, or `wait` for the outcome.
#[derive(Debug)]
pub struct RetrainAck {
    pub site_id: SiteId,
    pub requested_at: DateTime<Utc>,
    handle: JoinHandle<Result<ModelMetrics>>,
}

impl RetrainAck {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the retrain finishes. A panicked retrain thread is a
    /// `BackgroundTask` error carrying the panic message.
    pub fn wait(self) -> Result<ModelMetrics> {
        self.handle.join().unwrap_or_else(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ForecastError::BackgroundTask(format!(
                "retrain for site {} panicked: {reason}",
                self.site_id
            )))
        })
    }
}

pub struct ForecastService {
    history: Arc<dyn HistorySource>,
    store: Arc<dyn ModelStore>,
    cache: ModelCache,
    model_config: ModelConfig,
    cv_config: CvConfig,
    calendar: HolidayCalendar,
    optimizer: Arc<dyn Optimizer>,
    clock: Arc<dyn Clock>,
}

impl ForecastService {
    pub fn new(history: Arc<dyn HistorySource>, store: Arc<dyn ModelStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            history,
            store,
            cache: ModelCache::new(DEFAULT_CACHE_TTL_HOURS, Arc::clone(&clock)),
            model_config: ModelConfig::default(),
            cv_config: CvConfig::default(),
            calendar: HolidayCalendar::default(),
            optimizer: Arc::new(RidgeSolver),
            clock,
        }
    }

    pub fn with_model_config(mut self, config: ModelConfig) -> Self {
        self.model_config = config;
        self
    }

    pub fn with_cv_config(mut self, config: CvConfig) -> Self {
        self.cv_config = config;
        self
    }

    pub fn with_calendar(mut self, calendar: HolidayCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_optimizer(mut self, optimizer: Arc<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Replaces the cache (existing entries are dropped).
    pub fn with_cache_ttl_hours(mut self, hours: i64) -> Self {
        self.cache = ModelCache::new(hours, Arc::clone(&self.clock));
        self
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    /// Forecast rows for `[start_date, start_date + horizon_days)`.
    ///
    /// Invalid requests fail before any model is loaded or fit.
    pub fn predict(&self, request: &ForecastRequest) -> Result<Vec<ForecastRow>> {
        request.validate(self.clock.today())?;
        let site = self.resolve(&request.site_id)?;
        let model = &site.model;
        model.forecast(request.start_date, request.horizon_days, model.config.interval_width)
    }

    /// Like `predict`, with an explicit interval width.
    pub fn predict_with_width(&self, request: &ForecastRequest, width: f64) -> Result<Vec<ForecastRow>> {
        request.validate(self.clock.today())?;
        let site = self.resolve(&request.site_id)?;
        site.model.forecast(request.start_date, request.horizon_days, width)
    }

    /// Cached or stored model, training one on a miss.
    pub fn resolve(&self, site_id: &str) -> Result<Arc<SiteModel>> {
        if let Some(model) = self.cache.get(site_id) {
            return Ok(model);
        }
        if let Some(model) = self.store.load(site_id)? {
            return Ok(self.cache.insert(model));
        }
        info!(site = site_id, "no stored model; training");
        self.retrain(site_id)
    }

    /// Fit, cross-validate, persist and publish a fresh model.
    pub fn retrain(&self, site_id: &str) -> Result<Arc<SiteModel>> {
        let observations = self.history.history(site_id)?;
        let optimizer = self.optimizer.as_ref();
        let clock = self.clock.as_ref();

        let model = fit_model(site_id, &observations, &self.model_config, &self.calendar, optimizer, clock)?;
        let cv = cross_validate(
            site_id,
            &observations,
            &self.model_config,
            &self.cv_config,
            &self.calendar,
            optimizer,
            clock,
        )?;
        let metrics = cv.metrics(model.window.points, model.fit_timestamp);
        let bundle = SiteModel { model, metrics };

        self.store.save(&bundle)?;
        let published = self.cache.insert(bundle);
        info!(
            site = site_id,
            points = published.metrics.training_points,
            fit_timestamp = %published.metrics.fit_timestamp,
            metrics_available = published.metrics.is_available(),
            "model retrained"
        );
        Ok(published)
    }

    /// Start a retrain on a background thread and return immediately.
    pub fn retrain_in_background(self: &Arc<Self>, site_id: &str) -> RetrainAck {
        let service = Arc::clone(self);
        let site = site_id.to_string();
        let requested_at = self.clock.now();
        info!(site = site_id, "background retrain requested");

        let handle = thread::spawn(move || {
            let outcome = service.retrain(&site).map(|m| m.metrics.clone());
            match &outcome {
                Ok(_) => info!(site = %site, "background retrain finished"),
                Err(e) => error!(site = %site, error = %e, "background retrain failed"),
            }
            outcome
        });

        RetrainAck {
            site_id: site_id.to_string(),
            requested_at,
            handle,
        }
    }

    /// Retrain every site of the history source in parallel.
    pub fn train_all(&self) -> Result<Vec<TrainOutcome>> {
        let sites = self.history.sites()?;
        Ok(sites
            .par_iter()
            .map(|site| TrainOutcome {
                site_id: site.clone(),
                result: self.retrain(site).map(|m| m.metrics.clone()),
            })
            .collect())
    }

    /// Metrics of the current model; never trains.
    pub fn model_metrics(&self, site_id: &str) -> Result<ModelMetrics> {
        if let Some(model) = self.cache.get(site_id) {
            return Ok(model.metrics.clone());
        }
        match self.store.load(site_id)? {
            Some(model) => Ok(self.cache.insert(model).metrics.clone()),
            None => Err(ForecastError::ModelNotFit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::data::sample::generate_dataset;
    use crate::io::{MemoryHistory, MemoryModelStore};
    use chrono::{NaiveDate, TimeZone};
    use nalgebra::{DMatrix, DVector};

    struct PanickingSolver;

    impl Optimizer for PanickingSolver {
        fn solve(&self, _: &DMatrix<f64>, _: &DVector<f64>, _: &[f64]) -> Result<DVector<f64>> {
            panic!("solver blew up")
        }
    }

    fn service(clock: Arc<FixedClock>) -> ForecastService {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let history: MemoryHistory = generate_dataset(&["GRCA".to_string(), "ZION".to_string()], start, 200, 9)
            .into_iter()
            .collect();
        ForecastService::new(Arc::new(history), Arc::new(MemoryModelStore::new()), clock)
            .with_calendar(HolidayCalendar::default())
            .with_optimizer(Arc::new(RidgeSolver))
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2023, 7, 20, 12, 0, 0).unwrap()))
    }

    #[test]
    fn predict_trains_on_miss_then_serves_from_cache() {
        let clock = clock();
        let svc = service(clock.clone());
        let request = ForecastRequest {
            site_id: "GRCA".to_string(),
            start_date: NaiveDate::from_ymd_opt(2023, 7, 25).unwrap(),
            horizon_days: 14,
        };

        let rows = svc.predict(&request).unwrap();
        assert_eq!(rows.len(), 14);
        assert_eq!(rows[0].date, request.start_date);
        assert!(rows.iter().all(|r| r.lower_bound <= r.point_estimate && r.point_estimate <= r.upper_bound));

        let stamp = svc.model_metrics("GRCA").unwrap().fit_timestamp;
        clock.advance(chrono::Duration::hours(1));
        svc.predict(&request).unwrap();
        assert_eq!(svc.model_metrics("GRCA").unwrap().fit_timestamp, stamp);
    }

    #[test]
    fn metrics_without_model_is_not_fit() {
        let svc = service(clock());
        assert!(matches!(svc.model_metrics("GRCA"), Err(ForecastError::ModelNotFit)));
    }

    #[test]
    fn train_all_reports_each_site() {
        let svc = service(clock());
        let outcomes = svc.train_all().unwrap();
        let mut sites: Vec<&str> = outcomes.iter().map(|o| o.site_id.as_str()).collect();
        sites.sort();
        assert_eq!(sites, vec!["GRCA", "ZION"]);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
    }

    #[test]
    fn unknown_site_fails_with_empty_training_set() {
        let svc = service(clock());
        assert!(matches!(svc.retrain("NOPE"), Err(ForecastError::EmptyTrainingSet)));
    }

    #[test]
    fn panicked_background_retrain_is_a_background_task_error() {
        let svc = Arc::new(service(clock()).with_optimizer(Arc::new(PanickingSolver)));
        let ack = svc.retrain_in_background("GRCA");
        match ack.wait() {
            Err(ForecastError::BackgroundTask(msg)) => {
                assert!(msg.contains("GRCA"), "{msg}");
                assert!(msg.contains("solver blew up"), "{msg}");
            }
            other => panic!("expected a background task error, got {other:?}"),
        }
        assert!(matches!(svc.model_metrics("GRCA"), Err(ForecastError::ModelNotFit)));
    }
}
