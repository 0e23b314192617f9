//! In-memory model cache with a time-to-live.
//!
//! Entries are `(site_id → model, last_loaded_at)`. An entry is fresh while
//! `now − last_loaded_at < ttl`; stale entries are dropped on lookup so the
//! caller falls through to the store. Publishing a model swaps the `Arc`
//! under the write lock, so readers holding the previous model keep a
//! complete copy.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::domain::SiteId;
use crate::models::SiteModel;

struct CacheEntry {
    model: Arc<SiteModel>,
    loaded_at: DateTime<Utc>,
}

pub struct ModelCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<SiteId, CacheEntry>>,
}

impl ModelCache {
    pub fn new(ttl_hours: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: Duration::hours(ttl_hours),
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached model if present and fresh.
    pub fn get(&self, site_id: &str) -> Option<Arc<SiteModel>> {
        let now = self.clock.now();
        {
            let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match guard.get(site_id) {
                None => {
                    debug!(site = site_id, "cache miss");
                    return None;
                }
                Some(entry) if now - entry.loaded_at < self.ttl => {
                    debug!(site = site_id, "cache hit");
                    return Some(Arc::clone(&entry.model));
                }
                Some(_) => {}
            }
        }

        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        // Another thread may have refreshed the entry in between.
        if guard
            .get(site_id)
            .is_some_and(|entry| now - entry.loaded_at >= self.ttl)
        {
            guard.remove(site_id);
            debug!(site = site_id, "cache entry expired");
            return None;
        }
        guard.get(site_id).map(|entry| Arc::clone(&entry.model))
    }

    /// Publish `model`, replacing any previous entry for its site.
    pub fn insert(&self, model: SiteModel) -> Arc<SiteModel> {
        let model = Arc::new(model);
        let entry = CacheEntry {
            model: Arc::clone(&model),
            loaded_at: self.clock.now(),
        };
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(model.site_id().to_string(), entry);
        model
    }

    pub fn loaded_at(&self, site_id: &str) -> Option<DateTime<Utc>> {
        let guard = self.entries.read().unwrap_or_else(|e| e.into_inner());
        guard.get(site_id).map(|entry| entry.loaded_at)
    }

    pub fn invalidate(&self, site_id: &str) {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(site_id);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::data::sample::{SampleProfile, generate_site_history};
    use crate::domain::{ModelConfig, ModelMetrics};
    use crate::features::HolidayCalendar;
    use crate::fit::{RidgeSolver, fit_model};
    use chrono::{NaiveDate, TimeZone};

    fn site_model(clock: &FixedClock) -> SiteModel {
        let history = generate_site_history(
            "YOSE",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            90,
            &SampleProfile::default(),
            2,
        );
        let model = fit_model(
            "YOSE",
            &history,
            &ModelConfig::default(),
            &HolidayCalendar::default(),
            &RidgeSolver,
            clock,
        )
        .unwrap();
        let metrics = ModelMetrics::unavailable(model.window.points, model.fit_timestamp);
        SiteModel { model, metrics }
    }

    #[test]
    fn entries_expire_after_ttl() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));
        let cache = ModelCache::new(24, clock.clone());
        cache.insert(site_model(&clock));

        clock.advance(Duration::hours(23));
        assert!(cache.get("YOSE").is_some());

        clock.advance(Duration::hours(1));
        assert!(cache.get("YOSE").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_replaces_and_restamps() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));
        let cache = ModelCache::new(24, clock.clone());
        let first = cache.insert(site_model(&clock));

        clock.advance(Duration::hours(20));
        let mut newer = site_model(&clock);
        newer.metrics.training_points = 7;
        cache.insert(newer);

        // The old handle stays intact.
        assert_ne!(first.metrics.training_points, 7);
        assert_eq!(cache.get("YOSE").unwrap().metrics.training_points, 7);
        assert_eq!(cache.loaded_at("YOSE"), Some(clock.now()));

        clock.advance(Duration::hours(10));
        assert!(cache.get("YOSE").is_some());

        cache.invalidate("YOSE");
        assert!(cache.get("YOSE").is_none());
    }
}
