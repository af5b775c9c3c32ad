//! # Refresh Coordinator
//!
//! Owns the prediction cache and keeps two cadences:
//!
//! - **Slow tick** (default every 10 minutes): ask the provider for a window
//!   wide enough for the chart and every prediction offset, then swap in the
//!   new cache and recompute the current state.
//! - **Fast tick** (default every minute): recompute the current state from
//!   whatever is cached. No I/O.
//!
//! The cache is an immutable [`PredictionCache`] behind an `Arc`. Readers clone
//! the `Arc` under a short read lock and compute without holding it; a refresh
//! replaces the whole `Arc` under a short write lock. No lock is held across an
//! `.await`, so a slow provider never blocks the fast tick or any reader.
//!
//! A failed refresh leaves the previous cache and state in place.

use crate::config::Config;
use crate::estimator::TideEstimator;
use crate::provider::{FetchError, FetchRequest, TideProvider};
use crate::{CurrentState, IntervalPrediction, Sample, TideData};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("tide data refresh failed: {0}")]
    FetchFailed(#[from] FetchError),
}

/// Snapshot of one successful fetch. Never modified after it is stored.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionCache {
    pub data: TideData,
    pub hours_before: i64,
    pub hours_after: i64,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorStatus {
    Uninitialized,
    Populated { fetched_at: DateTime<Utc> },
}

pub struct RefreshCoordinator {
    provider: Arc<dyn TideProvider>,
    config: Config,
    estimator: TideEstimator,
    cache: RwLock<Option<Arc<PredictionCache>>>,
    state: RwLock<Option<CurrentState>>,
}

impl RefreshCoordinator {
    pub fn new(provider: Arc<dyn TideProvider>, config: Config) -> Self {
        let estimator = TideEstimator::new(&config.model);
        Self {
            provider,
            config,
            estimator,
            cache: RwLock::new(None),
            state: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Hours to fetch before and after now.
    ///
    /// Covers the chart window and the furthest prediction offset on each
    /// side, plus the fetch buffer. Offsets count in whole hours (minutes
    /// divided by 60, rounded toward zero).
    pub fn fetch_window(&self) -> (i64, i64) {
        let offsets = &self.config.predictions.offsets_minutes;
        let furthest_back = offsets
            .iter()
            .filter(|&&m| m < 0)
            .map(|m| hours_from_minutes(m.unsigned_abs()))
            .max()
            .unwrap_or(0);
        let furthest_ahead = offsets
            .iter()
            .filter(|&&m| m > 0)
            .map(|m| hours_from_minutes(m.unsigned_abs()))
            .max()
            .unwrap_or(0);

        let buffer = self.config.refresh.fetch_buffer_hours;
        let chart = &self.config.chart;
        (
            buffer.saturating_add(i64::from(chart.history_hours).max(furthest_back)),
            buffer.saturating_add(i64::from(chart.future_hours).max(furthest_ahead)),
        )
    }

    pub fn fetch_request(&self) -> FetchRequest {
        let (hours_before, hours_after) = self.fetch_window();
        let station = &self.config.station;
        FetchRequest {
            station: station.id.clone(),
            hours_before,
            hours_after,
            want_dense: station.supports_dense,
            want_observations: station.supports_observations,
        }
    }

    /// Slow tick: fetch, store, recompute the current state.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        let request = self.fetch_request();
        debug!(
            "fetching station {} from -{}h to +{}h",
            request.station, request.hours_before, request.hours_after
        );

        // Only the provider call awaits; no lock is held here
        let mut data = self.provider.fetch(&request).await?;
        if data.sort_by_time() {
            debug!("provider returned out-of-order data, sorted");
        }

        let fetched_at = Utc::now();
        info!(
            "refreshed station {}: {} extrema, {} dense samples",
            request.station,
            data.events.len(),
            data.samples.len()
        );
        let cache = Arc::new(PredictionCache {
            data,
            hours_before: request.hours_before,
            hours_after: request.hours_after,
            fetched_at,
        });
        *self.cache.write() = Some(cache);

        self.local_update_at(fetched_at);
        Ok(())
    }

    /// Fast tick at the current time. See [`local_update_at`](Self::local_update_at).
    pub fn local_update(&self) -> bool {
        self.local_update_at(Utc::now())
    }

    /// Recompute and publish the current state from the cache.
    ///
    /// Returns `false` (and publishes nothing) before the first successful
    /// refresh.
    pub fn local_update_at(&self, now: DateTime<Utc>) -> bool {
        let Some(cache) = self.cache() else {
            debug!("no cached predictions yet, skipping local update");
            return false;
        };
        let state = self.estimator.current_state(cache.data.view(), now);
        debug!("current height {:?} trend {:?}", state.height, state.trend);
        *self.state.write() = Some(state);
        true
    }

    pub fn status(&self) -> CoordinatorStatus {
        match self.cache() {
            Some(cache) => CoordinatorStatus::Populated {
                fetched_at: cache.fetched_at,
            },
            None => CoordinatorStatus::Uninitialized,
        }
    }

    /// Shared handle to the cached predictions, if any.
    pub fn cache(&self) -> Option<Arc<PredictionCache>> {
        self.cache.read().clone()
    }

    /// Last state published by a tick.
    pub fn current_state(&self) -> Option<CurrentState> {
        self.state.read().clone()
    }

    /// State computed from the cache at `now`, without publishing it.
    pub fn current_state_at(&self, now: DateTime<Utc>) -> Option<CurrentState> {
        let cache = self.cache()?;
        Some(self.estimator.current_state(cache.data.view(), now))
    }

    /// Heights at the configured prediction offsets from now.
    pub fn interval_predictions(&self) -> BTreeMap<i64, IntervalPrediction> {
        self.interval_predictions_at(Utc::now())
    }

    pub fn interval_predictions_at(&self, now: DateTime<Utc>) -> BTreeMap<i64, IntervalPrediction> {
        self.interval_predictions_for_at(&self.config.predictions.offsets_minutes, now)
    }

    /// Heights at caller-chosen offsets (minutes) from now.
    pub fn interval_predictions_for(
        &self,
        offsets_minutes: &[i64],
    ) -> BTreeMap<i64, IntervalPrediction> {
        self.interval_predictions_for_at(offsets_minutes, Utc::now())
    }

    pub fn interval_predictions_for_at(
        &self,
        offsets_minutes: &[i64],
        now: DateTime<Utc>,
    ) -> BTreeMap<i64, IntervalPrediction> {
        match self.cache() {
            Some(cache) => {
                self.estimator
                    .interval_predictions(cache.data.view(), offsets_minutes, now)
            }
            None => BTreeMap::new(),
        }
    }

    pub fn chart_series(&self, past_hours: u32, future_hours: u32) -> Vec<Sample> {
        self.chart_series_at(past_hours, future_hours, Utc::now())
    }

    pub fn chart_series_at(
        &self,
        past_hours: u32,
        future_hours: u32,
        now: DateTime<Utc>,
    ) -> Vec<Sample> {
        match self.cache() {
            Some(cache) => {
                self.estimator
                    .chart_series(cache.data.view(), past_hours, future_hours, now)
            }
            None => Vec::new(),
        }
    }

    pub fn smooth_chart_series(
        &self,
        past_hours: u32,
        future_hours: u32,
        interval_minutes: i64,
    ) -> Vec<Sample> {
        self.smooth_chart_series_at(past_hours, future_hours, interval_minutes, Utc::now())
    }

    pub fn smooth_chart_series_at(
        &self,
        past_hours: u32,
        future_hours: u32,
        interval_minutes: i64,
        now: DateTime<Utc>,
    ) -> Vec<Sample> {
        match self.cache() {
            Some(cache) => self.estimator.smooth_chart_series(
                cache.data.view(),
                past_hours,
                future_hours,
                interval_minutes,
                now,
            ),
            None => Vec::new(),
        }
    }

    /// Spawn the slow and fast ticks on the current tokio runtime.
    ///
    /// The slow tick fires immediately, so the cache fills as soon as the
    /// provider answers.
    pub fn start(self: &Arc<Self>) -> CoordinatorHandle {
        let slow = {
            let coordinator = Arc::clone(self);
            let period = self.config.refresh.remote_interval();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    if let Err(e) = coordinator.refresh().await {
                        warn!("{e}; keeping previous predictions");
                    }
                }
            })
        };

        let fast = {
            let coordinator = Arc::clone(self);
            let period = self.config.refresh.local_interval();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    coordinator.local_update();
                }
            })
        };

        info!(
            "coordinator started: refresh every {:?}, update every {:?}",
            self.config.refresh.remote_interval(),
            self.config.refresh.local_interval()
        );
        CoordinatorHandle {
            tasks: vec![slow, fast],
        }
    }
}

/// Whole hours in `minutes`, rounded toward zero.
fn hours_from_minutes(minutes: u64) -> i64 {
    i64::try_from(minutes / 60).unwrap_or(i64::MAX)
}

/// Running ticks of a started coordinator. Dropping it aborts them.
pub struct CoordinatorHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl CoordinatorHandle {
    /// Abort both ticks and wait for them to finish.
    pub async fn stop(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!("coordinator tick panicked: {e}");
                }
            }
        }
        info!("coordinator stopped");
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TideEvent, TideKind, Trend};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockProvider {
        data: TideData,
        calls: AtomicUsize,
        fail: AtomicBool,
        last_request: parking_lot::Mutex<Option<FetchRequest>>,
    }

    impl MockProvider {
        fn new(data: TideData) -> Arc<Self> {
            Arc::new(Self {
                data,
                ..Default::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TideProvider for MockProvider {
        async fn fetch(&self, request: &FetchRequest) -> Result<TideData, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock() = Some(request.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::Unavailable("station offline".to_string()));
            }
            Ok(self.data.clone())
        }
    }

    /// Extrema around now plus hourly dense samples rising through now
    fn tide_data() -> TideData {
        let now = Utc::now();
        TideData {
            events: vec![
                TideEvent {
                    time: now - Duration::hours(3),
                    height: 0.2,
                    kind: TideKind::Low,
                },
                TideEvent {
                    time: now + Duration::hours(3),
                    height: 1.8,
                    kind: TideKind::High,
                },
                TideEvent {
                    time: now + Duration::hours(9),
                    height: 0.3,
                    kind: TideKind::Low,
                },
            ],
            samples: (-3..=3)
                .map(|h| Sample {
                    time: now + Duration::hours(h),
                    height: 1.0 + 0.25 * h as f64,
                })
                .collect(),
        }
    }

    fn coordinator(provider: Arc<MockProvider>, config: Config) -> RefreshCoordinator {
        RefreshCoordinator::new(provider, config)
    }

    #[test]
    fn fetch_window_covers_chart_and_offsets() {
        let mut config = Config::default();
        config.chart.history_hours = 6;
        config.chart.future_hours = 24;
        config.predictions.offsets_minutes = vec![-90, 600];
        let c = coordinator(MockProvider::new(TideData::default()), config.clone());
        assert_eq!(c.fetch_window(), (18, 36));

        // Offsets beyond the chart win; minutes round toward zero
        config.chart.history_hours = 2;
        config.predictions.offsets_minutes = vec![-659, 2000, 30];
        let c = coordinator(MockProvider::new(TideData::default()), config);
        assert_eq!(c.fetch_window(), (12 + 10, 12 + 33));
    }

    #[test]
    fn fetch_window_survives_extreme_offsets() {
        let mut config = Config::default();
        config.predictions.offsets_minutes = vec![i64::MIN, i64::MAX];
        let c = coordinator(MockProvider::new(TideData::default()), config);
        assert_eq!(
            c.fetch_window(),
            (
                12 + (i64::MIN.unsigned_abs() / 60) as i64,
                12 + i64::MAX / 60
            )
        );
    }

    #[test]
    fn request_reflects_station_capabilities() {
        let mut config = Config::default();
        config.station.supports_dense = false;
        config.station.supports_observations = true;
        let c = coordinator(MockProvider::new(TideData::default()), config);
        let request = c.fetch_request();
        assert_eq!(request.station, "8418150");
        assert!(!request.want_dense);
        assert!(request.want_observations);
    }

    #[test]
    fn nothing_before_first_refresh() {
        let c = coordinator(MockProvider::new(tide_data()), Config::default());
        assert_eq!(c.status(), CoordinatorStatus::Uninitialized);
        assert!(!c.local_update());
        assert!(c.current_state().is_none());
        assert!(c.interval_predictions().is_empty());
        assert!(c.chart_series(0, 24).is_empty());
    }

    #[tokio::test]
    async fn refresh_populates_cache_and_state() {
        let provider = MockProvider::new(tide_data());
        let c = coordinator(Arc::clone(&provider), Config::default());

        c.refresh().await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert!(matches!(c.status(), CoordinatorStatus::Populated { .. }));

        let state = c.current_state().unwrap();
        assert!(state.height.is_some());
        assert_eq!(state.trend, Some(Trend::Rising));
        assert_eq!(state.next_high.unwrap().height, 1.8);

        let cache = c.cache().unwrap();
        assert_eq!(cache.hours_before, 12);
        assert_eq!(cache.hours_after, 12 + 24);
        assert_eq!(
            provider.last_request.lock().as_ref().unwrap().hours_after,
            36
        );
    }

    #[tokio::test]
    async fn fast_tick_never_fetches() {
        let provider = MockProvider::new(tide_data());
        let c = coordinator(Arc::clone(&provider), Config::default());
        c.refresh().await.unwrap();

        for _ in 0..5 {
            assert!(c.local_update());
        }
        let _ = c.interval_predictions();
        let _ = c.chart_series(0, 24);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_cache() {
        let provider = MockProvider::new(tide_data());
        let c = coordinator(Arc::clone(&provider), Config::default());
        c.refresh().await.unwrap();
        let before = c.cache().unwrap();
        let state_before = c.current_state();

        provider.fail.store(true, Ordering::SeqCst);
        let err = c.refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::FetchFailed(FetchError::Unavailable(_))));

        assert_eq!(provider.calls(), 2);
        assert!(Arc::ptr_eq(&before, &c.cache().unwrap()));
        assert_eq!(c.current_state(), state_before);
        assert_eq!(
            c.status(),
            CoordinatorStatus::Populated {
                fetched_at: before.fetched_at
            }
        );
    }

    #[tokio::test]
    async fn stores_data_sorted() {
        let mut data = tide_data();
        data.events.reverse();
        data.samples.reverse();
        let c = coordinator(MockProvider::new(data), Config::default());
        c.refresh().await.unwrap();

        let cache = c.cache().unwrap();
        assert!(cache.data.events.windows(2).all(|w| w[0].time <= w[1].time));
        assert!(cache.data.samples.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[tokio::test]
    async fn reads_are_repeatable_for_fixed_now() {
        let c = coordinator(MockProvider::new(tide_data()), Config::default());
        c.refresh().await.unwrap();
        let now = Utc::now();

        assert_eq!(c.chart_series_at(2, 24, now), c.chart_series_at(2, 24, now));
        assert_eq!(c.interval_predictions_at(now), c.interval_predictions_at(now));
        assert_eq!(c.current_state_at(now), c.current_state_at(now));
        assert_eq!(
            c.interval_predictions_at(now).keys().copied().collect::<Vec<_>>(),
            vec![-60, 60, 180, 360]
        );
    }

    #[tokio::test]
    async fn caller_offsets_override_configured_ones() {
        let c = coordinator(MockProvider::new(tide_data()), Config::default());
        let now = Utc::now();
        assert!(c.interval_predictions_for_at(&[30], now).is_empty());

        c.refresh().await.unwrap();
        let predictions = c.interval_predictions_for_at(&[-120, 30, 200_000_000_000], now);
        assert_eq!(predictions.keys().copied().collect::<Vec<_>>(), vec![-120, 30]);
        assert_eq!(predictions[&30].time, now + Duration::minutes(30));
        assert_eq!(c.interval_predictions_for(&[90]).len(), 1);
    }

    /// Answers the first fetch at once and holds every later one until the
    /// gate opens.
    struct GatedProvider {
        data: TideData,
        calls: AtomicUsize,
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl TideProvider for GatedProvider {
        async fn fetch(&self, _request: &FetchRequest) -> Result<TideData, FetchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                self.gate.notified().await;
            }
            Ok(self.data.clone())
        }
    }

    #[tokio::test]
    async fn fast_tick_does_not_wait_on_pending_fetch() {
        let provider = Arc::new(GatedProvider {
            data: tide_data(),
            calls: AtomicUsize::new(0),
            gate: tokio::sync::Notify::new(),
        });
        let c = Arc::new(RefreshCoordinator::new(
            Arc::clone(&provider) as Arc<dyn TideProvider>,
            Config::default(),
        ));
        c.refresh().await.unwrap();
        let old = c.cache().unwrap();

        let pending = tokio::spawn({
            let c = Arc::clone(&c);
            async move { c.refresh().await }
        });
        while provider.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        // Slow tick is parked inside the provider; the fast tick still runs
        let later = Utc::now() + Duration::minutes(5);
        assert!(c.local_update_at(later));
        assert!(Arc::ptr_eq(&old, &c.cache().unwrap()));
        let state = c.current_state().unwrap();
        assert_eq!(state.time, later);
        assert_eq!(Some(state), c.current_state_at(later));
        assert!(!pending.is_finished());

        provider.gate.notify_one();
        pending.await.unwrap().unwrap();
        assert!(!Arc::ptr_eq(&old, &c.cache().unwrap()));
    }

    struct PanickingProvider;

    #[async_trait]
    impl TideProvider for PanickingProvider {
        async fn fetch(&self, _request: &FetchRequest) -> Result<TideData, FetchError> {
            panic!("provider blew up");
        }
    }

    #[tokio::test]
    async fn stop_survives_a_panicked_tick() {
        let c = Arc::new(RefreshCoordinator::new(
            Arc::new(PanickingProvider),
            Config::default(),
        ));
        let handle = c.start();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.stop().await;
        assert_eq!(c.status(), CoordinatorStatus::Uninitialized);
    }

    #[tokio::test]
    async fn extrema_only_station_charts_synthetic_series() {
        let mut data = tide_data();
        data.samples.clear();
        let c = coordinator(MockProvider::new(data), Config::default());
        c.refresh().await.unwrap();

        let now = Utc::now();
        let series = c.chart_series_at(0, 24, now);
        assert_eq!(series.len(), 25);
        assert_eq!(series[0].time, now);
        assert!(c.current_state_at(now).unwrap().trend.is_none());
    }

    #[tokio::test]
    async fn started_coordinator_refreshes_until_stopped() {
        let provider = MockProvider::new(tide_data());
        let c = Arc::new(coordinator(Arc::clone(&provider), Config::default()));

        let handle = c.start();
        for _ in 0..100 {
            if c.current_state().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        handle.stop().await;

        assert!(matches!(c.status(), CoordinatorStatus::Populated { .. }));
        let calls = provider.calls();
        assert!(calls >= 1);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(provider.calls(), calls);
    }
}
