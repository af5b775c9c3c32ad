//! # Tide Estimator
//!
//! Everything a consumer asks of the cached data, as pure functions of a
//! [`TideView`] and an instant:
//!
//! - tiered height (dense series first, then extrema)
//! - the [`CurrentState`] snapshot published by the refresh coordinator
//! - heights at configured offsets from now
//! - the series to chart, real when possible and synthetic otherwise
//!
//! Nothing here performs I/O or keeps state between calls, so the same view
//! and instant always give the same answer.

use crate::config::ModelConfig;
use crate::extrema::ExtremaInterpolator;
use crate::interpolate::Interpolator;
use crate::rate::RateEstimator;
use crate::strategy::{Estimate, StrategyChain};
use crate::synthetic::{densify, SyntheticSeriesGenerator};
use crate::trend::TrendClassifier;
use crate::{CurrentState, IntervalPrediction, Sample, TideEvent, TideKind, TideView};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Padding around the chart window when filtering a real dense series
pub const CHART_BUFFER_MINUTES: i64 = 30;

pub struct TideEstimator {
    heights: StrategyChain,
    rate: RateEstimator,
    trend: TrendClassifier,
    synthetic: SyntheticSeriesGenerator,
    chart_buffer: Duration,
}

impl Default for TideEstimator {
    fn default() -> Self {
        Self::new(&ModelConfig::default())
    }
}

impl TideEstimator {
    pub fn new(model: &ModelConfig) -> Self {
        let extrema = ExtremaInterpolator::new(model.semi_period());
        Self {
            heights: StrategyChain::new()
                .with(Interpolator::new())
                .with(extrema),
            rate: RateEstimator::new(model.derivative_delta_seconds, extrema),
            trend: TrendClassifier::new(model.steady_threshold),
            synthetic: SyntheticSeriesGenerator::new(extrema),
            chart_buffer: Duration::minutes(model.chart_buffer_minutes),
        }
    }

    /// Height at `target`, from the first tier that can answer.
    pub fn height_at(&self, view: TideView<'_>, target: DateTime<Utc>) -> Option<Estimate> {
        self.heights.estimate(view, target)
    }

    /// Height, rate, trend and upcoming extrema at `now`.
    ///
    /// Trend is only taken from the dense series; extrema alone never produce
    /// one.
    pub fn current_state(&self, view: TideView<'_>, now: DateTime<Utc>) -> CurrentState {
        let (next_high, next_low) = next_extrema(view.events, now);
        CurrentState {
            height: self.height_at(view, now).map(|e| e.height),
            time: now,
            rate: self.rate.rate_at(view, now),
            trend: self.trend.classify(view.samples, now),
            next_high,
            next_low,
        }
    }

    /// Height at each offset (in minutes) from `now`.
    ///
    /// Offsets no tier can answer, or too large to land on a representable
    /// instant, are left out of the map.
    pub fn interval_predictions(
        &self,
        view: TideView<'_>,
        offsets_minutes: &[i64],
        now: DateTime<Utc>,
    ) -> BTreeMap<i64, IntervalPrediction> {
        offsets_minutes
            .iter()
            .filter_map(|&offset| {
                let Some(time) =
                    Duration::try_minutes(offset).and_then(|delta| now.checked_add_signed(delta))
                else {
                    debug!("prediction offset {offset} min is out of range, skipped");
                    return None;
                };
                self.height_at(view, time).map(|estimate| {
                    (
                        offset,
                        IntervalPrediction {
                            offset_minutes: offset,
                            time,
                            height: estimate.height,
                        },
                    )
                })
            })
            .collect()
    }

    /// Series to chart from `now - past_hours` to `now + future_hours`.
    ///
    /// Real dense samples inside the window (padded by the chart buffer) when
    /// there are any, otherwise the hourly synthetic series from extrema.
    /// Empty when neither is available.
    pub fn chart_series(
        &self,
        view: TideView<'_>,
        past_hours: u32,
        future_hours: u32,
        now: DateTime<Utc>,
    ) -> Vec<Sample> {
        let start = now - Duration::hours(i64::from(past_hours)) - self.chart_buffer;
        let end = now + Duration::hours(i64::from(future_hours)) + self.chart_buffer;

        let real: Vec<Sample> = view
            .samples
            .iter()
            .filter(|s| start <= s.time && s.time <= end)
            .copied()
            .collect();
        if !real.is_empty() {
            return real;
        }

        self.synthetic
            .generate(view.events, past_hours, future_hours, now)
            .unwrap_or_default()
    }

    /// [`chart_series`](Self::chart_series) resampled every `interval_minutes`
    /// through the cubic spline.
    pub fn smooth_chart_series(
        &self,
        view: TideView<'_>,
        past_hours: u32,
        future_hours: u32,
        interval_minutes: i64,
        now: DateTime<Utc>,
    ) -> Vec<Sample> {
        densify(
            &self.chart_series(view, past_hours, future_hours, now),
            interval_minutes,
        )
    }
}

/// First high and first low strictly after `now`.
pub fn next_extrema(
    events: &[TideEvent],
    now: DateTime<Utc>,
) -> (Option<TideEvent>, Option<TideEvent>) {
    let upcoming = events.iter().filter(|e| e.time > now);
    let mut next_high = None;
    let mut next_low = None;
    for event in upcoming {
        match event.kind {
            TideKind::High if next_high.is_none() => next_high = Some(*event),
            TideKind::Low if next_low.is_none() => next_low = Some(*event),
            _ => {}
        }
        if next_high.is_some() && next_low.is_some() {
            break;
        }
    }
    (next_high, next_low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Trend;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 24, 12, 0, 0).unwrap()
    }

    fn events() -> Vec<TideEvent> {
        vec![
            TideEvent {
                time: now() - Duration::hours(3),
                height: 0.2,
                kind: TideKind::Low,
            },
            TideEvent {
                time: now() + Duration::hours(3),
                height: 1.8,
                kind: TideKind::High,
            },
            TideEvent {
                time: now() + Duration::hours(9),
                height: 0.4,
                kind: TideKind::Low,
            },
        ]
    }

    /// Hourly rising samples from now − 2 h to now + 2 h
    fn rising_samples() -> Vec<Sample> {
        (-2..=2)
            .map(|h| Sample {
                time: now() + Duration::hours(h),
                height: 1.0 + 0.3 * h as f64,
            })
            .collect()
    }

    #[test]
    fn dense_tier_wins_over_extrema() {
        let estimator = TideEstimator::default();
        let events = events();
        let samples = rising_samples();
        let view = TideView {
            events: &events,
            samples: &samples,
        };
        let estimate = estimator.height_at(view, now()).unwrap();
        assert_eq!(estimate.strategy, "samples");
        assert_abs_diff_eq!(estimate.height, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn extrema_tier_when_no_samples() {
        let estimator = TideEstimator::default();
        let events = events();
        let estimate = estimator
            .height_at(TideView::from_events(&events), now())
            .unwrap();
        assert_eq!(estimate.strategy, "extrema");
        assert_abs_diff_eq!(estimate.height, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn nothing_to_go_on() {
        let estimator = TideEstimator::default();
        let state = estimator.current_state(TideView::default(), now());
        assert_eq!(state.height, None);
        assert_eq!(state.rate, None);
        assert_eq!(state.trend, None);
        assert_eq!(state.time, now());
    }

    #[test]
    fn extrema_only_state_has_no_trend() {
        let estimator = TideEstimator::default();
        let events = events();
        let state = estimator.current_state(TideView::from_events(&events), now());
        assert!(state.height.is_some());
        assert!(state.rate.unwrap() > 0.0);
        assert_eq!(state.trend, None);
        assert_eq!(state.next_high.unwrap().height, 1.8);
        assert_eq!(state.next_low.unwrap().height, 0.4);
    }

    #[test]
    fn dense_state_has_trend() {
        let estimator = TideEstimator::default();
        let samples = rising_samples();
        let state = estimator.current_state(TideView::from_samples(&samples), now());
        assert_eq!(state.trend, Some(Trend::Rising));
        assert_abs_diff_eq!(state.rate.unwrap(), 0.3, epsilon = 1e-6);
    }

    #[test]
    fn interval_predictions_per_offset() {
        let estimator = TideEstimator::default();
        let events = events();
        let view = TideView::from_events(&events);
        let predictions = estimator.interval_predictions(view, &[-180, 180, 60], now());

        assert_eq!(predictions.keys().copied().collect::<Vec<_>>(), vec![-180, 60, 180]);
        let past = predictions[&-180];
        assert_eq!(past.time, now() - Duration::hours(3));
        assert_abs_diff_eq!(past.height, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(predictions[&180].height, 1.8, epsilon = 1e-12);
    }

    #[test]
    fn interval_predictions_skip_unanswerable_offsets() {
        let estimator = TideEstimator::default();
        assert!(estimator
            .interval_predictions(TideView::default(), &[60], now())
            .is_empty());
    }

    #[test]
    fn out_of_range_offsets_are_skipped() {
        let estimator = TideEstimator::default();
        let events = events();
        let view = TideView::from_events(&events);
        let predictions = estimator.interval_predictions(
            view,
            &[200_000_000_000, i64::MIN, i64::MAX, 60],
            now(),
        );
        assert_eq!(predictions.keys().copied().collect::<Vec<_>>(), vec![60]);
    }

    #[test]
    fn chart_uses_real_samples_with_buffer() {
        let estimator = TideEstimator::default();
        let samples: Vec<Sample> = (-10..=10)
            .map(|h| Sample {
                time: now() + Duration::hours(h) + Duration::minutes(20),
                height: h as f64,
            })
            .collect();
        let series = estimator.chart_series(TideView::from_samples(&samples), 2, 3, now());

        // Window is now − 2h30 ..= now + 3h30: −2h40 is out, +3h20 is in
        assert_eq!(series.first().unwrap().height, -2.0);
        assert_eq!(series.last().unwrap().height, 3.0);
        assert_eq!(series.len(), 6);
    }

    #[test]
    fn chart_falls_back_to_synthetic() {
        let estimator = TideEstimator::default();
        let events = events();
        let stale: Vec<Sample> = (0..5)
            .map(|h| Sample {
                time: now() - Duration::days(3) + Duration::hours(h),
                height: 1.0,
            })
            .collect();
        let view = TideView {
            events: &events,
            samples: &stale,
        };
        let series = estimator.chart_series(view, 6, 24, now());
        assert_eq!(series.len(), 31);
        assert_eq!(series[6].time, now());

        assert!(estimator
            .chart_series(TideView::from_samples(&stale), 6, 24, now())
            .is_empty());
    }

    #[test]
    fn chart_series_is_idempotent() {
        let estimator = TideEstimator::default();
        let events = events();
        let view = TideView::from_events(&events);
        assert_eq!(
            estimator.chart_series(view, 6, 12, now()),
            estimator.chart_series(view, 6, 12, now())
        );
    }

    #[cfg(feature = "cubic")]
    #[test]
    fn smooth_chart_series_is_denser() {
        let estimator = TideEstimator::default();
        let events = events();
        let view = TideView::from_events(&events);
        let smooth = estimator.smooth_chart_series(view, 2, 4, 6, now());
        assert_eq!(smooth.len(), 61);
    }

    #[test]
    fn next_extrema_are_strictly_after_now() {
        let events = events();
        let (high, low) = next_extrema(&events, now() + Duration::hours(3));
        assert!(high.is_none());
        assert_eq!(low.unwrap().time, now() + Duration::hours(9));
    }
}
