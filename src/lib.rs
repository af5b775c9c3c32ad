//! # Tide Curve Core Library
//!
//! This library reconstructs a continuous tide-height curve from the two kinds of
//! data a tide station publishes:
//!
//! - **Extrema**: predicted high and low water, roughly one event every 6 hours
//! - **Dense samples**: hourly predictions and/or past water-level observations,
//!   concatenated into one time-ordered series
//!
//! From those it derives the current height, its rate of change, a
//! rising/falling/steady trend and an evenly spaced series suitable for charting.
//!
//! ## Estimation Tiers
//!
//! Every height query walks an ordered list of strategies and takes the first
//! answer:
//!
//! 1. **Dense series**: clamp outside the series, piecewise cubic spline when
//!    there are at least four distinct timestamps (feature `cubic`), otherwise
//!    linear interpolation between the bracketing samples
//! 2. **Extrema**: half a cosine cycle between consecutive high/low events, with
//!    a synthetic opposite extremum one semi-period beyond the known ones
//!
//! Rate follows the same order (numerical derivative of the spline, then the
//! analytic derivative of the cosine model). Trend is only ever taken from real
//! dense samples.
//!
//! ## Refresh Cadences
//!
//! The [`coordinator::RefreshCoordinator`] polls a [`provider::TideProvider`]
//! on a slow cadence and recomputes the [`CurrentState`] from its cached data on
//! a fast cadence, without touching the network.
//!
//! ## Core Types
//!
//! - [`TideEvent`]: a high or low water extremum
//! - [`Sample`]: a timestamped height, from a prediction or an observation
//! - [`TideData`] / [`TideView`]: owned and borrowed bundles of both
//! - [`CurrentState`] and [`IntervalPrediction`]: derived outputs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod coordinator;
pub mod estimator;
pub mod extrema;
pub mod interpolate;
pub mod provider;
pub mod rate;
#[cfg(feature = "cubic")]
pub mod spline;
pub mod strategy;
pub mod synthetic;
pub mod trend;

/// Which kind of turning point an extremum is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TideKind {
    High,
    Low,
}

/// A high or low water event.
///
/// Events come from the provider already ordered by time and are never edited
/// after they are received.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use tide_curve_lib::{TideEvent, TideKind};
///
/// let high = TideEvent {
///     time: Utc.with_ymd_and_hms(2025, 7, 24, 12, 0, 0).unwrap(),
///     height: 2.0,
///     kind: TideKind::High,
/// };
/// assert_eq!(high.kind, TideKind::High);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TideEvent {
    pub time: DateTime<Utc>,
    /// Height above station datum
    pub height: f64,
    pub kind: TideKind,
}

/// A single timestamped height.
///
/// The series does not record whether a sample is a prediction or an
/// observation; both are merged in time order before they reach the estimators.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: DateTime<Utc>,
    /// Height above station datum
    pub height: f64,
}

/// Direction of the tide around an instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Steady,
}

/// Raw data for one station as returned by a provider.
///
/// `samples` may be empty when the station has no dense predictions or
/// observations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TideData {
    #[serde(default)]
    pub events: Vec<TideEvent>,
    #[serde(default)]
    pub samples: Vec<Sample>,
}

impl TideData {
    /// Borrow both sequences as a [`TideView`].
    pub fn view(&self) -> TideView<'_> {
        TideView {
            events: &self.events,
            samples: &self.samples,
        }
    }

    /// Stable-sort both sequences by time.
    ///
    /// Returns `true` if anything had to move.
    pub fn sort_by_time(&mut self) -> bool {
        let events_sorted = self.events.windows(2).all(|w| w[0].time <= w[1].time);
        let samples_sorted = self.samples.windows(2).all(|w| w[0].time <= w[1].time);
        if !events_sorted {
            self.events.sort_by_key(|e| e.time);
        }
        if !samples_sorted {
            self.samples.sort_by_key(|s| s.time);
        }
        !(events_sorted && samples_sorted)
    }
}

/// Borrowed view over extrema and dense samples.
///
/// This is what every height strategy receives, so a dense-series strategy and
/// an extrema strategy can sit in the same ordered chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct TideView<'a> {
    pub events: &'a [TideEvent],
    pub samples: &'a [Sample],
}

impl<'a> TideView<'a> {
    /// A view with dense samples only.
    pub fn from_samples(samples: &'a [Sample]) -> Self {
        Self {
            events: &[],
            samples,
        }
    }

    /// A view with extrema only.
    pub fn from_events(events: &'a [TideEvent]) -> Self {
        Self {
            events,
            samples: &[],
        }
    }
}

/// Snapshot of the tide at one instant.
///
/// Recomputed from the cache on every tick and replaced wholesale. Any field
/// can be `None` when the cached data cannot support it.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use tide_curve_lib::{CurrentState, Trend};
///
/// let state = CurrentState {
///     height: Some(1.2),
///     time: Utc::now(),
///     rate: Some(0.35),
///     trend: Some(Trend::Rising),
///     next_high: None,
///     next_low: None,
/// };
/// assert!(state.rate.unwrap() > 0.0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentState {
    pub height: Option<f64>,
    pub time: DateTime<Utc>,
    /// Height units per hour, positive while rising
    pub rate: Option<f64>,
    pub trend: Option<Trend>,
    /// First high water strictly after `time`
    pub next_high: Option<TideEvent>,
    /// First low water strictly after `time`
    pub next_low: Option<TideEvent>,
}

/// Height predicted at a fixed offset from "now".
///
/// Negative offsets look into the past (observations when available), positive
/// ones into the future.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntervalPrediction {
    pub offset_minutes: i64,
    pub time: DateTime<Utc>,
    pub height: f64,
}

/// Signed seconds from `from` to `to`, with sub-second precision.
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}
