//! # Dense-Series Interpolation
//!
//! Height at an arbitrary instant from hourly predictions and/or water-level
//! observations.
//!
//! ## Rules
//! 1. Fewer than 2 samples: no answer
//! 2. Target outside the series: the edge sample's height (no extrapolation)
//! 3. Piecewise cubic spline when at least 4 distinct timestamps remain after
//!    dropping repeated ones (feature `cubic`)
//! 4. Linear interpolation between the bracketing samples
//!
//! A cubic failure is never an error; the chain simply moves on to linear.

use crate::strategy::{HeightStrategy, StrategyChain};
use crate::{seconds_between, Sample, TideView};
use chrono::{DateTime, Utc};

#[cfg(feature = "cubic")]
use crate::spline::TimeSpline;
#[cfg(feature = "cubic")]
use tracing::debug;

/// Interpolator over a time-ordered dense series.
pub struct Interpolator {
    chain: StrategyChain,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpolator {
    /// Cubic (when compiled in) then linear.
    pub fn new() -> Self {
        let chain = StrategyChain::new();
        #[cfg(feature = "cubic")]
        let chain = chain.with(CubicSegments);
        Self {
            chain: chain.with(LinearSegments),
        }
    }

    /// Strategy names in the order they are tried.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    /// Height at `target`.
    ///
    /// The returned sample always carries `target` as its time. `None` means
    /// the series has fewer than two samples.
    ///
    /// # Example
    /// ```
    /// use chrono::{Duration, TimeZone, Utc};
    /// use tide_curve_lib::{interpolate::Interpolator, Sample};
    ///
    /// let t0 = Utc.with_ymd_and_hms(2025, 7, 24, 12, 0, 0).unwrap();
    /// let samples = [
    ///     Sample { time: t0, height: 1.0 },
    ///     Sample { time: t0 + Duration::hours(1), height: 2.0 },
    /// ];
    /// let mid = Interpolator::new()
    ///     .interpolate(&samples, t0 + Duration::minutes(30))
    ///     .unwrap();
    /// assert!((mid.height - 1.5).abs() < 1e-12);
    /// ```
    pub fn interpolate(&self, samples: &[Sample], target: DateTime<Utc>) -> Option<Sample> {
        let (first, last) = match samples {
            [first, .., last] => (first, last),
            _ => return None,
        };

        let height = if target < first.time {
            first.height
        } else if target > last.time {
            last.height
        } else {
            self.chain
                .estimate(TideView::from_samples(samples), target)?
                .height
        };

        Some(Sample {
            time: target,
            height,
        })
    }
}

impl HeightStrategy for Interpolator {
    fn name(&self) -> &'static str {
        "samples"
    }

    fn estimate_height(&self, view: TideView<'_>, target: DateTime<Utc>) -> Option<f64> {
        self.interpolate(view.samples, target).map(|s| s.height)
    }
}

/// Not-a-knot cubic spline through the deduplicated series.
#[cfg(feature = "cubic")]
pub struct CubicSegments;

#[cfg(feature = "cubic")]
impl HeightStrategy for CubicSegments {
    fn name(&self) -> &'static str {
        "cubic"
    }

    fn estimate_height(&self, view: TideView<'_>, target: DateTime<Utc>) -> Option<f64> {
        if view.samples.len() < 4 {
            return None;
        }
        match TimeSpline::from_samples(view.samples) {
            Ok(spline) => Some(spline.height_at(target)),
            Err(err) => {
                debug!("cubic interpolation unavailable: {err}, falling back to linear");
                None
            }
        }
    }
}

/// Straight line between the last sample at or before the target and the
/// first sample after it.
pub struct LinearSegments;

impl HeightStrategy for LinearSegments {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn estimate_height(&self, view: TideView<'_>, target: DateTime<Utc>) -> Option<f64> {
        let samples = view.samples;
        if samples.len() < 2 {
            return None;
        }

        let idx = samples.partition_point(|s| s.time <= target);
        if idx == 0 {
            return Some(samples[0].height);
        }
        if idx == samples.len() {
            return Some(samples[samples.len() - 1].height);
        }

        let before = samples[idx - 1];
        let after = samples[idx];
        let span = seconds_between(before.time, after.time);
        if span <= 0.0 {
            return Some(before.height);
        }

        let ratio = seconds_between(before.time, target) / span;
        Some(before.height + (after.height - before.height) * ratio)
    }
}
