//! # Rate of Change
//!
//! Instantaneous rate of the tide, in height units per hour (positive while
//! rising).
//!
//! The preferred source is a centered finite difference of the cubic spline
//! through the dense series, which needs at least four samples covering the
//! target. Otherwise the analytic derivative of the half-cosine extrema model
//! is used:
//!
//! ```text
//! rate = amplitude · (π / period) · sin(phase)
//! ```

use crate::extrema::ExtremaInterpolator;
use crate::TideView;
use chrono::{DateTime, Utc};

#[cfg(feature = "cubic")]
use crate::spline::TimeSpline;
#[cfg(feature = "cubic")]
use tracing::debug;

/// Time step of the centered difference, in seconds
pub const RATE_DERIVATIVE_DELTA_SECONDS: f64 = 300.0;

#[derive(Clone, Copy, Debug)]
pub struct RateEstimator {
    delta_secs: f64,
    extrema: ExtremaInterpolator,
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new(RATE_DERIVATIVE_DELTA_SECONDS, ExtremaInterpolator::default())
    }
}

impl RateEstimator {
    pub fn new(delta_secs: f64, extrema: ExtremaInterpolator) -> Self {
        Self { delta_secs, extrema }
    }

    /// Rate at `target` in height units per hour.
    ///
    /// `None` only when there is neither a usable dense series nor two extrema.
    pub fn rate_at(&self, view: TideView<'_>, target: DateTime<Utc>) -> Option<f64> {
        #[cfg(feature = "cubic")]
        if let Some(rate) = self.spline_rate(view, target) {
            return Some(rate);
        }
        self.extrema.rate_at(view.events, target)
    }

    #[cfg(feature = "cubic")]
    fn spline_rate(&self, view: TideView<'_>, target: DateTime<Utc>) -> Option<f64> {
        let samples = view.samples;
        let (first, last) = match samples {
            [first, .., last] if samples.len() >= 4 => (first, last),
            _ => return None,
        };
        if target < first.time || target > last.time || self.delta_secs <= 0.0 {
            return None;
        }

        let spline = match TimeSpline::from_samples(samples) {
            Ok(spline) => spline,
            Err(err) => {
                debug!("spline rate unavailable: {err}, using extrema model");
                return None;
            }
        };

        let half = self.delta_secs / 2.0;
        let before = spline.height_offset(target, -half);
        let after = spline.height_offset(target, half);
        let rate = (after - before) / self.delta_secs * 3600.0;
        rate.is_finite().then_some(rate)
    }
}
