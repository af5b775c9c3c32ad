//! # Trend Classification
//!
//! Rising, falling or steady, judged from the real dense series around the
//! target. The sample closest to the target is located and its neighbours are
//! compared; at either end of the series the first two or last two samples are
//! used instead.

use crate::{Sample, Trend};
use chrono::{DateTime, Utc};

/// Height change below which the tide counts as steady
pub const TREND_STEADY_THRESHOLD: f64 = 0.1;

#[derive(Clone, Copy, Debug)]
pub struct TrendClassifier {
    steady_threshold: f64,
}

impl Default for TrendClassifier {
    fn default() -> Self {
        Self::new(TREND_STEADY_THRESHOLD)
    }
}

impl TrendClassifier {
    pub fn new(steady_threshold: f64) -> Self {
        Self { steady_threshold }
    }

    /// Trend at `target`, or `None` with fewer than 3 samples.
    ///
    /// # Example
    /// ```
    /// use chrono::{Duration, TimeZone, Utc};
    /// use tide_curve_lib::{trend::TrendClassifier, Sample, Trend};
    ///
    /// let t0 = Utc.with_ymd_and_hms(2025, 7, 24, 12, 0, 0).unwrap();
    /// let samples: Vec<Sample> = [1.0, 1.5, 2.0]
    ///     .iter()
    ///     .enumerate()
    ///     .map(|(i, &height)| Sample { time: t0 + Duration::hours(i as i64), height })
    ///     .collect();
    ///
    /// let trend = TrendClassifier::default().classify(&samples, t0 + Duration::hours(1));
    /// assert_eq!(trend, Some(Trend::Rising));
    /// ```
    pub fn classify(&self, samples: &[Sample], target: DateTime<Utc>) -> Option<Trend> {
        let n = samples.len();
        if n < 3 {
            return None;
        }

        // First minimum wins on ties
        let mut closest = 0;
        let mut best = i64::MAX;
        for (i, sample) in samples.iter().enumerate() {
            let diff = (sample.time - target).num_milliseconds().abs();
            if diff < best {
                best = diff;
                closest = i;
            }
        }

        let (before, after) = match closest {
            0 => (samples[0].height, samples[1].height),
            i if i == n - 1 => (samples[n - 2].height, samples[n - 1].height),
            i => (samples[i - 1].height, samples[i + 1].height),
        };

        let change = after - before;
        Some(if change.abs() < self.steady_threshold {
            Trend::Steady
        } else if change > 0.0 {
            Trend::Rising
        } else {
            Trend::Falling
        })
    }
}
