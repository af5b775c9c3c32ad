//! # Synthetic Chart Series
//!
//! Charts want an evenly spaced series. Stations without dense predictions
//! only offer a high/low every ~6 hours, so an hourly series is synthesized
//! from the extrema model instead. The result has the same shape as a real
//! dense series, so chart code does not need to know where it came from.
//!
//! Real dense series can also be resampled onto a finer grid through the cubic
//! spline for smoother plotting ([`densify`]).

use crate::extrema::ExtremaInterpolator;
use crate::{Sample, TideEvent};
use chrono::{DateTime, Duration, Utc};

#[cfg(feature = "cubic")]
use crate::spline::TimeSpline;
#[cfg(feature = "cubic")]
use tracing::debug;

/// Default spacing for [`densify`], in minutes
pub const SMOOTH_INTERVAL_MINUTES: i64 = 6;

#[derive(Clone, Copy, Debug, Default)]
pub struct SyntheticSeriesGenerator {
    extrema: ExtremaInterpolator,
}

impl SyntheticSeriesGenerator {
    pub fn new(extrema: ExtremaInterpolator) -> Self {
        Self { extrema }
    }

    /// One point per hour from `now - past_hours` to `now + future_hours`,
    /// both ends included.
    ///
    /// `None` with fewer than two extrema.
    ///
    /// # Example
    /// ```
    /// use chrono::{Duration, TimeZone, Utc};
    /// use tide_curve_lib::{synthetic::SyntheticSeriesGenerator, TideEvent, TideKind};
    ///
    /// let now = Utc.with_ymd_and_hms(2025, 7, 24, 12, 0, 0).unwrap();
    /// let events = [
    ///     TideEvent { time: now - Duration::hours(3), height: 0.2, kind: TideKind::Low },
    ///     TideEvent { time: now + Duration::hours(3), height: 1.9, kind: TideKind::High },
    /// ];
    /// let series = SyntheticSeriesGenerator::default()
    ///     .generate(&events, 6, 24, now)
    ///     .unwrap();
    /// assert_eq!(series.len(), 31);
    /// ```
    pub fn generate(
        &self,
        events: &[TideEvent],
        past_hours: u32,
        future_hours: u32,
        now: DateTime<Utc>,
    ) -> Option<Vec<Sample>> {
        if events.len() < 2 {
            return None;
        }

        let start = now - Duration::hours(i64::from(past_hours));
        let total = i64::from(past_hours) + i64::from(future_hours);
        let mut series = Vec::with_capacity(total as usize + 1);
        for hour in 0..=total {
            let target = start + Duration::hours(hour);
            series.push(self.extrema.at(events, target)?);
        }
        Some(series)
    }
}

/// Resample a dense series every `interval_minutes` from its first to its last
/// sample through the cubic spline.
///
/// The input is returned unchanged when the spline cannot be built (fewer
/// than four distinct timestamps, numerical failure) or the interval is not
/// positive.
#[cfg(feature = "cubic")]
pub fn densify(samples: &[Sample], interval_minutes: i64) -> Vec<Sample> {
    if samples.len() < 4 || interval_minutes <= 0 {
        return samples.to_vec();
    }
    let spline = match TimeSpline::from_samples(samples) {
        Ok(spline) => spline,
        Err(err) => {
            debug!("cannot densify chart series: {err}");
            return samples.to_vec();
        }
    };

    let start = samples[0].time;
    let end = samples[samples.len() - 1].time;
    let steps = (end - start).num_minutes() / interval_minutes;

    let dense: Vec<Sample> = (0..=steps)
        .map(|k| {
            let time = start + Duration::minutes(interval_minutes * k);
            Sample {
                time,
                height: spline.height_at(time),
            }
        })
        .collect();

    debug!(
        "densified {} samples into {} at {} min spacing",
        samples.len(),
        dense.len(),
        interval_minutes
    );
    dense
}

/// Without the spline there is nothing finer to offer than the input.
#[cfg(not(feature = "cubic"))]
pub fn densify(samples: &[Sample], _interval_minutes: i64) -> Vec<Sample> {
    samples.to_vec()
}
