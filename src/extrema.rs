//! # Extrema-Only Interpolation
//!
//! When a station only publishes high and low water, the curve between two
//! consecutive extrema is modelled as half a cosine cycle:
//!
//! ```text
//! phase  = π · (t − t0) / (t1 − t0)
//! height = (h0 + h1)/2 − (h1 − h0)/2 · cos(phase)
//! ```
//!
//! The curve passes exactly through both extrema and is flat at each of them,
//! as a turning tide is.
//!
//! ## Edge Extrapolation
//! Before the first known extremum (or after the last) an opposite extremum is
//! assumed one semi-period away (nominally 6.2 hours), with the height of the
//! other known extremum. Past that synthetic extremum the phase is held at its
//! end, so the curve levels off instead of oscillating indefinitely.
//!
//! The unclamped formula would let the phase run past π and turn the curve
//! back toward the known extremum; here it stops at π. Between known extrema
//! the phase never leaves `[0, π]`, so only extrapolated segments differ.

use crate::strategy::HeightStrategy;
use crate::{seconds_between, Sample, TideEvent, TideView};
use chrono::{DateTime, Duration, Utc};
use std::f64::consts::PI;

/// Nominal time between a high and the following low (half of 12.42 h, rounded)
pub const TIDE_SEMI_PERIOD_HOURS: f64 = 6.2;

/// One half-cosine segment resolved for a particular target instant.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Segment {
    from_height: f64,
    to_height: f64,
    period_secs: f64,
    elapsed_secs: f64,
    extrapolated: bool,
}

impl Segment {
    fn phase(&self) -> Option<f64> {
        if self.period_secs == 0.0 {
            return None;
        }
        let phase = PI * self.elapsed_secs / self.period_secs;
        Some(if self.extrapolated {
            phase.clamp(0.0, PI)
        } else {
            phase
        })
    }

    fn amplitude(&self) -> f64 {
        (self.to_height - self.from_height) / 2.0
    }

    fn height(&self) -> f64 {
        match self.phase() {
            Some(phase) => {
                let mean = (self.from_height + self.to_height) / 2.0;
                mean - self.amplitude() * phase.cos()
            }
            None => self.from_height,
        }
    }

    /// Analytic derivative, in height units per hour.
    fn rate_per_hour(&self) -> f64 {
        match self.phase() {
            Some(phase) => {
                if self.extrapolated && (phase <= 0.0 || phase >= PI) {
                    return 0.0;
                }
                let per_second = self.amplitude() * (PI / self.period_secs) * phase.sin();
                per_second * 3600.0
            }
            None => 0.0,
        }
    }
}

/// Sinusoidal interpolator over high/low extrema.
#[derive(Clone, Copy, Debug)]
pub struct ExtremaInterpolator {
    semi_period: Duration,
}

impl Default for ExtremaInterpolator {
    fn default() -> Self {
        Self::new(Duration::minutes((TIDE_SEMI_PERIOD_HOURS * 60.0).round() as i64))
    }
}

impl ExtremaInterpolator {
    pub fn new(semi_period: Duration) -> Self {
        Self { semi_period }
    }

    /// Height at `target` from a pair of extrema, in either order.
    ///
    /// # Example
    /// ```
    /// use chrono::{Duration, TimeZone, Utc};
    /// use tide_curve_lib::{extrema::ExtremaInterpolator, TideEvent, TideKind};
    ///
    /// let t0 = Utc.with_ymd_and_hms(2025, 7, 24, 12, 0, 0).unwrap();
    /// let high = TideEvent { time: t0, height: 2.0, kind: TideKind::High };
    /// let low = TideEvent { time: t0 + Duration::hours(6), height: 0.0, kind: TideKind::Low };
    ///
    /// let interp = ExtremaInterpolator::default();
    /// assert_eq!(interp.between(&high, &low, t0).height, 2.0);
    /// let mid = interp.between(&high, &low, t0 + Duration::hours(3));
    /// assert!((mid.height - 1.0).abs() < 1e-9);
    /// ```
    pub fn between(&self, a: &TideEvent, b: &TideEvent, target: DateTime<Utc>) -> Sample {
        Sample {
            time: target,
            height: self.segment_for_pair(a, b, target).height(),
        }
    }

    /// Height at `target` from a time-ordered list of extrema.
    ///
    /// Uses the pair bracketing the target, or the first/last two events with
    /// edge extrapolation. `None` with fewer than two events.
    pub fn at(&self, events: &[TideEvent], target: DateTime<Utc>) -> Option<Sample> {
        let segment = self.segment_for(events, target)?;
        Some(Sample {
            time: target,
            height: segment.height(),
        })
    }

    /// Analytic rate of change at `target`, in height units per hour.
    pub fn rate_at(&self, events: &[TideEvent], target: DateTime<Utc>) -> Option<f64> {
        self.segment_for(events, target)
            .map(|segment| segment.rate_per_hour())
    }

    fn segment_for(
        &self,
        events: &[TideEvent],
        target: DateTime<Utc>,
    ) -> Option<Segment> {
        let (a, b) = bracketing_pair(events, target)?;
        Some(self.segment_for_pair(a, b, target))
    }

    fn segment_for_pair(&self, a: &TideEvent, b: &TideEvent, target: DateTime<Utc>) -> Segment {
        let (first, second) = if b.time < a.time { (b, a) } else { (a, b) };
        let semi_secs = self.semi_period.num_milliseconds() as f64 / 1000.0;

        if target < first.time {
            let synthetic = first.time - self.semi_period;
            Segment {
                from_height: second.height,
                to_height: first.height,
                period_secs: semi_secs,
                elapsed_secs: seconds_between(synthetic, target),
                extrapolated: true,
            }
        } else if target > second.time {
            Segment {
                from_height: second.height,
                to_height: first.height,
                period_secs: semi_secs,
                elapsed_secs: seconds_between(second.time, target),
                extrapolated: true,
            }
        } else {
            Segment {
                from_height: first.height,
                to_height: second.height,
                period_secs: seconds_between(first.time, second.time),
                elapsed_secs: seconds_between(first.time, target),
                extrapolated: false,
            }
        }
    }
}

impl HeightStrategy for ExtremaInterpolator {
    fn name(&self) -> &'static str {
        "extrema"
    }

    fn estimate_height(&self, view: TideView<'_>, target: DateTime<Utc>) -> Option<f64> {
        self.at(view.events, target).map(|s| s.height)
    }
}

/// The pair of extrema to model `target` with.
///
/// Last event at or before the target and first event after it; the first two
/// events when the target precedes them all; the last two when it is at or
/// after the last one.
fn bracketing_pair(events: &[TideEvent], target: DateTime<Utc>) -> Option<(&TideEvent, &TideEvent)> {
    let n = events.len();
    if n < 2 {
        return None;
    }
    let idx = events.partition_point(|e| e.time <= target);
    Some(match idx {
        0 => (&events[0], &events[1]),
        i if i == n => (&events[n - 2], &events[n - 1]),
        i => (&events[i - 1], &events[i]),
    })
}
