//! # Not-a-knot Cubic Spline
//!
//! Piecewise cubic interpolation through every knot with continuous first and
//! second derivatives, and a continuous third derivative at the second and
//! second-to-last knots ("not-a-knot" ends). With exactly four knots this is
//! the single cubic through all of them, and any cubic polynomial is reproduced
//! exactly.
//!
//! The system for the knot second derivatives `M` is reduced to a tridiagonal
//! one by eliminating `M[0]` and `M[n-1]` with the end conditions, then solved
//! with the Thomas algorithm. A zero pivot is reported as [`SplineError::Singular`]
//! so callers can fall back to a simpler interpolant.
//!
//! Outside the knot range the spline returns the edge knot values.

use crate::{seconds_between, Sample};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

/// Reasons a spline cannot be built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    #[error("need at least 4 distinct knots, got {0}")]
    TooFewKnots(usize),

    #[error("knot abscissae must be strictly increasing")]
    NotIncreasing,

    #[error("spline system is singular")]
    Singular,

    #[error("non-finite value in spline input")]
    NonFinite,
}

/// Cubic spline over `f64` abscissae.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative at each knot
    m: Vec<f64>,
}

impl CubicSpline {
    /// Build a spline through `(xs[i], ys[i])`.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, SplineError> {
        let n = xs.len();
        if n < 4 || ys.len() != n {
            return Err(SplineError::TooFewKnots(n.min(ys.len())));
        }
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(SplineError::NonFinite);
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SplineError::NotIncreasing);
        }

        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let slope: Vec<f64> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / h[i]).collect();

        // Unknowns M[1..=n-2], one row per interior knot
        let size = n - 2;
        let mut sub = vec![0.0; size];
        let mut diag = vec![0.0; size];
        let mut sup = vec![0.0; size];
        let mut rhs = vec![0.0; size];

        for row in 0..size {
            let i = row + 1;
            sub[row] = h[i - 1];
            diag[row] = 2.0 * (h[i - 1] + h[i]);
            sup[row] = h[i];
            rhs[row] = 6.0 * (slope[i] - slope[i - 1]);
        }

        // M[0] = M[1] (1 + h0/h1) - M[2] h0/h1
        let (h0, h1) = (h[0], h[1]);
        diag[0] = 3.0 * h0 + 2.0 * h1 + h0 * h0 / h1;
        sup[0] = h1 - h0 * h0 / h1;

        // M[n-1] = M[n-2] (1 + hb/ha) - M[n-3] hb/ha
        let (ha, hb) = (h[n - 3], h[n - 2]);
        let last = size - 1;
        sub[last] = ha - hb * hb / ha;
        diag[last] = 2.0 * ha + 3.0 * hb + hb * hb / ha;

        let interior = solve_tridiagonal(&sub, &diag, &sup, &rhs)?;

        let mut m = Vec::with_capacity(n);
        m.push(interior[0] * (1.0 + h0 / h1) - interior[1] * h0 / h1);
        m.extend_from_slice(&interior);
        m.push(interior[last] * (1.0 + hb / ha) - interior[last - 1] * hb / ha);

        if m.iter().any(|v| !v.is_finite()) {
            return Err(SplineError::Singular);
        }

        Ok(Self { xs, ys, m })
    }

    /// Evaluate at `x`, holding the edge values outside the knot range.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1];
        }

        // Interval i with xs[i] <= x < xs[i + 1]
        let i = self.xs.partition_point(|&k| k <= x) - 1;
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let a = x1 - x;
        let b = x - x0;

        m0 * a * a * a / (6.0 * h)
            + m1 * b * b * b / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }
}

/// Thomas algorithm for a tridiagonal system.
///
/// `sub[0]` and `sup[last]` are ignored.
fn solve_tridiagonal(
    sub: &[f64],
    diag: &[f64],
    sup: &[f64],
    rhs: &[f64],
) -> Result<Vec<f64>, SplineError> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];

    if diag[0].abs() < f64::EPSILON {
        return Err(SplineError::Singular);
    }
    c[0] = sup[0] / diag[0];
    d[0] = rhs[0] / diag[0];

    for i in 1..n {
        let pivot = diag[i] - sub[i] * c[i - 1];
        if pivot.abs() < f64::EPSILON {
            return Err(SplineError::Singular);
        }
        c[i] = if i + 1 < n { sup[i] / pivot } else { 0.0 };
        d[i] = (rhs[i] - sub[i] * d[i - 1]) / pivot;
    }

    let mut x = vec![0.0; n];
    x[n - 1] = d[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = d[i] - c[i] * x[i + 1];
    }
    Ok(x)
}

/// Spline over a time series, with abscissae in seconds since the first sample.
#[derive(Debug, Clone)]
pub struct TimeSpline {
    origin: DateTime<Utc>,
    spline: CubicSpline,
}

impl TimeSpline {
    /// Build from samples, keeping the first sample of every repeated timestamp.
    pub fn from_samples(samples: &[Sample]) -> Result<Self, SplineError> {
        let unique = dedup_first(samples);
        if unique.len() < 4 {
            return Err(SplineError::TooFewKnots(unique.len()));
        }
        let origin = unique[0].time;
        let xs = unique.iter().map(|s| seconds_between(origin, s.time)).collect();
        let ys = unique.iter().map(|s| s.height).collect();
        Ok(Self {
            origin,
            spline: CubicSpline::new(xs, ys)?,
        })
    }

    /// Height at an instant.
    pub fn height_at(&self, time: DateTime<Utc>) -> f64 {
        self.spline.eval(seconds_between(self.origin, time))
    }

    /// Height at `offset_secs` seconds after `time`.
    pub fn height_offset(&self, time: DateTime<Utc>, offset_secs: f64) -> f64 {
        self.spline.eval(seconds_between(self.origin, time) + offset_secs)
    }
}

/// Samples with repeated timestamps removed, first occurrence kept.
pub fn dedup_first(samples: &[Sample]) -> Vec<Sample> {
    let mut seen = HashSet::with_capacity(samples.len());
    samples
        .iter()
        .filter(|s| seen.insert(s.time))
        .copied()
        .collect()
}
