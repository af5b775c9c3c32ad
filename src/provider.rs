//! # Tide Data Providers
//!
//! A provider answers one question: given a station and a time window, what
//! extrema (and optionally dense predictions) are known? The refresh
//! coordinator only talks to the [`TideProvider`] trait, so a network client,
//! a recorded file and a test double are interchangeable.
//!
//! ## Recorded Provider
//! [`RecordedProvider`] replays a JSON recording of the form
//!
//! ```json
//! {
//!   "events":  [{ "time": "2025-07-24T09:00:00Z", "height": 0.2, "kind": "low" }],
//!   "samples": [{ "time": "2025-07-24T09:00:00Z", "height": 0.2 }]
//! }
//! ```
//!
//! Both arrays are optional. Samples are dropped when the request does not
//! ask for dense data, and everything outside the requested window is
//! filtered out unless the provider was built with
//! [`unwindowed`](RecordedProvider::unwindowed).

use crate::TideData;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::{fs, io};
use thiserror::Error;
use tracing::debug;

/// Errors a provider can report for a single fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The source has nothing for this station or is unreachable
    #[error("tide data unavailable: {0}")]
    Unavailable(String),

    #[error("reading tide data: {0}")]
    Io(#[from] io::Error),

    #[error("parsing tide data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What the coordinator asks a provider for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub station: String,
    pub hours_before: i64,
    pub hours_after: i64,
    /// Include the dense prediction series
    pub want_dense: bool,
    /// Include observed water levels (providers without them ignore this)
    pub want_observations: bool,
}

impl FetchRequest {
    /// Absolute window `[now - hours_before, now + hours_after]`, saturating at
    /// the representable range.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Duration::try_hours(self.hours_before)
            .and_then(|before| now.checked_sub_signed(before))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let end = Duration::try_hours(self.hours_after)
            .and_then(|after| now.checked_add_signed(after))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (start, end)
    }
}

#[async_trait]
pub trait TideProvider: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<TideData, FetchError>;
}

/// Replays tide data recorded to a JSON file.
#[derive(Clone, Debug)]
pub struct RecordedProvider {
    path: PathBuf,
    windowed: bool,
}

impl RecordedProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            windowed: true,
        }
    }

    /// Return the whole recording regardless of the requested window.
    pub fn unwindowed(mut self) -> Self {
        self.windowed = false;
        self
    }

    fn load(&self) -> Result<TideData, FetchError> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn select(&self, mut data: TideData, request: &FetchRequest, now: DateTime<Utc>) -> TideData {
        if !request.want_dense {
            data.samples.clear();
        }
        if self.windowed {
            let (start, end) = request.window(now);
            data.events.retain(|e| start <= e.time && e.time <= end);
            data.samples.retain(|s| start <= s.time && s.time <= end);
        }
        data
    }
}

#[async_trait]
impl TideProvider for RecordedProvider {
    async fn fetch(&self, request: &FetchRequest) -> Result<TideData, FetchError> {
        let data = self.load()?;
        let data = self.select(data, request, Utc::now());
        if data.events.is_empty() && data.samples.is_empty() {
            return Err(FetchError::Unavailable(format!(
                "{} has no data for station {} in the requested window",
                self.path.display(),
                request.station
            )));
        }
        debug!(
            "replayed {} events and {} samples from {}",
            data.events.len(),
            data.samples.len(),
            self.path.display()
        );
        Ok(data)
    }
}
