//! The single-date fetch seam and its outcome types.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

/// One (date, rate) observation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSample {
    pub date: NaiveDate,
    pub rate: f64,
    pub fetched_at: DateTime<Utc>,
}

impl RateSample {
    pub fn new(date: NaiveDate, rate: f64) -> Self {
        RateSample {
            date,
            rate,
            fetched_at: Utc::now(),
        }
    }
}

/// Why a single date could not be fetched. Captured per date, never thrown
/// across the range scan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("rate not extractable from response: {0}")]
    Parse(String),
    #[error("source has no rate for this date")]
    NotFound,
}

/// Result of one scheduled fetch, tagged with its date either way.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(RateSample),
    Failure { date: NaiveDate, error: FetchError },
}

impl FetchOutcome {
    pub fn date(&self) -> NaiveDate {
        match self {
            FetchOutcome::Success(sample) => sample.date,
            FetchOutcome::Failure { date, .. } => *date,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn sample(&self) -> Option<&RateSample> {
        match self {
            FetchOutcome::Success(sample) => Some(sample),
            FetchOutcome::Failure { .. } => None,
        }
    }
}

#[async_trait]
pub trait RateFetcher: Send + Sync {
    /// Fetch the rate for exactly one date. Exactly one outbound request per
    /// invocation; retries are not this trait's concern.
    async fn fetch_rate(&self, date: NaiveDate) -> Result<RateSample, FetchError>;
}
