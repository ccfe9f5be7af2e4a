//! Validated calendar date ranges for a scrape run.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidRange {
    #[error("start date {start} is after end date {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },
    #[error("range spans {days} days, maximum is {max_days}")]
    TooLong { days: i64, max_days: i64 },
}

/// Inclusive range of calendar dates, validated at construction.
///
/// Validation happens here, at the boundary: a `DateRange` that exists is
/// always safe to hand to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate, max_days: i64) -> Result<Self, InvalidRange> {
        if start > end {
            return Err(InvalidRange::StartAfterEnd { start, end });
        }
        let days = (end - start).num_days();
        if days > max_days {
            return Err(InvalidRange::TooLong { days, max_days });
        }
        Ok(DateRange { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of dates in the range, endpoints included.
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate every date in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        self.start.iter_days().take(self.len())
    }
}
