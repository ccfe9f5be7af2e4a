//! Walks a date range one day at a time, pacing every outbound fetch.

use crate::fetcher::{FetchOutcome, RateFetcher};
use crate::pacing::Pacer;
use crate::range::DateRange;
use chrono::NaiveDate;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Cooperative stop signal, checked once per date between requests. A run
/// never stops mid-request.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeProgress {
    pub date: NaiveDate,
    pub completed: usize,
    pub total: usize,
}

/// Notified after each completed date. Implementations must return promptly;
/// the scheduler never waits on its observer.
pub trait ProgressObserver: Send + Sync {
    fn on_outcome(&self, progress: &ScrapeProgress, outcome: &FetchOutcome);
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_outcome(&self, _progress: &ScrapeProgress, _outcome: &FetchOutcome) {}
}

/// Drives one scrape run: ascending date order, strictly sequential, one
/// fetch per date with pacing in between.
///
/// A failed date is recorded and the scan moves on. There is no retry; a
/// transient failure drops that date for the run.
pub struct ScrapeScheduler<'a> {
    fetcher: &'a dyn RateFetcher,
    observer: &'a dyn ProgressObserver,
    pacer: Pacer,
}

impl<'a> ScrapeScheduler<'a> {
    pub fn new(fetcher: &'a dyn RateFetcher, observer: &'a dyn ProgressObserver, pacer: Pacer) -> Self {
        ScrapeScheduler {
            fetcher,
            observer,
            pacer,
        }
    }

    /// Produce one outcome per date in `range`, in ascending date order. On
    /// cancellation the outcomes collected so far are returned and no further
    /// requests are made.
    pub async fn run(&mut self, range: &DateRange, cancel: &CancelFlag) -> Vec<FetchOutcome> {
        let total = range.len();
        let mut outcomes: Vec<FetchOutcome> = Vec::with_capacity(total);
        info!(start = %range.start(), end = %range.end(), total, "Starting scrape run");

        for date in range.days() {
            if cancel.is_cancelled() {
                info!(completed = outcomes.len(), total, "Scrape cancelled");
                break;
            }

            self.pacer.pause_before_request().await;
            debug!(%date, "Fetching rate");

            let outcome = match self.fetcher.fetch_rate(date).await {
                Ok(sample) => FetchOutcome::Success(sample),
                Err(error) => {
                    warn!(%date, %error, "Fetch failed, moving to next date");
                    FetchOutcome::Failure { date, error }
                }
            };

            let progress = ScrapeProgress {
                date,
                completed: outcomes.len() + 1,
                total,
            };
            self.observer.on_outcome(&progress, &outcome);
            outcomes.push(outcome);
        }

        info!(
            completed = outcomes.len(),
            successful = outcomes.iter().filter(|o| o.is_success()).count(),
            "Scrape run finished"
        );
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PacingConfig;
    use crate::fetcher::{FetchError, RateSample};
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Mutex;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn fast_pacer() -> Pacer {
        let config = PacingConfig {
            min_delay_ms: 1,
            max_delay_ms: 2,
            burst_limit: 5,
            burst_cooldown_ms: 5,
            jitter_ms: 0,
        };
        Pacer::with_rng(config, StdRng::seed_from_u64(0)).unwrap()
    }

    /// Scripted fetcher: fails for listed dates, records every call.
    struct ScriptedFetcher {
        failing: Vec<NaiveDate>,
        calls: Mutex<Vec<NaiveDate>>,
    }

    impl ScriptedFetcher {
        fn new(failing: Vec<NaiveDate>) -> Self {
            ScriptedFetcher {
                failing,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<NaiveDate> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RateFetcher for ScriptedFetcher {
        async fn fetch_rate(&self, date: NaiveDate) -> Result<RateSample, FetchError> {
            self.calls.lock().unwrap().push(date);
            if self.failing.contains(&date) {
                Err(FetchError::Network("connection reset".to_string()))
            } else {
                Ok(RateSample::new(date, 1.35))
            }
        }
    }

    /// Observer that records progress events and optionally cancels after a
    /// given date.
    struct RecordingObserver {
        events: Mutex<Vec<(NaiveDate, usize, usize, bool)>>,
        cancel_after: Option<(NaiveDate, CancelFlag)>,
    }

    impl RecordingObserver {
        fn new() -> Self {
            RecordingObserver {
                events: Mutex::new(Vec::new()),
                cancel_after: None,
            }
        }

        fn cancelling_after(date: NaiveDate, flag: CancelFlag) -> Self {
            RecordingObserver {
                events: Mutex::new(Vec::new()),
                cancel_after: Some((date, flag)),
            }
        }
    }

    impl ProgressObserver for RecordingObserver {
        fn on_outcome(&self, progress: &ScrapeProgress, outcome: &FetchOutcome) {
            self.events.lock().unwrap().push((
                progress.date,
                progress.completed,
                progress.total,
                outcome.is_success(),
            ));
            if let Some((after, flag)) = &self.cancel_after
                && progress.date == *after
            {
                flag.cancel();
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_outcome_per_date_in_ascending_order() {
        let fetcher = ScriptedFetcher::new(vec![]);
        let observer = RecordingObserver::new();
        let mut scheduler = ScrapeScheduler::new(&fetcher, &observer, fast_pacer());
        let range = DateRange::new(date("2024-01-01"), date("2024-01-03"), 90).unwrap();

        let outcomes = scheduler.run(&range, &CancelFlag::new()).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes.iter().map(|o| o.date()).collect::<Vec<_>>(),
            vec![date("2024-01-01"), date("2024-01-02"), date("2024-01-03")]
        );
        assert!(outcomes.iter().all(|o| o.is_success()));
        for sample in outcomes.iter().filter_map(|o| o.sample()) {
            assert!(sample.rate > 0.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_stop_later_dates() {
        let failing = date("2024-01-02");
        let fetcher = ScriptedFetcher::new(vec![failing]);
        let observer = RecordingObserver::new();
        let mut scheduler = ScrapeScheduler::new(&fetcher, &observer, fast_pacer());
        let range = DateRange::new(date("2024-01-01"), date("2024-01-04"), 90).unwrap();

        let outcomes = scheduler.run(&range, &CancelFlag::new()).await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(
            outcomes[1],
            FetchOutcome::Failure {
                date: failing,
                error: FetchError::Network("connection reset".to_string()),
            }
        );
        assert!(outcomes[2].is_success());
        assert!(outcomes[3].is_success());
        // The failing date was attempted exactly once, no retry.
        assert_eq!(
            fetcher.calls().iter().filter(|d| **d == failing).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_running_counts() {
        let fetcher = ScriptedFetcher::new(vec![date("2024-01-02")]);
        let observer = RecordingObserver::new();
        let mut scheduler = ScrapeScheduler::new(&fetcher, &observer, fast_pacer());
        let range = DateRange::new(date("2024-01-01"), date("2024-01-03"), 90).unwrap();

        scheduler.run(&range, &CancelFlag::new()).await;

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                (date("2024-01-01"), 1, 3, true),
                (date("2024-01-02"), 2, 3, false),
                (date("2024-01-03"), 3, 3, true),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_between_dates() {
        let fetcher = ScriptedFetcher::new(vec![]);
        let cancel = CancelFlag::new();
        let observer = RecordingObserver::cancelling_after(date("2024-01-02"), cancel.clone());
        let mut scheduler = ScrapeScheduler::new(&fetcher, &observer, fast_pacer());
        let range = DateRange::new(date("2024-01-01"), date("2024-01-05"), 90).unwrap();

        let outcomes = scheduler.run(&range, &cancel).await;

        // Sequence ends at the date processed when cancellation was requested.
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes.last().unwrap().date(), date("2024-01-02"));
        // No network call was made for any later date.
        assert_eq!(fetcher.calls(), vec![date("2024-01-01"), date("2024-01-02")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_before_start_yields_no_outcomes() {
        let fetcher = ScriptedFetcher::new(vec![]);
        let observer = RecordingObserver::new();
        let mut scheduler = ScrapeScheduler::new(&fetcher, &observer, fast_pacer());
        let range = DateRange::new(date("2024-01-01"), date("2024-01-05"), 90).unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let outcomes = scheduler.run(&range, &cancel).await;

        assert!(outcomes.is_empty());
        assert!(fetcher.calls().is_empty());
    }
}
