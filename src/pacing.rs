//! Randomized request pacing: keeps the scrape looking like a human, not a
//! metronome.

use crate::config::PacingConfig;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Mutable pacing bookkeeping. Owned by exactly one [`Pacer`]; independent
/// scrape runs never share counters.
#[derive(Debug)]
struct PacingState {
    requests_since_cooldown: u32,
    total_requests: u64,
    last_request_at: Option<Instant>,
}

/// Computes and applies the delay before each outbound request.
///
/// The first request of a run goes out immediately. Every later request waits
/// a uniform delay in `[min_delay, max_delay]` plus independent sub-second
/// jitter, and after every `burst_limit` requests an extended cooldown is
/// added on top before the counter resets. Time already spent since the
/// previous request (the fetch itself) is credited against the delay.
#[derive(Debug)]
pub struct Pacer {
    config: PacingConfig,
    state: PacingState,
    rng: StdRng,
}

impl Pacer {
    pub fn new(config: PacingConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Seedable constructor for deterministic tests. Fails on inverted delay
    /// bounds so a bad config cannot panic the sampler mid-run.
    pub fn with_rng(config: PacingConfig, rng: StdRng) -> Result<Self> {
        config.validate()?;
        Ok(Pacer {
            config,
            state: PacingState {
                requests_since_cooldown: 0,
                total_requests: 0,
                last_request_at: None,
            },
            rng,
        })
    }

    pub fn total_requests(&self) -> u64 {
        self.state.total_requests
    }

    fn next_delay(&mut self) -> Duration {
        let base = self
            .rng
            .gen_range(self.config.min_delay_ms..=self.config.max_delay_ms);
        let jitter = if self.config.jitter_ms == 0 {
            0
        } else {
            self.rng.gen_range(0..=self.config.jitter_ms)
        };
        let mut total_ms = base + jitter;

        if self.state.requests_since_cooldown >= self.config.burst_limit {
            debug!(
                cooldown_ms = self.config.burst_cooldown_ms,
                "Burst limit reached, adding cooldown"
            );
            total_ms += self.config.burst_cooldown_ms;
            self.state.requests_since_cooldown = 0;
        }

        Duration::from_millis(total_ms)
    }

    /// Wait the appropriate time, then account for the request about to be
    /// issued. The first call of a run returns without sleeping.
    pub async fn pause_before_request(&mut self) {
        if let Some(last) = self.state.last_request_at {
            let delay = self.next_delay();
            let elapsed = last.elapsed();
            if elapsed < delay {
                debug!(sleep_ms = (delay - elapsed).as_millis() as u64, "Pacing");
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        self.state.requests_since_cooldown += 1;
        self.state.total_requests += 1;
        self.state.last_request_at = Some(Instant::now());
    }
}
