//! poll.rs - Loop timing and the poll loop driver
//!
//! One cycle is fetch-then-gate. Whatever happens inside a cycle is
//! handled and logged there; the loop only ever sees a completed
//! cycle. Shutdown is a future supplied by the caller and armed once,
//! so an interrupt arriving mid-cycle is still observed at the next
//! select.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;

use crate::publisher::{Messenger, PublishOutcome, PublisherGate};
use crate::sources::{PriceFetcher, Transport};

/// Upper bound on the wall-clock alignment period. Keeps the
/// millisecond boundary math comfortably inside u64/i64 range.
const MAX_ALIGNED_PERIOD_SECS: u64 = 86_400;

/// When the next poll fires.
#[derive(Debug, Clone, Copy)]
pub enum PollTiming {
    /// A fixed sleep between cycles.
    Every(Duration),
    /// Wall-clock alignment: fire when UTC time reaches the next
    /// multiple of the period (e.g. :00 and :30 for a 30s period).
    Aligned { period_secs: u64 },
}

impl PollTiming {
    pub fn from_config(interval: Duration, align_to_clock: bool) -> Self {
        if align_to_clock {
            PollTiming::Aligned {
                period_secs: interval.as_secs().clamp(1, MAX_ALIGNED_PERIOD_SECS),
            }
        } else {
            PollTiming::Every(interval)
        }
    }

    /// How long to wait from `now` until the next tick.
    pub fn next_wait(&self, now: DateTime<Utc>) -> Duration {
        match self {
            PollTiming::Every(interval) => *interval,
            PollTiming::Aligned { period_secs } => {
                let period_secs = (*period_secs).clamp(1, MAX_ALIGNED_PERIOD_SECS);
                let period_ms = period_secs * 1000;
                let into_period_ms = (now.timestamp().rem_euclid(period_secs as i64) as u64)
                    * 1000
                    + now.timestamp_subsec_millis() as u64;
                let wait_ms = period_ms - (into_period_ms % period_ms);
                Duration::from_millis(wait_ms)
            }
        }
    }
}

/// Run one Fetcher+Gate cycle. Never fails: a cycle where no source
/// yields a price, or where delivery is rejected, is a logged no-op.
/// Returns the fetched price when one was obtained.
pub async fn run_cycle<T, M>(
    fetcher: &PriceFetcher<T>,
    gate: &mut PublisherGate,
    messenger: &M,
    channel: &str,
) -> Option<(Decimal, PublishOutcome)>
where
    T: Transport,
    M: Messenger + ?Sized,
{
    let price = match fetcher.fetch().await {
        Some(price) => price,
        None => {
            warn!("No price available this cycle - skipping");
            return None;
        }
    };

    let outcome = gate.process(messenger, channel, price).await;
    Some((price, outcome))
}

/// The poll loop: an immediate first cycle, then wait-and-poll until
/// the shutdown future resolves. The shutdown future is pinned once
/// up front; a signal landing while a cycle is in flight resolves it
/// and is seen at the very next select, before any further sleep.
/// Returns the number of cycles completed.
pub async fn run_loop<T, M, F>(
    fetcher: &PriceFetcher<T>,
    gate: &mut PublisherGate,
    messenger: &M,
    channel: &str,
    timing: PollTiming,
    shutdown: F,
) -> u64
where
    T: Transport,
    M: Messenger + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    // First cycle runs immediately so the channel gets a price at
    // startup instead of after the first wait.
    let mut cycle_count: u64 = 1;
    run_cycle(fetcher, gate, messenger, channel).await;

    loop {
        let wait = timing.next_wait(Utc::now());
        debug!("Waiting {:.1}s until next poll", wait.as_secs_f64());

        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(wait) => {}
        }

        cycle_count += 1;
        debug!("Cycle #{}", cycle_count);
        run_cycle(fetcher, gate, messenger, channel).await;

        // Stats every 100 cycles
        if cycle_count % 100 == 0 {
            info!("Stats: {} cycles completed", cycle_count);
        }
    }

    cycle_count
}
