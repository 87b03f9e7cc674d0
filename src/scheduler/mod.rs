// src/scheduler/mod.rs
// Single cooperative loop: wake on each wall-clock-aligned boundary, pull
// one candidate through the generate → filter → queue chain, dispatch it,
// sleep until the next boundary.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::corpus::Corpus;
use crate::dispatch::Dispatcher;
use crate::engine::GenerationEngine;
use crate::filter::PolicyFilter;
use crate::queue::CandidateQueue;

/// Pause after each cycle before re-evaluating the running flag, so a
/// zero-length wait can never spin.
const POST_DISPATCH_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Cancelling,
    Stopped,
}

pub struct Scheduler {
    engine: GenerationEngine,
    filter: PolicyFilter,
    corpus: Corpus,
    queue: CandidateQueue,
    dispatcher: Dispatcher,
    interval: Duration,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(
        engine: GenerationEngine,
        filter: PolicyFilter,
        corpus: Corpus,
        dispatcher: Dispatcher,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            filter,
            corpus,
            queue: CandidateQueue::new(),
            dispatcher,
            interval,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Drive the posting loop until `cancel` fires. Consumes the scheduler;
    /// the returned state is always `Stopped` and a stopped scheduler is
    /// not resumable.
    pub async fn run(mut self, cancel: CancellationToken) -> SchedulerState {
        self.state = SchedulerState::Running;
        info!("Scheduler started (interval: {:?})", self.interval);

        while self.state == SchedulerState::Running {
            let wait = time_until_next_boundary(SystemTime::now(), self.interval);
            let wake_at =
                Utc::now() + chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::zero());
            debug!("Next posting boundary at {}", wake_at.format("%Y-%m-%d %H:%M:%S UTC"));

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.state = SchedulerState::Cancelling;
                }
                _ = sleep(wait) => {
                    self.run_cycle().await;
                }
            }
            if self.state != SchedulerState::Running {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.state = SchedulerState::Cancelling;
                }
                _ = sleep(POST_DISPATCH_PAUSE) => {}
            }
            if cancel.is_cancelled() {
                self.state = SchedulerState::Cancelling;
            }
        }

        if self.state == SchedulerState::Cancelling {
            info!("Cancellation received, shutting down the schedule");
        }
        self.state = SchedulerState::Stopped;
        info!("Scheduler stopped");
        self.state
    }

    /// One posting cycle. Errors out of the generate → filter → dispatch
    /// chain abandon the cycle but never the schedule.
    async fn run_cycle(&mut self) {
        match self
            .queue
            .pop_or_refill(&mut self.engine, &self.filter, &self.corpus)
            .await
        {
            Ok(Some(candidate)) => self.dispatcher.send(candidate.text()).await,
            Ok(None) => info!("No candidate available this cycle"),
            Err(e) => error!("Posting cycle failed: {:#}", e),
        }
    }
}

/// Time until the smallest future instant that is an exact multiple of
/// `interval` measured from the Unix epoch. Aligned to the wall clock, not
/// "now + interval": starting at 13:05 with a 2 h interval wakes at 14:00.
pub fn time_until_next_boundary(now: SystemTime, interval: Duration) -> Duration {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let interval_secs = interval.as_secs().max(1);
    let next = (since_epoch.as_secs() / interval_secs + 1) * interval_secs;
    Duration::from_secs(next).saturating_sub(since_epoch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn boundary_is_epoch_aligned_not_now_plus_interval() {
        let interval = Duration::from_secs(7200);
        // 1_000_000 s is 6400 s past the previous 2-hour boundary.
        let wait = time_until_next_boundary(at(1_000_000), interval);
        assert_eq!(wait, Duration::from_secs(800));
    }

    #[test]
    fn exactly_on_a_boundary_waits_a_full_interval() {
        let interval = Duration::from_secs(7200);
        let wait = time_until_next_boundary(at(7200), interval);
        assert_eq!(wait, Duration::from_secs(7200));
    }

    #[test]
    fn subsecond_offsets_are_respected() {
        let interval = Duration::from_secs(7200);
        let now = UNIX_EPOCH + Duration::from_millis(7_199_500);
        let wait = time_until_next_boundary(now, interval);
        assert_eq!(wait, Duration::from_millis(500));
    }

    #[test]
    fn zero_interval_never_divides_by_zero() {
        let wait = time_until_next_boundary(at(42), Duration::ZERO);
        assert!(wait <= Duration::from_secs(1));
    }
}
