//! Fixed-rate probe scheduling for a single run
//!
//! The scheduler issues probes on a deadline grid `start + k * interval`,
//! keeps at most one probe in flight, and never bursts to catch up: when a
//! probe overruns its slot the grid is re-anchored at the current instant.

use crate::client::{Probe, ProbeError};
use crate::models::metrics::{ProbeOutcome, RunConfig};
use chrono::Utc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Longest idle slice between checks for cancellation and deadlines
pub const DEFAULT_POLL_QUANTUM: Duration = Duration::from_millis(10);

/// How probe failures affect the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Every failure is recorded and the run continues
    #[default]
    RecordAll,
    /// Connection loss ends the run; other failures are recorded
    AbortOnConnectionLoss,
}

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_quantum: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_quantum: DEFAULT_POLL_QUANTUM,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTermination {
    /// The configured duration elapsed
    Completed,
    /// The cancellation token fired
    Cancelled,
    /// The transport was lost under `AbortOnConnectionLoss`
    ConnectionLost(String),
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run: RunConfig,
    pub outcomes: Vec<ProbeOutcome>,
    pub termination: RunTermination,
}

impl RunOutcome {
    pub fn is_complete(&self) -> bool {
        self.termination == RunTermination::Completed
    }
}

/// Drives a `Probe` at a fixed rate for a fixed duration
#[derive(Debug, Clone, Default)]
pub struct PollScheduler {
    config: SchedulerConfig,
}

impl PollScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Execute one run.
    ///
    /// `observer` sees every outcome as soon as it is recorded. The returned
    /// outcomes are in issue order.
    pub async fn run<P, F>(
        &self,
        run: &RunConfig,
        probe: &mut P,
        cancel: &CancellationToken,
        mut observer: F,
    ) -> RunOutcome
    where
        P: Probe + ?Sized,
        F: FnMut(&ProbeOutcome),
    {
        let interval = run.interval();
        let start = Instant::now();
        // `None` when the run outlasts the clock: only cancellation ends it
        let end = start.checked_add(run.duration);
        let mut next_deadline = start;
        let mut outcomes = Vec::with_capacity(run.expected_probes().min(1 << 20) as usize);

        let termination = loop {
            let now = Instant::now();

            if end.is_some_and(|end| now >= end) {
                break RunTermination::Completed;
            }
            if cancel.is_cancelled() {
                break RunTermination::Cancelled;
            }

            if now >= next_deadline {
                let timestamp = Utc::now();
                let issued = Instant::now();
                let result = probe.probe(run.request_size).await;
                let latency = issued.elapsed();

                let outcome = match &result {
                    Ok(()) => ProbeOutcome::success(timestamp, latency, run),
                    Err(e) => ProbeOutcome::failure(timestamp, latency, e.to_string(), run),
                };
                observer(&outcome);
                outcomes.push(outcome);

                if let Err(e) = result {
                    if self.should_abort(&e) {
                        break RunTermination::ConnectionLost(e.to_string());
                    }
                }

                // Next grid slot; after an overrun, re-anchor instead of bursting
                // through missed slots. No representable slot ends the run.
                let advanced = next_deadline.checked_add(interval).filter(|deadline| *deadline >= now);
                match advanced.or_else(|| now.checked_add(interval)) {
                    Some(deadline) => next_deadline = deadline,
                    None => break RunTermination::Completed,
                }
                continue;
            }

            let mut wait = (next_deadline - now).min(self.config.poll_quantum);
            if let Some(end) = end {
                wait = wait.min(end - now);
            }

            tokio::select! {
                _ = sleep(wait) => {}
                _ = cancel.cancelled() => {}
            }
        };

        RunOutcome {
            run: *run,
            outcomes,
            termination,
        }
    }

    fn should_abort(&self, error: &ProbeError) -> bool {
        self.config.failure_policy == FailurePolicy::AbortOnConnectionLoss && error.is_connection_loss()
    }
}
