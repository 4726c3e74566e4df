//! Test execution engine
//!
//! This module contains the execution components:
//! - `scheduler`: fixed-rate probing for a single run
//! - `MatrixExecutor`: sequential execution of the rate x size matrix over one
//!   persistent connection, with pre-flight check and connection loss policy

pub mod scheduler;

pub use scheduler::{
    FailurePolicy, PollScheduler, RunOutcome, RunTermination, SchedulerConfig, DEFAULT_POLL_QUANTUM,
};

use crate::{
    client::{ProbeError, RegisterClient, RegisterProbe, RegisterTarget},
    error::{AppError, Result},
    logging::RunLogger,
    models::{
        metrics::{ProbeOutcome, RunConfig, RunStatistics, TestMatrix},
        Config,
    },
    stats::{StatisticsConfig, StatisticsEngine},
    types::ConnectionLossPolicy,
};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Execution settings derived from the application configuration
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub dropout_threshold: u32,
    pub poll_quantum: Duration,
    pub on_connection_loss: ConnectionLossPolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            dropout_threshold: crate::stats::DEFAULT_DROPOUT_THRESHOLD,
            poll_quantum: DEFAULT_POLL_QUANTUM,
            on_connection_loss: ConnectionLossPolicy::default(),
        }
    }
}

impl From<&Config> for ExecutionConfig {
    fn from(config: &Config) -> Self {
        Self {
            dropout_threshold: config.dropout_threshold,
            poll_quantum: config.poll_quantum(),
            on_connection_loss: config.on_connection_loss,
        }
    }
}

/// How the whole matrix ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixTermination {
    /// Every run finished its duration
    Completed,
    /// Cancelled by the user
    Interrupted,
    /// Stopped because the connection could not be kept
    Aborted { reason: String },
}

/// Everything the matrix produced, including partial runs
#[derive(Debug, Clone)]
pub struct MatrixResults {
    /// One entry per started run, in matrix order
    pub stats: Vec<RunStatistics>,
    /// Every probe outcome, in issue order
    pub outcomes: Vec<ProbeOutcome>,
    pub termination: MatrixTermination,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl Default for MatrixResults {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixResults {
    pub fn new() -> Self {
        Self {
            stats: Vec::new(),
            outcomes: Vec::new(),
            termination: MatrixTermination::Completed,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.termination == MatrixTermination::Completed
    }

    pub fn total_probes(&self) -> u64 {
        self.stats.iter().map(|s| s.total).sum()
    }

    /// Success ratio across every run (0.0-1.0)
    pub fn overall_success_rate(&self) -> f64 {
        let total = self.total_probes();
        if total == 0 {
            return 0.0;
        }
        self.stats.iter().map(|s| s.succeeded).sum::<u64>() as f64 / total as f64
    }

    pub fn total_dropouts(&self) -> u64 {
        self.stats.iter().map(|s| s.dropout_count).sum()
    }
}

/// Receives progress events while the matrix executes
pub trait ProgressObserver: Send + Sync {
    fn on_run_start(&self, _index: usize, _total: usize, _run: &RunConfig) {}

    /// Called for every outcome; `sequence` is zero-based within the run
    fn on_outcome(&self, _sequence: usize, _outcome: &ProbeOutcome) {}

    fn on_run_complete(&self, _stats: &RunStatistics, _termination: &RunTermination) {}

    fn on_reconnect(&self, _endpoint: &str, _result: &std::result::Result<(), ProbeError>) {}
}

/// Observer that ignores every event
pub struct SilentObserver;

impl ProgressObserver for SilentObserver {}

/// Runs a test matrix against one register target
pub struct MatrixExecutor<C> {
    probe: RegisterProbe<C>,
    scheduler: PollScheduler,
    engine: StatisticsEngine,
    policy: ConnectionLossPolicy,
    run_logger: Option<RunLogger>,
}

impl<C: RegisterClient> MatrixExecutor<C> {
    pub fn new(client: C, target: RegisterTarget, config: ExecutionConfig) -> Self {
        let failure_policy = match config.on_connection_loss {
            ConnectionLossPolicy::Abort | ConnectionLossPolicy::Skip => FailurePolicy::AbortOnConnectionLoss,
            ConnectionLossPolicy::Record => FailurePolicy::RecordAll,
        };

        Self {
            probe: RegisterProbe::new(client, target),
            scheduler: PollScheduler::new(SchedulerConfig {
                poll_quantum: config.poll_quantum,
                failure_policy,
            }),
            engine: StatisticsEngine::new(StatisticsConfig {
                dropout_threshold: config.dropout_threshold,
            }),
            policy: config.on_connection_loss,
            run_logger: None,
        }
    }

    /// Attach a structured logger for run lifecycle events
    pub fn with_run_logger(mut self, run_logger: RunLogger) -> Self {
        self.run_logger = Some(run_logger);
        self
    }

    pub fn client(&self) -> &C {
        self.probe.client()
    }

    pub fn into_client(self) -> C {
        self.probe.into_client()
    }

    /// Connect and read one register; any failure means the matrix must not start
    pub async fn preflight(&mut self) -> Result<()> {
        let endpoint = self.probe.client().endpoint().to_string();

        if !self.probe.client().is_connected() {
            let result = self.probe.client_mut().connect().await;
            if let Some(logger) = &self.run_logger {
                let error = result.as_ref().err().map(|e| e.to_string());
                logger.log_connection(&endpoint, result.is_ok(), error.as_deref()).await;
            }
            result.map_err(|e| AppError::connection(format!("Failed to connect to {}: {}", endpoint, e)))?;
        }

        let target = *self.probe.target();
        self.probe
            .client_mut()
            .read_registers(target.register_type, target.address, 1, target.unit_id)
            .await
            .map_err(|e| {
                AppError::connection(format!(
                    "Test read of {} register {} on {} failed: {}",
                    target.register_type, target.address, endpoint, e
                ))
            })?;

        Ok(())
    }

    /// Execute every run of `matrix` in order.
    ///
    /// Partial runs (interrupted or cut short by connection loss) keep their
    /// statistics. The connection is left open; call `shutdown` afterwards.
    pub async fn execute(
        &mut self,
        matrix: &TestMatrix,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> Result<MatrixResults> {
        if matrix.is_empty() {
            return Err(AppError::test_execution("Test matrix is empty"));
        }

        let mut results = MatrixResults::new();
        let started = Instant::now();
        let total = matrix.len();

        for (index, run) in matrix.runs().iter().enumerate() {
            if cancel.is_cancelled() {
                results.termination = MatrixTermination::Interrupted;
                break;
            }

            if !self.probe.client().is_connected() {
                if let Err(reason) = self.reconnect(observer).await {
                    if self.policy != ConnectionLossPolicy::Record {
                        results.termination = MatrixTermination::Aborted { reason };
                        break;
                    }
                }
            }

            observer.on_run_start(index, total, run);
            if let Some(logger) = &self.run_logger {
                logger.log_run_start(index, total, run).await;
            }

            let mut aggregator = self.engine.aggregator(*run);
            let mut sequence = 0usize;
            let outcome = self
                .scheduler
                .run(run, &mut self.probe, cancel, |probe_outcome| {
                    aggregator.record(probe_outcome);
                    observer.on_outcome(sequence, probe_outcome);
                    sequence += 1;
                })
                .await;

            let stats = aggregator.finish();
            observer.on_run_complete(&stats, &outcome.termination);
            self.log_run(&outcome, &stats).await;

            results.stats.push(stats);
            results.outcomes.extend(outcome.outcomes);

            match outcome.termination {
                RunTermination::Completed => {}
                RunTermination::Cancelled => {
                    results.termination = MatrixTermination::Interrupted;
                    break;
                }
                RunTermination::ConnectionLost(reason) => {
                    if let Some(logger) = &self.run_logger {
                        logger.log_connection_lost(run, &reason).await;
                    }
                    if self.policy == ConnectionLossPolicy::Abort {
                        results.termination = MatrixTermination::Aborted {
                            reason: format!("{} during {}", reason, run.label()),
                        };
                        break;
                    }
                    // Skip: reconnect before the next run
                }
            }
        }

        results.elapsed = started.elapsed();
        Ok(results)
    }

    /// Close the connection
    pub async fn shutdown(&mut self) {
        self.probe.client_mut().disconnect().await;
    }

    async fn reconnect(&mut self, observer: &dyn ProgressObserver) -> std::result::Result<(), String> {
        let endpoint = self.probe.client().endpoint().to_string();
        let result = self.probe.client_mut().connect().await;

        observer.on_reconnect(&endpoint, &result);
        if let Some(logger) = &self.run_logger {
            let error = result.as_ref().err().map(|e| e.to_string());
            logger.log_connection(&endpoint, result.is_ok(), error.as_deref()).await;
        }

        result.map_err(|e| format!("reconnect to {} failed: {}", endpoint, e))
    }

    async fn log_run(&self, outcome: &RunOutcome, stats: &RunStatistics) {
        let Some(logger) = &self.run_logger else {
            return;
        };

        for (sequence, probe_outcome) in outcome.outcomes.iter().enumerate() {
            logger.log_probe(sequence, probe_outcome).await;
        }

        let termination = match &outcome.termination {
            RunTermination::Completed => "completed",
            RunTermination::Cancelled => "cancelled",
            RunTermination::ConnectionLost(_) => "connection lost",
        };
        logger.log_run_complete(stats, termination).await;
    }
}
