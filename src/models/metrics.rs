//! Probe outcome, run configuration and run statistics data models

use serde::{Deserialize, Serialize};
use std::time::Duration;
use chrono::{DateTime, Utc};

/// Parameters of a single run: one rate, one request size, one duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Probe rate in Hz
    pub rate_hz: f64,

    /// Registers read per probe
    pub request_size: u16,

    /// Wall-clock length of the run
    pub duration: Duration,
}

impl RunConfig {
    /// Create a new run configuration
    pub fn new(rate_hz: f64, request_size: u16, duration: Duration) -> Self {
        Self {
            rate_hz,
            request_size,
            duration,
        }
    }

    /// Time between two scheduled probes, saturating at `Duration::MAX`
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.rate_hz).unwrap_or(Duration::MAX)
    }

    /// Run duration in minutes, as reported
    pub fn duration_minutes(&self) -> f64 {
        self.duration.as_secs_f64() / 60.0
    }

    /// Number of ticks a perfectly punctual run would issue
    pub fn expected_probes(&self) -> u64 {
        (self.rate_hz * self.duration.as_secs_f64()).floor() as u64
    }

    /// Short label such as `10Hz x 5 registers`
    pub fn label(&self) -> String {
        format!("{}Hz x {} registers", self.rate_hz, self.request_size)
    }
}

/// Full set of runs: the cross product of rates and request sizes
#[derive(Debug, Clone, PartialEq)]
pub struct TestMatrix {
    runs: Vec<RunConfig>,
}

impl TestMatrix {
    /// Build the matrix rate-major: every size for the first rate, then the next rate
    pub fn new(rates: &[f64], sizes: &[u16], duration: Duration) -> Self {
        let runs = rates
            .iter()
            .flat_map(|&rate| sizes.iter().map(move |&size| RunConfig::new(rate, size, duration)))
            .collect();
        Self { runs }
    }

    /// Build a matrix from an explicit list of runs
    pub fn from_runs(runs: Vec<RunConfig>) -> Self {
        Self { runs }
    }

    pub fn runs(&self) -> &[RunConfig] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Lower bound on the wall-clock time the matrix takes
    pub fn total_duration(&self) -> Duration {
        self.runs
            .iter()
            .fold(Duration::ZERO, |total, r| total.saturating_add(r.duration))
    }
}

/// Result of one executed probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Wall-clock instant the probe started
    pub timestamp: DateTime<Utc>,

    /// Time spent inside the probe client call
    pub latency: Duration,

    /// Whether the read returned data
    pub success: bool,

    /// Failure description for unsuccessful probes
    pub error: Option<String>,

    /// Registers requested
    pub request_size: u16,

    /// Configured rate of the run that produced this outcome
    pub rate_hz: f64,
}

impl ProbeOutcome {
    /// Create a successful outcome
    pub fn success(timestamp: DateTime<Utc>, latency: Duration, run: &RunConfig) -> Self {
        Self {
            timestamp,
            latency,
            success: true,
            error: None,
            request_size: run.request_size,
            rate_hz: run.rate_hz,
        }
    }

    /// Create a failed outcome
    pub fn failure(timestamp: DateTime<Utc>, latency: Duration, error: String, run: &RunConfig) -> Self {
        Self {
            timestamp,
            latency,
            success: false,
            error: Some(error),
            request_size: run.request_size,
            rate_hz: run.rate_hz,
        }
    }

    /// Latency in milliseconds
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}

/// Summary of a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub rate_hz: f64,
    pub request_size: u16,
    pub duration_minutes: f64,

    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,

    /// Ratio of successful probes (0.0-1.0)
    pub success_rate: f64,

    // Latency figures cover successful probes only
    pub avg_latency_ms: f64,
    pub median_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub latency_std_dev_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,

    /// Failure bursts that reached the dropout threshold
    pub dropout_count: u64,

    /// Longest run of back-to-back failures
    pub max_consecutive_failures: u64,
}

impl RunStatistics {
    /// Zero-valued statistics for a run that produced no outcomes
    pub fn empty(run: &RunConfig) -> Self {
        Self {
            rate_hz: run.rate_hz,
            request_size: run.request_size,
            duration_minutes: run.duration_minutes(),
            total: 0,
            succeeded: 0,
            failed: 0,
            success_rate: 0.0,
            avg_latency_ms: 0.0,
            median_latency_ms: 0.0,
            min_latency_ms: 0.0,
            max_latency_ms: 0.0,
            latency_std_dev_ms: 0.0,
            p95_latency_ms: 0.0,
            p99_latency_ms: 0.0,
            dropout_count: 0,
            max_consecutive_failures: 0,
        }
    }

    /// Whether no probe was recorded
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Success rate as a percentage (0.0-100.0)
    pub fn success_percentage(&self) -> f64 {
        self.success_rate * 100.0
    }

    /// Achieved probe rate over the configured duration
    pub fn effective_rate_hz(&self) -> f64 {
        let secs = self.duration_minutes * 60.0;
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }
}
