//! Statistics and dropout detection for probe result streams

use crate::models::metrics::{ProbeOutcome, RunConfig, RunStatistics};

/// Default number of back-to-back failures that counts as a dropout
pub const DEFAULT_DROPOUT_THRESHOLD: u32 = 2;

/// Configuration for statistical calculations
#[derive(Debug, Clone)]
pub struct StatisticsConfig {
    /// Failure burst length at which a dropout is counted
    pub dropout_threshold: u32,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            dropout_threshold: DEFAULT_DROPOUT_THRESHOLD,
        }
    }
}

/// Tracks failure bursts over an ordered outcome sequence.
///
/// A dropout is the onset of a burst of consecutive failures that reaches
/// `threshold`; the rest of the same burst does not count again.
#[derive(Debug, Clone)]
pub struct DropoutTracker {
    threshold: u32,
    current_run: u64,
    in_dropout: bool,
    dropout_count: u64,
    max_consecutive_failures: u64,
}

impl DropoutTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            current_run: 0,
            in_dropout: false,
            dropout_count: 0,
            max_consecutive_failures: 0,
        }
    }

    /// Feed the next outcome in sequence order
    pub fn observe(&mut self, success: bool) {
        if success {
            self.current_run = 0;
            self.in_dropout = false;
            return;
        }

        self.current_run += 1;
        self.max_consecutive_failures = self.max_consecutive_failures.max(self.current_run);

        if self.current_run >= u64::from(self.threshold) && !self.in_dropout {
            self.dropout_count += 1;
            self.in_dropout = true;
        }
    }

    pub fn dropout_count(&self) -> u64 {
        self.dropout_count
    }

    pub fn max_consecutive_failures(&self) -> u64 {
        self.max_consecutive_failures
    }
}

/// Streaming reducer from a run's outcomes to its `RunStatistics`
#[derive(Debug, Clone)]
pub struct RunAggregator {
    run: RunConfig,
    total: u64,
    succeeded: u64,
    latencies_ms: Vec<f64>,
    dropouts: DropoutTracker,
}

impl RunAggregator {
    /// Create an aggregator for one run
    pub fn new(run: RunConfig, config: &StatisticsConfig) -> Self {
        Self {
            run,
            total: 0,
            succeeded: 0,
            latencies_ms: Vec::new(),
            dropouts: DropoutTracker::new(config.dropout_threshold),
        }
    }

    /// Record the next outcome; outcomes must arrive in issue order
    pub fn record(&mut self, outcome: &ProbeOutcome) {
        self.total += 1;
        if outcome.success {
            self.succeeded += 1;
            self.latencies_ms.push(outcome.latency_ms());
        }
        self.dropouts.observe(outcome.success);
    }

    /// Number of outcomes recorded so far
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Produce the final statistics
    pub fn finish(mut self) -> RunStatistics {
        if self.total == 0 {
            return RunStatistics::empty(&self.run);
        }

        let mut stats = RunStatistics::empty(&self.run);
        stats.total = self.total;
        stats.succeeded = self.succeeded;
        stats.failed = self.total - self.succeeded;
        stats.success_rate = self.succeeded as f64 / self.total as f64;
        stats.dropout_count = self.dropouts.dropout_count();
        stats.max_consecutive_failures = self.dropouts.max_consecutive_failures();

        if !self.latencies_ms.is_empty() {
            let mean = calculate_mean(&self.latencies_ms);
            let std_dev = calculate_standard_deviation(&self.latencies_ms, mean);

            self.latencies_ms.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let sorted = &self.latencies_ms;

            stats.avg_latency_ms = mean;
            stats.latency_std_dev_ms = std_dev;
            stats.min_latency_ms = sorted[0];
            stats.max_latency_ms = sorted[sorted.len() - 1];
            stats.median_latency_ms = calculate_percentile(sorted, 50.0);
            stats.p95_latency_ms = calculate_percentile(sorted, 95.0);
            stats.p99_latency_ms = calculate_percentile(sorted, 99.0);
        }

        stats
    }
}

/// Batch front-end over `RunAggregator`
pub struct StatisticsEngine {
    config: StatisticsConfig,
}

impl StatisticsEngine {
    /// Create a new statistics engine
    pub fn new(config: StatisticsConfig) -> Self {
        Self { config }
    }

    /// Create a statistics engine with default configuration
    pub fn with_defaults() -> Self {
        Self::new(StatisticsConfig::default())
    }

    /// Create an engine with a specific dropout threshold
    pub fn with_dropout_threshold(threshold: u32) -> Self {
        Self::new(StatisticsConfig {
            dropout_threshold: threshold,
        })
    }

    /// Start a streaming aggregation for one run
    pub fn aggregator(&self, run: RunConfig) -> RunAggregator {
        RunAggregator::new(run, &self.config)
    }

    /// Reduce a complete, ordered outcome sequence
    pub fn summarize(&self, run: &RunConfig, outcomes: &[ProbeOutcome]) -> RunStatistics {
        let mut aggregator = self.aggregator(*run);
        for outcome in outcomes {
            aggregator.record(outcome);
        }
        aggregator.finish()
    }

    pub fn dropout_threshold(&self) -> u32 {
        self.config.dropout_threshold
    }
}

/// Arithmetic mean; 0 for an empty slice
pub fn calculate_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (N-1); 0 for fewer than two values
pub fn calculate_standard_deviation(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }

    let variance = values.iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>() / (values.len() - 1) as f64;

    variance.sqrt()
}

/// Linear-interpolated percentile of an ascending slice
pub fn calculate_percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let lower_value = sorted_values[lower_index];
        let upper_value = sorted_values[upper_index];
        let weight = index - lower_index as f64;
        lower_value + weight * (upper_value - lower_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn run() -> RunConfig {
        RunConfig::new(10.0, 5, Duration::from_secs(60))
    }

    fn ok(ms: u64) -> ProbeOutcome {
        ProbeOutcome::success(Utc::now(), Duration::from_millis(ms), &run())
    }

    fn fail() -> ProbeOutcome {
        ProbeOutcome::failure(Utc::now(), Duration::from_millis(3000), "timed out".to_string(), &run())
    }

    /// Build a sequence from a pattern like "SFFSFFF"
    fn pattern(spec: &str) -> Vec<ProbeOutcome> {
        spec.chars()
            .map(|c| match c {
                'S' => ok(10),
                _ => fail(),
            })
            .collect()
    }

    #[test]
    fn test_two_bursts_count_separately() {
        let engine = StatisticsEngine::with_defaults();
        let stats = engine.summarize(&run(), &pattern("SFFSFFF"));

        assert_eq!(stats.dropout_count, 2);
        assert_eq!(stats.max_consecutive_failures, 3);
        assert_eq!(stats.total, 7);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 5);
    }

    #[test]
    fn test_isolated_failures_are_not_dropouts() {
        let engine = StatisticsEngine::with_defaults();
        let stats = engine.summarize(&run(), &pattern("FSFSF"));

        assert_eq!(stats.dropout_count, 0);
        assert_eq!(stats.max_consecutive_failures, 1);
    }

    #[test]
    fn test_single_long_burst_is_one_dropout() {
        let engine = StatisticsEngine::with_defaults();
        let stats = engine.summarize(&run(), &pattern("SSFFFFFFS"));

        assert_eq!(stats.dropout_count, 1);
        assert_eq!(stats.max_consecutive_failures, 6);
    }

    #[test]
    fn test_all_failures() {
        let engine = StatisticsEngine::with_defaults();
        let stats = engine.summarize(&run(), &pattern("FFFF"));

        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.dropout_count, 1);
        assert_eq!(stats.max_consecutive_failures, 4);
        assert_eq!(stats.avg_latency_ms, 0.0);
        assert_eq!(stats.latency_std_dev_ms, 0.0);
    }

    #[test]
    fn test_empty_sequence_returns_sentinel() {
        let engine = StatisticsEngine::with_defaults();
        let stats = engine.summarize(&run(), &[]);

        assert_eq!(stats, RunStatistics::empty(&run()));
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn test_latency_statistics() {
        let engine = StatisticsEngine::with_defaults();
        let stats = engine.summarize(&run(), &[ok(10), ok(20), ok(30)]);

        assert!((stats.avg_latency_ms - 20.0).abs() < 1e-9);
        assert!((stats.median_latency_ms - 20.0).abs() < 1e-9);
        assert!((stats.min_latency_ms - 10.0).abs() < 1e-9);
        assert!((stats.max_latency_ms - 30.0).abs() < 1e-9);
        assert!((stats.latency_std_dev_ms - 10.0).abs() < 1e-9);
        assert_eq!(stats.success_rate, 1.0);
    }

    #[test]
    fn test_latency_ignores_failures() {
        let engine = StatisticsEngine::with_defaults();
        let outcomes = vec![ok(10), fail(), ok(30), fail()];
        let stats = engine.summarize(&run(), &outcomes);

        assert!((stats.avg_latency_ms - 20.0).abs() < 1e-9);
        assert!((stats.max_latency_ms - 30.0).abs() < 1e-9);
        assert!((stats.success_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_success_has_zero_std_dev() {
        let engine = StatisticsEngine::with_defaults();
        let stats = engine.summarize(&run(), &[ok(42)]);

        assert_eq!(stats.latency_std_dev_ms, 0.0);
        assert!((stats.median_latency_ms - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_even_count_median() {
        let engine = StatisticsEngine::with_defaults();
        let stats = engine.summarize(&run(), &[ok(40), ok(10), ok(30), ok(20)]);

        assert!((stats.median_latency_ms - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_configurable_dropout_threshold() {
        let engine = StatisticsEngine::with_dropout_threshold(3);
        let stats = engine.summarize(&run(), &pattern("SFFSFFF"));

        assert_eq!(stats.dropout_count, 1);
        assert_eq!(stats.max_consecutive_failures, 3);

        let engine = StatisticsEngine::with_dropout_threshold(1);
        let stats = engine.summarize(&run(), &pattern("FSFSF"));
        assert_eq!(stats.dropout_count, 3);
    }

    #[test]
    fn test_streaming_matches_batch() {
        let engine = StatisticsEngine::with_defaults();
        let outcomes = pattern("SFSSFFSFFFS");

        let mut aggregator = engine.aggregator(run());
        for outcome in &outcomes {
            aggregator.record(outcome);
        }
        assert_eq!(aggregator.total(), outcomes.len() as u64);

        assert_eq!(aggregator.finish(), engine.summarize(&run(), &outcomes));
    }

    #[test]
    fn test_percentile_calculation() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];

        assert_eq!(calculate_percentile(&values, 50.0), 5.5);
        assert!((calculate_percentile(&values, 90.0) - 9.1).abs() < 1e-9);
        assert_eq!(calculate_percentile(&values, 100.0), 10.0);
        assert_eq!(calculate_percentile(&[], 50.0), 0.0);
    }
}
