//! Data models and structures for the Modbus latency tester

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::Config;
pub use metrics::{ProbeOutcome, RunConfig, RunStatistics, TestMatrix};
