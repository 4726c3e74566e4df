//! Modbus Latency Tester
//!
//! Measures Modbus TCP request latency by polling a block of registers at
//! fixed rates over one persistent connection. Every combination of rate
//! and register count is run for a fixed duration and summarised as
//! success rate, latency statistics and dropout counts.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod report;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use client::{ModbusTcpClient, ProbeError, RegisterClient, RegisterTarget};
pub use diagnostics::{ConnectionDiagnostics, DiagnosticReport};
pub use error::{AppError, Result};
pub use executor::{MatrixExecutor, MatrixResults, MatrixTermination, PollScheduler};
pub use models::{Config, ProbeOutcome, RunConfig, RunStatistics, TestMatrix};
pub use output::{ColoredFormatter, OutputCoordinator, OutputFormatter, OutputFormatterFactory, PlainFormatter};
pub use report::ReportWriter;
pub use stats::StatisticsEngine;
pub use types::{ConnectionLossPolicy, RegisterType};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_HOST: &str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 502;
    pub const DEFAULT_UNIT_ID: u8 = 1;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
    pub const DEFAULT_START_ADDRESS: u32 = 30001;
    pub const DEFAULT_RATES_HZ: &[f64] = &[1.0, 5.0, 10.0];
    pub const DEFAULT_REGISTER_COUNTS: &[u16] = &[1, 10];
    pub const DEFAULT_DURATION_MINUTES: f64 = 1.0;
    /// Run length used by `--quick` (15 seconds)
    pub const DEFAULT_QUICK_DURATION_MINUTES: f64 = 0.25;
    pub const DEFAULT_DROPOUT_THRESHOLD: u32 = crate::stats::DEFAULT_DROPOUT_THRESHOLD;
    pub const DEFAULT_POLL_QUANTUM: Duration = crate::executor::DEFAULT_POLL_QUANTUM;
    pub const DEFAULT_OUTPUT_DIRECTORY: &str = "results";
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
