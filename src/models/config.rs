//! Configuration data model and validation

use crate::models::metrics::TestMatrix;
use crate::types::{AppError, ConnectionLossPolicy, RegisterType, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Largest register count a single Modbus read may request
pub const MAX_REGISTERS_PER_READ: u16 = 125;

/// Highest probe rate accepted by validation
pub const MAX_RATE_HZ: f64 = 1000.0;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Modbus server host name or IP address
    #[serde(default = "default_host")]
    pub host: String,

    /// Modbus server TCP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Unit (slave) identifier sent with every request
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: f64,

    /// Logical start register (3xxxx / 4xxxx numbering accepted)
    #[serde(default = "default_start_address")]
    pub start_address: u32,

    /// Register table to read
    #[serde(default)]
    pub register_type: RegisterType,

    /// Probe rates to test, in Hz
    #[serde(default = "default_rates")]
    pub rates_hz: Vec<f64>,

    /// Register counts to test
    #[serde(default = "default_register_counts")]
    pub register_counts: Vec<u16>,

    /// Duration of every run, in minutes
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: f64,

    /// Consecutive failures that make a dropout
    #[serde(default = "default_dropout_threshold")]
    pub dropout_threshold: u32,

    /// Behaviour when the connection drops mid-run
    #[serde(default)]
    pub on_connection_loss: ConnectionLossPolicy,

    /// Longest idle slice of the scheduler, in milliseconds
    #[serde(default = "default_poll_quantum_ms")]
    pub poll_quantum_ms: u64,

    /// Directory receiving report files
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// Write per-run statistics (CSV + JSON)
    #[serde(default = "default_true")]
    pub save_summary_stats: bool,

    /// Write every probe outcome (CSV)
    #[serde(default = "default_true")]
    pub save_detailed_logs: bool,

    /// Optional file that log entries are appended to
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            unit_id: default_unit_id(),
            timeout_seconds: default_timeout_secs(),
            start_address: default_start_address(),
            register_type: RegisterType::default(),
            rates_hz: default_rates(),
            register_counts: default_register_counts(),
            duration_minutes: default_duration_minutes(),
            dropout_threshold: default_dropout_threshold(),
            on_connection_loss: ConnectionLossPolicy::default(),
            poll_quantum_ms: default_poll_quantum_ms(),
            output_directory: default_output_directory(),
            save_summary_stats: true,
            save_detailed_logs: true,
            log_file: None,
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// `host:port` of the Modbus server
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    /// Get run duration as Duration, saturating at `Duration::MAX`
    pub fn run_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_minutes * 60.0).unwrap_or(Duration::MAX)
    }

    /// Get scheduler polling quantum as Duration
    pub fn poll_quantum(&self) -> Duration {
        Duration::from_millis(self.poll_quantum_ms)
    }

    /// Zero-based protocol address of the start register
    pub fn protocol_address(&self) -> Result<u16> {
        self.register_type.to_protocol_address(self.start_address)
    }

    /// Build the rate x size test matrix
    pub fn test_matrix(&self) -> TestMatrix {
        TestMatrix::new(&self.rates_hz, &self.register_counts, self.run_duration())
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(AppError::config("Modbus host cannot be empty"));
        }

        if self.port == 0 {
            return Err(AppError::config("Modbus port must be greater than 0"));
        }

        if !self.timeout_seconds.is_finite() || self.timeout_seconds <= 0.0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.timeout_seconds > 300.0 {
            return Err(AppError::config("Timeout cannot exceed 300 seconds"));
        }

        if self.rates_hz.is_empty() {
            return Err(AppError::config("At least one test rate must be configured"));
        }

        for &rate in &self.rates_hz {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(AppError::config(format!("Test rate must be greater than 0 Hz, got {}", rate)));
            }
            if rate > MAX_RATE_HZ {
                return Err(AppError::config(format!("Test rate cannot exceed {} Hz, got {}", MAX_RATE_HZ, rate)));
            }
            if Duration::try_from_secs_f64(1.0 / rate).is_err() {
                return Err(AppError::config(format!(
                    "Test rate {} Hz is too low, its probe interval cannot be represented",
                    rate
                )));
            }
        }

        if self.register_counts.is_empty() {
            return Err(AppError::config("At least one register count must be configured"));
        }

        for &count in &self.register_counts {
            if count == 0 || count > MAX_REGISTERS_PER_READ {
                return Err(AppError::config(format!(
                    "Register count must be between 1 and {}, got {}",
                    MAX_REGISTERS_PER_READ, count
                )));
            }
        }

        if !self.duration_minutes.is_finite() || self.duration_minutes <= 0.0 {
            return Err(AppError::config("Test duration must be greater than 0 minutes"));
        }

        if Duration::try_from_secs_f64(self.duration_minutes * 60.0).is_err() {
            return Err(AppError::config(format!(
                "Test duration of {} minutes is too long to be represented",
                self.duration_minutes
            )));
        }

        if self.dropout_threshold == 0 {
            return Err(AppError::config("Dropout threshold must be at least 1"));
        }

        if self.poll_quantum_ms == 0 || self.poll_quantum_ms > 1000 {
            return Err(AppError::config("Poll quantum must be between 1 and 1000 ms"));
        }

        let address = self.protocol_address()?;
        let largest = self.register_counts.iter().copied().max().unwrap_or(1);
        if u32::from(address) + u32::from(largest) - 1 > u32::from(u16::MAX) {
            return Err(AppError::config(format!(
                "Reading {} registers from address {} runs past the end of the register space",
                largest, address
            )));
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_host() -> String {
    crate::defaults::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    crate::defaults::DEFAULT_PORT
}

fn default_unit_id() -> u8 {
    crate::defaults::DEFAULT_UNIT_ID
}

fn default_timeout_secs() -> f64 {
    crate::defaults::DEFAULT_TIMEOUT.as_secs_f64()
}

fn default_start_address() -> u32 {
    crate::defaults::DEFAULT_START_ADDRESS
}

fn default_rates() -> Vec<f64> {
    crate::defaults::DEFAULT_RATES_HZ.to_vec()
}

fn default_register_counts() -> Vec<u16> {
    crate::defaults::DEFAULT_REGISTER_COUNTS.to_vec()
}

fn default_duration_minutes() -> f64 {
    crate::defaults::DEFAULT_DURATION_MINUTES
}

fn default_dropout_threshold() -> u32 {
    crate::defaults::DEFAULT_DROPOUT_THRESHOLD
}

fn default_poll_quantum_ms() -> u64 {
    crate::defaults::DEFAULT_POLL_QUANTUM.as_millis() as u64
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(crate::defaults::DEFAULT_OUTPUT_DIRECTORY)
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_host_invalid() {
        let mut config = Config::default();
        config.host = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rates_must_be_positive() {
        let mut config = Config::default();
        config.rates_hz = vec![10.0, 0.0];
        assert!(config.validate().is_err());

        config.rates_hz = vec![f64::NAN];
        assert!(config.validate().is_err());

        config.rates_hz = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_register_count_bounds() {
        let mut config = Config::default();
        config.register_counts = vec![0];
        assert!(config.validate().is_err());

        config.register_counts = vec![126];
        assert!(config.validate().is_err());

        config.register_counts = vec![125];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_duration_invalid() {
        let mut config = Config::default();
        config.duration_minutes = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unrepresentable_rate_invalid() {
        let mut config = Config::default();
        config.rates_hz = vec![1e-25];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("too low"), "{}", err);

        // Building the matrix still must not panic
        let matrix = config.test_matrix();
        assert_eq!(matrix.runs()[0].interval(), Duration::MAX);
    }

    #[test]
    fn test_unrepresentable_duration_invalid() {
        let mut config = Config::default();
        config.duration_minutes = 1e300;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("too long"), "{}", err);

        assert_eq!(config.run_duration(), Duration::MAX);
        assert_eq!(config.test_matrix().total_duration(), Duration::MAX);
    }

    #[test]
    fn test_very_slow_rate_still_valid() {
        let mut config = Config::default();
        config.rates_hz = vec![0.001];
        assert!(config.validate().is_ok());
        assert_eq!(config.test_matrix().runs()[0].interval(), Duration::from_secs(1000));
    }

    #[test]
    fn test_zero_dropout_threshold_invalid() {
        let mut config = Config::default();
        config.dropout_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_address_overflow_invalid() {
        let mut config = Config::default();
        config.register_type = RegisterType::Holding;
        config.start_address = 40001 + 65_500;
        config.register_counts = vec![100];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_values() {
        let mut config = Config::default();
        config.duration_minutes = 0.5;
        config.timeout_seconds = 1.5;
        config.start_address = 30005;
        config.rates_hz = vec![1.0, 2.0];
        config.register_counts = vec![1, 10, 20];

        assert_eq!(config.run_duration(), Duration::from_secs(30));
        assert_eq!(config.timeout(), Duration::from_millis(1500));
        assert_eq!(config.protocol_address().unwrap(), 4);
        assert_eq!(config.test_matrix().len(), 6);
        assert_eq!(config.endpoint(), "127.0.0.1:502");
    }
}
