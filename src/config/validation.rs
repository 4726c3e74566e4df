//! Configuration validation utilities and rules

use crate::{error::Result, models::Config};

/// Runs shorter than this many probes give shaky statistics
const MIN_RELIABLE_PROBES: u64 = 10;

/// Rates above this are flagged as demanding for most devices
const HIGH_RATE_HZ: f64 = 100.0;

/// Configuration validator with advanced validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Hard checks of `Config::validate`, then advisory warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_rates(config));
        warnings.extend(Self::validate_timing(config));
        warnings.extend(Self::validate_matrix_size(config));
        warnings.extend(Self::validate_target(config));

        Ok(warnings)
    }

    /// Rates the device or the timeout may not sustain
    fn validate_rates(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let timeout_ms = config.timeout_seconds * 1000.0;

        for &rate in &config.rates_hz {
            let interval_ms = 1000.0 / rate;
            if interval_ms < timeout_ms {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "At {} Hz the probe interval ({:.1} ms) is shorter than the {} s timeout; \
                         a stalled server will lower the achieved rate",
                        rate, interval_ms, config.timeout_seconds
                    ),
                ));
            }

            if rate > HIGH_RATE_HZ {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Rate of {} Hz is high for most Modbus devices", rate),
                ));
            }
        }

        warnings
    }

    fn validate_timing(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.timeout_seconds < 0.1 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Timeout of {} s may count slow but valid responses as failures",
                    config.timeout_seconds
                ),
            ));
        } else if config.timeout_seconds > 30.0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Long timeout of {} s will slow down failure detection", config.timeout_seconds),
            ));
        }

        let matrix = config.test_matrix();
        if let Some(smallest) = matrix.runs().iter().map(|r| r.expected_probes()).min() {
            if smallest < MIN_RELIABLE_PROBES {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Some runs issue only {} probe(s); statistics may not be reliable (recommended: >= {})",
                        smallest, MIN_RELIABLE_PROBES
                    ),
                ));
            }
        }

        warnings
    }

    fn validate_matrix_size(config: &Config) -> Vec<ValidationWarning> {
        let matrix = config.test_matrix();
        let total_minutes = matrix.total_duration().as_secs_f64() / 60.0;

        if total_minutes > 60.0 {
            vec![ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Test matrix of {} runs will take about {:.0} minutes",
                    matrix.len(),
                    total_minutes
                ),
            )]
        } else if total_minutes > 10.0 {
            vec![ValidationWarning::new(
                ValidationLevel::Info,
                format!("Test matrix of {} runs will take about {:.1} minutes", matrix.len(), total_minutes),
            )]
        } else {
            Vec::new()
        }
    }

    fn validate_target(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.port != 502 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Using non-standard Modbus TCP port {}", config.port),
            ));
        }

        if config.unit_id == 0 || config.unit_id == 255 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Unit ID {} is usually reserved; gateways may not route it",
                    config.unit_id
                ),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self) -> String {
        format!("[{}] {}", self.level.as_str(), self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
