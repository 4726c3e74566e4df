//! YAML configuration file with `modbus`, `registers`, `test` and `output` sections

use crate::{
    error::{AppError, Result},
    models::Config,
    types::{ConnectionLossPolicy, RegisterType},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File read when `--config` is not given and it exists
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Parsed configuration file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub modbus: ModbusSection,
    pub registers: RegisterSection,
    pub test: TestSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModbusSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub unit_id: Option<u8>,
    /// Seconds
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterSection {
    pub start_address: Option<u32>,
    #[serde(rename = "type")]
    pub register_type: Option<RegisterType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestSection {
    pub frequencies: Option<Vec<f64>>,
    pub register_counts: Option<Vec<u16>>,
    pub duration_minutes: Option<f64>,
    pub dropout_threshold: Option<u32>,
    pub on_connection_loss: Option<ConnectionLossPolicy>,
    pub poll_quantum_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub output_directory: Option<PathBuf>,
    pub save_summary_stats: Option<bool>,
    pub save_detailed_logs: Option<bool>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    /// Parse YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| AppError::config(format!("Invalid configuration file: {}", e)))
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read configuration file '{}': {}", path.display(), e))
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            AppError::Config(message) => AppError::config(format!("{} ({})", message, path.display())),
            other => other,
        })
    }

    /// Load `path` when given (it must exist), else the default file when present
    pub fn discover(path: Option<&Path>) -> Result<Option<Self>> {
        match path {
            Some(path) => Self::load(path).map(Some),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default).map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Overwrite the keys present in the file
    pub fn apply(&self, config: &mut Config) {
        let m = &self.modbus;
        if let Some(host) = &m.host {
            config.host = host.clone();
        }
        if let Some(port) = m.port {
            config.port = port;
        }
        if let Some(unit_id) = m.unit_id {
            config.unit_id = unit_id;
        }
        if let Some(timeout) = m.timeout {
            config.timeout_seconds = timeout;
        }

        let r = &self.registers;
        if let Some(start_address) = r.start_address {
            config.start_address = start_address;
        }
        if let Some(register_type) = r.register_type {
            config.register_type = register_type;
        }

        let t = &self.test;
        if let Some(rates) = &t.frequencies {
            config.rates_hz = rates.clone();
        }
        if let Some(counts) = &t.register_counts {
            config.register_counts = counts.clone();
        }
        if let Some(duration) = t.duration_minutes {
            config.duration_minutes = duration;
        }
        if let Some(threshold) = t.dropout_threshold {
            config.dropout_threshold = threshold;
        }
        if let Some(policy) = t.on_connection_loss {
            config.on_connection_loss = policy;
        }
        if let Some(quantum) = t.poll_quantum_ms {
            config.poll_quantum_ms = quantum;
        }

        let o = &self.output;
        if let Some(dir) = &o.output_directory {
            config.output_directory = dir.clone();
        }
        if let Some(save) = o.save_summary_stats {
            config.save_summary_stats = save;
        }
        if let Some(save) = o.save_detailed_logs {
            config.save_detailed_logs = save;
        }
        if let Some(log_file) = &o.log_file {
            config.log_file = Some(log_file.clone());
        }
    }
}
