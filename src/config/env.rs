//! Environment variable handling and .env file management

use crate::{
    error::{AppError, Result},
    models::Config,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists; variables already set are kept
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

            if debug {
                eprintln!("Loaded configuration from .env file");
            }
        } else if debug {
            eprintln!("No .env file found, using configuration file, defaults and CLI arguments");
        }

        Ok(())
    }

    /// Merge the process environment into `config`
    pub fn apply_env(config: &mut Config) -> Result<()> {
        Self::apply_vars(config, |key| std::env::var(key).ok())
    }

    /// Merge variables served by `lookup` into `config`
    pub fn apply_vars<F>(config: &mut Config, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MODBUS_HOST") {
            config.host = host.trim().to_string();
        }
        set_parsed(&lookup, "MODBUS_PORT", &mut config.port)?;
        set_parsed(&lookup, "MODBUS_UNIT_ID", &mut config.unit_id)?;
        set_parsed(&lookup, "MODBUS_TIMEOUT_SECONDS", &mut config.timeout_seconds)?;

        set_parsed(&lookup, "REGISTER_START_ADDRESS", &mut config.start_address)?;
        set_parsed(&lookup, "REGISTER_TYPE", &mut config.register_type)?;

        if let Some(rates) = lookup("TEST_RATES_HZ") {
            config.rates_hz = parse_list("TEST_RATES_HZ", &rates)?;
        }
        if let Some(counts) = lookup("TEST_REGISTER_COUNTS") {
            config.register_counts = parse_list("TEST_REGISTER_COUNTS", &counts)?;
        }
        set_parsed(&lookup, "TEST_DURATION_MINUTES", &mut config.duration_minutes)?;
        set_parsed(&lookup, "DROPOUT_THRESHOLD", &mut config.dropout_threshold)?;
        set_parsed(&lookup, "ON_CONNECTION_LOSS", &mut config.on_connection_loss)?;
        set_parsed(&lookup, "POLL_QUANTUM_MS", &mut config.poll_quantum_ms)?;

        if let Some(dir) = lookup("OUTPUT_DIRECTORY") {
            config.output_directory = PathBuf::from(dir.trim());
        }
        set_parsed(&lookup, "SAVE_SUMMARY_STATS", &mut config.save_summary_stats)?;
        set_parsed(&lookup, "SAVE_DETAILED_LOGS", &mut config.save_detailed_logs)?;
        if let Some(log_file) = lookup("LOG_FILE") {
            let log_file = log_file.trim();
            config.log_file = (!log_file.is_empty()).then(|| PathBuf::from(log_file));
        }
        set_parsed(&lookup, "ENABLE_COLOR", &mut config.enable_color)?;

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("MODBUS_HOST", "Modbus server host or IP", "192.168.1.100"),
            ("MODBUS_PORT", "Modbus TCP port", "502"),
            ("MODBUS_UNIT_ID", "Unit (slave) identifier", "1"),
            ("MODBUS_TIMEOUT_SECONDS", "Per-request timeout in seconds", "3.0"),
            ("REGISTER_START_ADDRESS", "First register (3xxxx/4xxxx numbering allowed)", "30001"),
            ("REGISTER_TYPE", "Register table: input or holding", "input"),
            ("TEST_RATES_HZ", "Comma-separated probe rates in Hz", "1,5,10"),
            ("TEST_REGISTER_COUNTS", "Comma-separated register counts", "1,10"),
            ("TEST_DURATION_MINUTES", "Duration of every run in minutes", "1.0"),
            ("DROPOUT_THRESHOLD", "Consecutive failures counted as a dropout", "2"),
            ("ON_CONNECTION_LOSS", "abort, skip or record", "abort"),
            ("POLL_QUANTUM_MS", "Longest scheduler idle slice in ms", "10"),
            ("OUTPUT_DIRECTORY", "Directory for report files", "results"),
            ("SAVE_SUMMARY_STATS", "Write per-run statistics files", "true"),
            ("SAVE_DETAILED_LOGS", "Write every probe outcome", "true"),
            ("LOG_FILE", "Append structured logs to this file", "mlt.log"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<24} {}\n", var, description));
            help.push_str(&format!("  {:<24} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables (including .env)\n");
        help.push_str("  3. Configuration file (config.yaml)\n");
        help.push_str("  4. Default values\n");

        help
    }
}

fn set_parsed<T, F>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, raw, e)))?;
    }
    Ok(())
}

/// Parse a comma-separated list, ignoring empty entries
pub fn parse_list<T>(key: &str, raw: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|e| AppError::config(format!("Invalid {} entry '{}': {}", key, s, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConnectionLossPolicy, RegisterType};
    use std::collections::HashMap;

    fn apply(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let mut config = Config::default();
        EnvManager::apply_vars(&mut config, |key| vars.get(key).cloned())?;
        Ok(config)
    }

    #[test]
    fn test_no_vars_keeps_defaults() {
        let config = apply(&[]).unwrap();
        assert_eq!(config.host, crate::defaults::DEFAULT_HOST);
        assert_eq!(config.rates_hz, crate::defaults::DEFAULT_RATES_HZ.to_vec());
    }

    #[test]
    fn test_all_vars_applied() {
        let config = apply(&[
            ("MODBUS_HOST", " plc.local "),
            ("MODBUS_PORT", "1502"),
            ("MODBUS_UNIT_ID", "9"),
            ("MODBUS_TIMEOUT_SECONDS", "0.75"),
            ("REGISTER_START_ADDRESS", "40001"),
            ("REGISTER_TYPE", "holding"),
            ("TEST_RATES_HZ", "2, 4,,8"),
            ("TEST_REGISTER_COUNTS", "5,125"),
            ("TEST_DURATION_MINUTES", "2"),
            ("DROPOUT_THRESHOLD", "3"),
            ("ON_CONNECTION_LOSS", "record"),
            ("POLL_QUANTUM_MS", "5"),
            ("OUTPUT_DIRECTORY", "/tmp/mlt"),
            ("SAVE_SUMMARY_STATS", "false"),
            ("SAVE_DETAILED_LOGS", "false"),
            ("LOG_FILE", "mlt.log"),
            ("ENABLE_COLOR", "false"),
        ])
        .unwrap();

        assert_eq!(config.host, "plc.local");
        assert_eq!(config.port, 1502);
        assert_eq!(config.unit_id, 9);
        assert_eq!(config.timeout_seconds, 0.75);
        assert_eq!(config.start_address, 40001);
        assert_eq!(config.register_type, RegisterType::Holding);
        assert_eq!(config.rates_hz, vec![2.0, 4.0, 8.0]);
        assert_eq!(config.register_counts, vec![5, 125]);
        assert_eq!(config.duration_minutes, 2.0);
        assert_eq!(config.dropout_threshold, 3);
        assert_eq!(config.on_connection_loss, ConnectionLossPolicy::Record);
        assert_eq!(config.poll_quantum_ms, 5);
        assert_eq!(config.output_directory, PathBuf::from("/tmp/mlt"));
        assert!(!config.save_summary_stats);
        assert!(!config.save_detailed_logs);
        assert_eq!(config.log_file, Some(PathBuf::from("mlt.log")));
        assert!(!config.enable_color);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = apply(&[("MODBUS_PORT", "http")]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("MODBUS_PORT"));

        let err = apply(&[("TEST_RATES_HZ", "1,fast")]).unwrap_err();
        assert!(err.to_string().contains("'fast'"));

        assert!(apply(&[("REGISTER_TYPE", "coil")]).is_err());
        assert!(apply(&[("ENABLE_COLOR", "maybe")]).is_err());
    }

    #[test]
    fn test_empty_log_file_clears_it() {
        let config = apply(&[("LOG_FILE", "  ")]).unwrap();
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list::<u16>("X", "1, 2 ,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_list::<u16>("X", "").unwrap().is_empty());
        assert!(parse_list::<u16>("X", "1,-2").is_err());
    }

    #[test]
    fn test_display_env_help() {
        let help = EnvManager::display_env_help();
        assert!(help.contains("Supported Environment Variables:"));
        assert!(help.contains("MODBUS_HOST"));
        assert!(help.contains("Configuration Priority"));
        assert_eq!(EnvManager::get_supported_env_vars().len(), 17);
    }
}
