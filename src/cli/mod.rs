//! Command-line interface module with topic help

pub mod help;

pub use help::HelpSystem;

use crate::types::{ConnectionLossPolicy, RegisterType};
use clap::Parser;
use std::path::PathBuf;

/// Modbus TCP latency tester: polls registers at fixed rates and reports latency,
/// success rate and dropouts for every rate/size combination
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "mlt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// YAML configuration file (default: ./config.yaml when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Modbus server host or IP address
    #[arg(long)]
    pub host: Option<String>,

    /// Modbus TCP port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Unit (slave) identifier
    #[arg(long)]
    pub unit_id: Option<u8>,

    /// Per-request timeout in seconds
    #[arg(short, long, value_parser = parse_seconds)]
    pub timeout: Option<f64>,

    /// First register to read (3xxxx/4xxxx numbering allowed)
    #[arg(long)]
    pub start_address: Option<u32>,

    /// Register table: input or holding
    #[arg(long, value_parser = parse_register_type)]
    pub register_type: Option<RegisterType>,

    /// Probe rates in Hz (comma-separated)
    #[arg(short, long, value_delimiter = ',', value_parser = parse_rate)]
    pub rates: Option<Vec<f64>>,

    /// Registers per read (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub sizes: Option<Vec<u16>>,

    /// Duration of every run in minutes
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Run every test for 15 seconds
    #[arg(short, long, conflicts_with = "duration")]
    pub quick: bool,

    /// Consecutive failures that count as a dropout
    #[arg(long)]
    pub dropout_threshold: Option<u32>,

    /// What to do when the connection drops: abort, skip or record
    #[arg(long, value_parser = parse_policy)]
    pub on_connection_loss: Option<ConnectionLossPolicy>,

    /// Directory for report files
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Do not write per-run statistics files
    #[arg(long)]
    pub no_summary: bool,

    /// Do not write the per-probe results file
    #[arg(long)]
    pub no_detailed: bool,

    /// Append structured logs to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Only check the connection and print a few register values
    #[arg(long)]
    pub check: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Show help for a topic (config, env, examples, results)
    #[arg(long, value_name = "TOPIC")]
    pub help_topic: Option<String>,
}

impl Cli {
    /// Cross-field checks clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(sizes) = &self.sizes {
            if sizes.is_empty() {
                return Err("--sizes needs at least one register count".to_string());
            }
        }

        if self.check && self.quick {
            return Err("--quick has no effect with --check".to_string());
        }

        Ok(())
    }

    /// Check if help should be displayed for a specific topic
    pub fn should_show_topic_help(&self) -> bool {
        self.help_topic.is_some()
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        !self.no_color && supports_color()
    }

    /// Display help for the requested topic
    pub fn display_help(&self) -> String {
        let help_system = HelpSystem::new();
        let use_colors = self.use_colors();

        match &self.help_topic {
            Some(topic) => help_system.display_topic_help(topic, use_colors).unwrap_or_else(|| {
                format!(
                    "Unknown help topic: '{}'\n\n{}",
                    topic,
                    help_system.display_topic_list(use_colors)
                )
            }),
            None => help_system.display_topic_list(use_colors),
        }
    }
}

/// Parse a timeout in seconds, fractional values allowed
fn parse_seconds(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|_| format!("Invalid timeout: {}", s))?;
    if !secs.is_finite() || secs <= 0.0 {
        Err("Timeout must be greater than 0".to_string())
    } else if secs > 300.0 {
        Err("Timeout cannot exceed 300 seconds".to_string())
    } else {
        Ok(secs)
    }
}

fn parse_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.trim().parse().map_err(|_| format!("Invalid rate: {}", s))?;
    if !rate.is_finite() || rate <= 0.0 {
        Err(format!("Rate must be greater than 0 Hz, got {}", s))
    } else {
        Ok(rate)
    }
}

fn parse_register_type(s: &str) -> Result<RegisterType, String> {
    s.parse().map_err(|e: crate::error::AppError| e.to_string())
}

fn parse_policy(s: &str) -> Result<ConnectionLossPolicy, String> {
    s.parse().map_err(|e: crate::error::AppError| e.to_string())
}

/// Check if the terminal supports color output
pub fn supports_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    cfg!(unix)
}
