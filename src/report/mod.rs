//! Report files: per-run statistics (CSV + JSON) and raw probe outcomes (CSV)

use crate::{
    error::{AppError, Result},
    models::{
        metrics::{ProbeOutcome, RunStatistics},
        Config,
    },
};
use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Format of the stamp shared by all files of one report
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const STATS_HEADER: &str = "rate_hz,request_size,duration_minutes,total,succeeded,failed,success_rate,\
avg_latency_ms,median_latency_ms,min_latency_ms,max_latency_ms,latency_std_dev_ms,p95_latency_ms,p99_latency_ms,\
dropout_count,max_consecutive_failures";

const OUTCOMES_HEADER: &str = "timestamp,latency_ms,success,error,request_size,rate_hz";

/// Writes report files into one output directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    save_summary: bool,
    save_detailed: bool,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, save_summary: bool, save_detailed: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            save_summary,
            save_detailed,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.output_directory.clone(),
            config.save_summary_stats,
            config.save_detailed_logs,
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Whether `write` would produce any file
    pub fn is_enabled(&self) -> bool {
        self.save_summary || self.save_detailed
    }

    /// Write every enabled file stamped with the current local time
    pub fn write(&self, stats: &[RunStatistics], outcomes: &[ProbeOutcome]) -> Result<Vec<PathBuf>> {
        self.write_at(stats, outcomes, Local::now())
    }

    /// Write every enabled file stamped with `at`; returns the written paths
    pub fn write_at<Tz: TimeZone>(
        &self,
        stats: &[RunStatistics],
        outcomes: &[ProbeOutcome],
        at: DateTime<Tz>,
    ) -> Result<Vec<PathBuf>>
    where
        Tz::Offset: std::fmt::Display,
    {
        let mut written = Vec::new();
        if !self.is_enabled() {
            return Ok(written);
        }

        self.ensure_output_directory()?;
        let stamp = at.format(TIMESTAMP_FORMAT).to_string();

        if self.save_summary {
            let csv_path = self.output_dir.join(format!("test_stats_{}.csv", stamp));
            write_file(&csv_path, &stats_csv(stats))?;
            written.push(csv_path);

            let json_path = self.output_dir.join(format!("test_stats_{}.json", stamp));
            let json = serde_json::to_string_pretty(stats)
                .map_err(|e| AppError::io(format!("Failed to serialize statistics: {}", e)))?;
            write_file(&json_path, &json)?;
            written.push(json_path);
        }

        if self.save_detailed {
            let path = self.output_dir.join(format!("detailed_results_{}.csv", stamp));
            write_file(&path, &outcomes_csv(outcomes))?;
            written.push(path);
        }

        Ok(written)
    }

    fn ensure_output_directory(&self) -> Result<()> {
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir).map_err(|e| {
                AppError::io(format!(
                    "Failed to create output directory '{}': {}",
                    self.output_dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| AppError::io(format!("Failed to write '{}': {}", path.display(), e)))
}

/// One header line plus one line per run
pub fn stats_csv(stats: &[RunStatistics]) -> String {
    let mut out = String::with_capacity(STATS_HEADER.len() + stats.len() * 128);
    out.push_str(STATS_HEADER);
    out.push('\n');

    for s in stats {
        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            s.rate_hz,
            s.request_size,
            s.duration_minutes,
            s.total,
            s.succeeded,
            s.failed,
            s.success_rate,
            s.avg_latency_ms,
            s.median_latency_ms,
            s.min_latency_ms,
            s.max_latency_ms,
            s.latency_std_dev_ms,
            s.p95_latency_ms,
            s.p99_latency_ms,
            s.dropout_count,
            s.max_consecutive_failures
        );
    }
    out
}

/// One header line plus one line per probe, in issue order
pub fn outcomes_csv(outcomes: &[ProbeOutcome]) -> String {
    let mut out = String::with_capacity(OUTCOMES_HEADER.len() + outcomes.len() * 64);
    out.push_str(OUTCOMES_HEADER);
    out.push('\n');

    for o in outcomes {
        let _ = writeln!(
            out,
            "{},{:.3},{},{},{},{}",
            o.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            o.latency_ms(),
            o.success,
            escape_field(o.error.as_deref().unwrap_or("")),
            o.request_size,
            o.rate_hz
        );
    }
    out
}

/// Quote a CSV field when it contains a separator, quote or line break
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
