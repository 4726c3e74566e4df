//! Colored formatter implementation with terminal color support
//!
//! Uses ANSI colors and a few Unicode symbols; layout matches the plain
//! formatter so both can be compared line by line.

use super::formatter::{
    format_first_values, format_latency, format_percentage, render_table, results_rows, results_table_format,
    termination_label, FormattingOptions, OutputFormatter, PlainFormatter, DROPOUT_COLUMN,
    ECHOED_OUTCOMES, SUCCESS_COLUMN,
};
use crate::{
    diagnostics::DiagnosticReport,
    error::{AppError, Result},
    executor::RunTermination,
    models::{
        metrics::{ProbeOutcome, RunConfig, RunStatistics, TestMatrix},
        Config,
    },
};
use colored::*;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Latency classification for color coding, tuned for fieldbus round trips
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencyLevel {
    Excellent,  // < 10ms
    Good,       // 10-50ms
    Fair,       // 50-200ms
    Poor,       // 200-1000ms
    VeryPoor,   // > 1000ms
}

impl LatencyLevel {
    pub fn from_latency(latency_ms: f64) -> Self {
        if latency_ms < 10.0 {
            Self::Excellent
        } else if latency_ms < 50.0 {
            Self::Good
        } else if latency_ms < 200.0 {
            Self::Fair
        } else if latency_ms < 1000.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }
}

/// Status color for a success percentage
pub fn success_color(percentage: f64) -> Color {
    if percentage >= 99.0 {
        Color::Green
    } else if percentage >= 95.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
            border: Color::BrightBlack,
        }
    }
}

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::internal(format!("Failed to format output: {}", e))
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn format_latency_colored(&self, latency_ms: f64) -> ColoredString {
        self.colorize(&format_latency(latency_ms), LatencyLevel::from_latency(latency_ms).color())
    }

    fn format_percentage_colored(&self, percentage: f64) -> ColoredString {
        self.colorize(&format_percentage(percentage), success_color(percentage))
    }

    /// Create a colored section header
    fn create_section_header(&self, title: &str, icon: &str) -> String {
        format!("{} {}", icon, self.bold(title).color(self.color_scheme.header))
    }

    /// Whether colors are supported on stdout
    pub fn supports_color() -> bool {
        std::env::var("NO_COLOR").is_err() && std::env::var("TERM").map(|t| t != "dumb").unwrap_or(true)
    }

    pub fn set_colors_enabled(&mut self, enabled: bool) {
        self.options.enable_color = enabled;
        colored::control::set_override(enabled);
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "═".repeat(title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(fmt_err)?;
        writeln!(output, "  {}  ", self.bold(title).color(self.color_scheme.header)).map_err(fmt_err)?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_test_plan(&self, config: &Config, matrix: &TestMatrix) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "{}", self.create_section_header("Test Plan", "📋")).map_err(fmt_err)?;
        writeln!(
            output,
            "🎯 Target:    {} (unit {})",
            self.colorize(&config.endpoint(), self.color_scheme.info),
            config.unit_id
        )
        .map_err(fmt_err)?;
        writeln!(
            output,
            "📍 Registers: {} from {}",
            config.register_type.display_name(),
            config.start_address
        )
        .map_err(fmt_err)?;
        writeln!(output, "⏱️  Rates:     {:?} Hz", config.rates_hz).map_err(fmt_err)?;
        writeln!(output, "📦 Sizes:     {:?} registers", config.register_counts).map_err(fmt_err)?;
        write!(
            output,
            "🧪 Runs:      {} x {} min (about {:.1} min total)",
            self.colorize(&matrix.len().to_string(), self.color_scheme.info),
            config.duration_minutes,
            matrix.total_duration().as_secs_f64() / 60.0
        )
        .map_err(fmt_err)?;

        Ok(output)
    }

    fn format_run_header(&self, index: usize, total: usize, run: &RunConfig) -> Result<String> {
        let mut output = String::new();
        let border = "═".repeat(60);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(fmt_err)?;
        writeln!(
            output,
            "🧪 Test {}/{}: {}",
            index + 1,
            total,
            self.bold(&format!("{}Hz, {} registers", run.rate_hz, run.request_size))
        )
        .map_err(fmt_err)?;
        writeln!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(fmt_err)?;
        write!(output, "⏱️  Running for {} minute(s) at {}Hz...", run.duration_minutes(), run.rate_hz)
            .map_err(fmt_err)?;

        Ok(output)
    }

    fn format_outcome(&self, sequence: usize, outcome: &ProbeOutcome) -> Result<String> {
        let line = if outcome.success {
            format!("   ✅ Request {}: {}", sequence + 1, self.format_latency_colored(outcome.latency_ms()))
        } else {
            format!(
                "   ❌ Request {}: {}",
                sequence + 1,
                self.colorize(
                    &format!("FAILED - {}", outcome.error.as_deref().unwrap_or("unknown error")),
                    self.color_scheme.error
                )
            )
        };

        if sequence + 1 == ECHOED_OUTCOMES {
            Ok(format!(
                "{}\n   {}",
                line,
                self.colorize("... (continuing silently, will show summary)", self.color_scheme.muted)
            ))
        } else {
            Ok(line)
        }
    }

    fn format_run_summary(&self, stats: &RunStatistics, termination: &RunTermination) -> Result<String> {
        let mut output = String::new();

        writeln!(
            output,
            "📊 Completed: {}/{} successful ({})",
            stats.succeeded,
            stats.total,
            self.format_percentage_colored(stats.success_percentage())
        )
        .map_err(fmt_err)?;
        writeln!(output, "   Avg latency: {}", self.format_latency_colored(stats.avg_latency_ms)).map_err(fmt_err)?;

        let dropouts = stats.dropout_count.to_string();
        let dropouts = if stats.dropout_count > 0 {
            self.colorize(&dropouts, self.color_scheme.error)
        } else {
            self.colorize(&dropouts, self.color_scheme.success)
        };
        write!(output, "   Dropouts: {}", dropouts).map_err(fmt_err)?;

        if self.options.verbose_mode {
            write!(
                output,
                "\n   Median/P95/Max: {}/{}/{}\n   Max consecutive failures: {}",
                self.format_latency_colored(stats.median_latency_ms),
                self.format_latency_colored(stats.p95_latency_ms),
                self.format_latency_colored(stats.max_latency_ms),
                stats.max_consecutive_failures
            )
            .map_err(fmt_err)?;
        }

        if *termination != RunTermination::Completed {
            write!(
                output,
                "\n   ⚠️  {}",
                self.colorize(
                    &format!("Run ended early ({})", termination_label(termination)),
                    self.color_scheme.warning
                )
            )
            .map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_results_table(&self, stats: &[RunStatistics]) -> Result<String> {
        if stats.is_empty() {
            return Ok(self.colorize("No runs completed.", self.color_scheme.muted).to_string());
        }

        let mut output = self.format_header("MODBUS TCP PERFORMANCE TEST SUMMARY")?;
        output.push('\n');

        // Colors are applied after padding so column widths stay correct
        let style = |row: usize, col: usize, text: String| -> String {
            let run = &stats[row];
            match col {
                SUCCESS_COLUMN => self.colorize(&text, success_color(run.success_percentage())).to_string(),
                DROPOUT_COLUMN if run.dropout_count > 0 => self.colorize(&text, self.color_scheme.error).to_string(),
                _ => text,
            }
        };

        output.push_str(&render_table(
            &results_table_format(self.options.table_borders),
            &results_rows(stats),
            &style,
        ));
        Ok(output)
    }

    fn format_diagnostics(&self, report: &DiagnosticReport) -> Result<String> {
        if !self.options.enable_color {
            return self.plain_formatter.format_diagnostics(report);
        }

        let mut output = String::new();
        writeln!(output, "🔍 Connection check for {}", self.bold(&report.endpoint)).map_err(fmt_err)?;

        if let Some(err) = &report.connect_error {
            write!(output, "❌ {}", self.colorize(&format!("Connection failed: {}", err), self.color_scheme.error))
                .map_err(fmt_err)?;
            return Ok(output);
        }

        writeln!(output, "✅ Connected in {}", self.format_latency_colored(report.connect_latency_ms)).map_err(fmt_err)?;
        writeln!(
            output,
            "📍 Testing {} registers starting at {} (Modbus address {})",
            report.register_type.display_name(),
            report.logical_address,
            report.protocol_address
        )
        .map_err(fmt_err)?;

        for check in &report.reads {
            match &check.error {
                None => {
                    writeln!(
                        output,
                        "✅ Reading {} registers: {}{}",
                        check.count,
                        self.format_latency_colored(check.latency_ms),
                        format_first_values(&check.first_values)
                    )
                    .map_err(fmt_err)?;
                }
                Some(err) => {
                    writeln!(
                        output,
                        "⚠️  Reading {} registers failed: {}",
                        check.count,
                        self.colorize(err, self.color_scheme.warning)
                    )
                    .map_err(fmt_err)?;
                }
            }
        }

        write!(output, "   Unit ID: {}", report.unit_id).map_err(fmt_err)?;
        Ok(output)
    }

    fn format_saved_files(&self, files: &[PathBuf]) -> Result<String> {
        let mut output = self.create_section_header("Saved", "💾");
        for file in files {
            write!(output, "\n   {}", self.colorize(&file.display().to_string(), self.color_scheme.muted))
                .map_err(fmt_err)?;
        }
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("❌ {}", self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("⚠️  {}", self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("✅ {}", self.colorize(message, self.color_scheme.success)))
    }
}
