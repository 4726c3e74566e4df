//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    diagnostics::DiagnosticReport,
    error::{AppError, Result},
    executor::RunTermination,
    models::{
        metrics::{ProbeOutcome, RunConfig, RunStatistics, TestMatrix},
        Config,
    },
};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Describe the target and the matrix about to run
    fn format_test_plan(&self, config: &Config, matrix: &TestMatrix) -> Result<String>;

    /// Banner shown before each run
    fn format_run_header(&self, index: usize, total: usize, run: &RunConfig) -> Result<String>;

    /// One early probe outcome of a run (zero-based sequence)
    fn format_outcome(&self, sequence: usize, outcome: &ProbeOutcome) -> Result<String>;

    /// Short summary printed when a run ends
    fn format_run_summary(&self, stats: &RunStatistics, termination: &RunTermination) -> Result<String>;

    /// Final table across every run
    fn format_results_table(&self, stats: &[RunStatistics]) -> Result<String>;

    /// Connection check report
    fn format_diagnostics(&self, report: &DiagnosticReport) -> Result<String>;

    /// List of report files written
    fn format_saved_files(&self, files: &[PathBuf]) -> Result<String>;

    fn format_error(&self, error: &str) -> Result<String>;

    fn format_warning(&self, warning: &str) -> Result<String>;

    fn format_success(&self, message: &str) -> Result<String>;
}

/// Number of outcomes echoed per run before going quiet
pub const ECHOED_OUTCOMES: usize = 5;

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Enable verbose mode with detailed information
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Show borders around table
    pub show_borders: bool,
    /// Show header row
    pub show_header: bool,
    /// Minimum width for columns without a definition
    pub min_column_width: usize,
    /// Maximum width for columns without a definition
    pub max_column_width: usize,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width: 4,
            max_width: 40,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Table layout for the final results across runs
pub fn results_table_format(show_borders: bool) -> TableFormat {
    TableFormat {
        columns: vec![
            Column::new("Freq (Hz)", Alignment::Right),
            Column::new("Registers", Alignment::Right),
            Column::new("Success %", Alignment::Right),
            Column::new("Avg Lat (ms)", Alignment::Right),
            Column::new("Med Lat (ms)", Alignment::Right),
            Column::new("Max Lat (ms)", Alignment::Right),
            Column::new("Dropouts", Alignment::Right),
            Column::new("Max Fails", Alignment::Right),
        ],
        show_borders,
        show_header: true,
        min_column_width: 4,
        max_column_width: 40,
    }
}

/// Column indices of `results_table_format` that carry status colors
pub const SUCCESS_COLUMN: usize = 2;
pub const DROPOUT_COLUMN: usize = 6;

/// One results row per run, in the column order of `results_table_format`
pub fn results_rows(stats: &[RunStatistics]) -> Vec<RowData> {
    stats
        .iter()
        .map(|s| {
            vec![
                format!("{:.1}", s.rate_hz),
                s.request_size.to_string(),
                format_percentage(s.success_percentage()),
                format!("{:.2}", s.avg_latency_ms),
                format!("{:.2}", s.median_latency_ms),
                format!("{:.2}", s.max_latency_ms),
                s.dropout_count.to_string(),
                s.max_consecutive_failures.to_string(),
            ]
        })
        .collect()
}

/// Render a table; `style` decorates each padded data cell as (row, column, text)
pub fn render_table(
    format: &TableFormat,
    rows: &[RowData],
    style: &dyn Fn(usize, usize, String) -> String,
) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let column_widths = calculate_column_widths(format, rows);
    let mut output = String::new();

    if format.show_header && !format.columns.is_empty() {
        if format.show_borders {
            output.push_str(&create_horizontal_border(&column_widths));
            output.push('\n');
        }

        let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
        output.push_str(&create_row(&headers, &column_widths, format, &|_, text| text));
        output.push('\n');

        if format.show_borders {
            output.push_str(&create_horizontal_border(&column_widths));
            output.push('\n');
        }
    }

    for (row_idx, row) in rows.iter().enumerate() {
        output.push_str(&create_row(row, &column_widths, format, &|col_idx, text| {
            style(row_idx, col_idx, text)
        }));
        output.push('\n');
    }

    if format.show_borders {
        output.push_str(&create_horizontal_border(&column_widths));
    }

    output
}

fn calculate_column_widths(format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
    let num_columns = format.columns.len().max(
        rows.iter().map(|r| r.len()).max().unwrap_or(0)
    );

    (0..num_columns)
        .map(|col_idx| {
            let mut max_width = match format.columns.get(col_idx) {
                Some(col) => col.min_width.max(col.header.len()),
                None => format.min_column_width,
            };

            for row in rows {
                if let Some(cell) = row.get(col_idx) {
                    max_width = max_width.max(cell.len());
                }
            }

            match format.columns.get(col_idx) {
                Some(col) => max_width.min(col.max_width),
                None => max_width.min(format.max_column_width),
            }
        })
        .collect()
}

fn create_row(
    data: &[String],
    widths: &[usize],
    format: &TableFormat,
    style: &dyn Fn(usize, String) -> String,
) -> String {
    let mut row = String::new();

    if format.show_borders {
        row.push('|');
    }

    for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
        let alignment = format
            .columns
            .get(idx)
            .map(|c| &c.alignment)
            .unwrap_or(&Alignment::Left);

        let padded_cell = style(idx, align_text(cell, width, alignment));

        if format.show_borders {
            row.push(' ');
        }
        row.push_str(&padded_cell);
        if format.show_borders {
            row.push_str(" |");
        } else {
            row.push_str("  ");
        }
    }

    row.trim_end().to_string()
}

fn create_horizontal_border(widths: &[usize]) -> String {
    let mut border = String::new();

    if !widths.is_empty() {
        border.push('+');
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
    }

    border
}

fn align_text(text: &str, width: usize, alignment: &Alignment) -> String {
    if text.len() >= width {
        return text.chars().take(width).collect();
    }

    let padding = width - text.len();
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            let right_pad = padding - left_pad;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
        }
    }
}

/// Format a latency in milliseconds in human-readable form
pub fn format_latency(latency_ms: f64) -> String {
    if latency_ms < 1.0 {
        format!("{:.0}µs", latency_ms * 1000.0)
    } else if latency_ms < 1000.0 {
        format!("{:.2}ms", latency_ms)
    } else {
        format!("{:.2}s", latency_ms / 1000.0)
    }
}

/// Format percentage with appropriate precision
pub fn format_percentage(percentage: f64) -> String {
    if percentage >= 99.95 {
        "100.0%".to_string()
    } else if percentage < 0.05 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", percentage)
    }
}

/// Suffix such as ` (values: 1, 2, 3)`; empty when nothing was read
pub fn format_first_values(values: &[u16]) -> String {
    if values.is_empty() {
        return String::new();
    }
    let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!(" (values: {})", joined.join(", "))
}

/// Human-readable description of how a run ended
pub fn termination_label(termination: &RunTermination) -> String {
    match termination {
        RunTermination::Completed => "completed".to_string(),
        RunTermination::Cancelled => "interrupted".to_string(),
        RunTermination::ConnectionLost(reason) => format!("connection lost: {}", reason),
    }
}

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::internal(format!("Failed to format output: {}", e))
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}  ", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_test_plan(&self, config: &Config, matrix: &TestMatrix) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "Target:      {} (unit {})", config.endpoint(), config.unit_id).map_err(fmt_err)?;
        writeln!(
            output,
            "Registers:   {} from {}",
            config.register_type.display_name(),
            config.start_address
        )
        .map_err(fmt_err)?;
        writeln!(output, "Rates:       {:?} Hz", config.rates_hz).map_err(fmt_err)?;
        writeln!(output, "Sizes:       {:?} registers", config.register_counts).map_err(fmt_err)?;
        write!(
            output,
            "Runs:        {} x {} min (about {:.1} min total)",
            matrix.len(),
            config.duration_minutes,
            matrix.total_duration().as_secs_f64() / 60.0
        )
        .map_err(fmt_err)?;

        Ok(output)
    }

    fn format_run_header(&self, index: usize, total: usize, run: &RunConfig) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(60);

        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "Test {}/{}: {}Hz, {} registers", index + 1, total, run.rate_hz, run.request_size)
            .map_err(fmt_err)?;
        writeln!(output, "{}", border).map_err(fmt_err)?;
        write!(output, "Running for {} minute(s) at {}Hz...", run.duration_minutes(), run.rate_hz)
            .map_err(fmt_err)?;

        Ok(output)
    }

    fn format_outcome(&self, sequence: usize, outcome: &ProbeOutcome) -> Result<String> {
        let line = if outcome.success {
            format!("   [OK] Request {}: {}", sequence + 1, format_latency(outcome.latency_ms()))
        } else {
            format!(
                "   [FAIL] Request {}: FAILED - {}",
                sequence + 1,
                outcome.error.as_deref().unwrap_or("unknown error")
            )
        };

        if sequence + 1 == ECHOED_OUTCOMES {
            Ok(format!("{}\n   ... (continuing silently, will show summary)", line))
        } else {
            Ok(line)
        }
    }

    fn format_run_summary(&self, stats: &RunStatistics, termination: &RunTermination) -> Result<String> {
        let mut output = String::new();

        writeln!(
            output,
            "Completed: {}/{} successful ({})",
            stats.succeeded,
            stats.total,
            format_percentage(stats.success_percentage())
        )
        .map_err(fmt_err)?;
        writeln!(output, "   Avg latency: {:.2}ms", stats.avg_latency_ms).map_err(fmt_err)?;
        write!(output, "   Dropouts: {}", stats.dropout_count).map_err(fmt_err)?;

        if self.options.verbose_mode {
            write!(
                output,
                "\n   Median/P95/Max: {:.2}/{:.2}/{:.2}ms\n   Max consecutive failures: {}",
                stats.median_latency_ms, stats.p95_latency_ms, stats.max_latency_ms, stats.max_consecutive_failures
            )
            .map_err(fmt_err)?;
        }

        if *termination != RunTermination::Completed {
            write!(output, "\n   Run ended early ({})", termination_label(termination)).map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_results_table(&self, stats: &[RunStatistics]) -> Result<String> {
        if stats.is_empty() {
            return Ok("No runs completed.".to_string());
        }

        let mut output = self.format_header("MODBUS TCP PERFORMANCE TEST SUMMARY")?;
        output.push('\n');
        output.push_str(&render_table(
            &results_table_format(self.options.table_borders),
            &results_rows(stats),
            &|_, _, text| text,
        ));
        Ok(output)
    }

    fn format_diagnostics(&self, report: &DiagnosticReport) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "Connection check for {}", report.endpoint).map_err(fmt_err)?;
        match &report.connect_error {
            None => writeln!(output, "  Connected in {}", format_latency(report.connect_latency_ms)).map_err(fmt_err)?,
            Some(err) => {
                write!(output, "  Connection failed: {}", err).map_err(fmt_err)?;
                return Ok(output);
            }
        }

        writeln!(
            output,
            "  Testing {} registers starting at {} (Modbus address {})",
            report.register_type.display_name(),
            report.logical_address,
            report.protocol_address
        )
        .map_err(fmt_err)?;

        for check in &report.reads {
            let line = match &check.error {
                None => format!(
                    "  [OK] Reading {} registers: {}{}",
                    check.count,
                    format_latency(check.latency_ms),
                    format_first_values(&check.first_values)
                ),
                Some(err) => format!("  [FAIL] Reading {} registers failed: {}", check.count, err),
            };
            writeln!(output, "{}", line).map_err(fmt_err)?;
        }

        write!(output, "  Unit ID: {}", report.unit_id).map_err(fmt_err)?;
        Ok(output)
    }

    fn format_saved_files(&self, files: &[PathBuf]) -> Result<String> {
        let mut output = String::from("Saved:");
        for file in files {
            write!(output, "\n  {}", file.display()).map_err(fmt_err)?;
        }
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("Error: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("Warning: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("Success: {}", message))
    }
}
