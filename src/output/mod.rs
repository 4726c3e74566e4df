//! Output formatting and display system
//!
//! This module provides a flexible output formatting system for test results,
//! supporting both colored and plain text output with table formatting.

mod formatter;
mod colored;

pub use formatter::{
    format_first_values, format_latency, format_percentage, render_table, results_rows, results_table_format,
    termination_label, Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData, TableFormat,
    ECHOED_OUTCOMES,
};
pub use colored::{success_color, ColorScheme, ColoredFormatter, LatencyLevel};

use crate::{
    client::ProbeError,
    error::Result,
    executor::{MatrixResults, MatrixTermination, ProgressObserver, RunTermination},
    models::metrics::{ProbeOutcome, RunConfig, RunStatistics},
};
use std::io::{self, Write};
use std::sync::Mutex;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            table_borders: true,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, false)
    }
}

/// Prints run progress as the matrix executes.
///
/// Each run gets its header, the first `ECHOED_OUTCOMES` outcomes and a
/// result block. Write failures on the console are ignored.
pub struct ConsoleProgress<W: Write + Send = io::Stdout> {
    formatter: Box<dyn OutputFormatter>,
    out: Mutex<W>,
}

impl ConsoleProgress<io::Stdout> {
    pub fn stdout(formatter: Box<dyn OutputFormatter>) -> Self {
        Self::new(formatter, io::stdout())
    }
}

impl<W: Write + Send> ConsoleProgress<W> {
    pub fn new(formatter: Box<dyn OutputFormatter>, out: W) -> Self {
        Self {
            formatter,
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, text: Result<String>) {
        let Ok(text) = text else {
            return;
        };
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", text);
            let _ = out.flush();
        }
    }
}

impl<W: Write + Send> ProgressObserver for ConsoleProgress<W> {
    fn on_run_start(&self, index: usize, total: usize, run: &RunConfig) {
        self.emit(self.formatter.format_run_header(index, total, run).map(|h| format!("\n{}", h)));
    }

    fn on_outcome(&self, sequence: usize, outcome: &ProbeOutcome) {
        if sequence < ECHOED_OUTCOMES {
            self.emit(self.formatter.format_outcome(sequence, outcome));
        }
    }

    fn on_run_complete(&self, stats: &RunStatistics, termination: &RunTermination) {
        self.emit(self.formatter.format_run_summary(stats, termination));
    }

    fn on_reconnect(&self, endpoint: &str, result: &std::result::Result<(), ProbeError>) {
        let text = match result {
            Ok(()) => self.formatter.format_success(&format!("Reconnected to {}", endpoint)),
            Err(e) => self.formatter.format_error(&format!("Reconnect to {} failed: {}", endpoint, e)),
        };
        self.emit(text);
    }
}

/// Main output coordinator that handles final result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
}

impl OutputCoordinator {
    /// Create a new output coordinator with the specified formatter
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter }
    }

    pub fn formatter(&self) -> &dyn OutputFormatter {
        self.formatter.as_ref()
    }

    /// Summary table plus a line on how the matrix ended
    pub fn display_results(&self, results: &MatrixResults) -> Result<String> {
        let mut output = String::from("\n");
        output.push_str(&self.formatter.format_results_table(&results.stats)?);
        output.push_str("\n\n");

        let status = match &results.termination {
            MatrixTermination::Completed => self.formatter.format_success(&format!(
                "All {} runs completed in {:.1} min",
                results.stats.len(),
                results.elapsed.as_secs_f64() / 60.0
            ))?,
            MatrixTermination::Interrupted => self.formatter.format_warning(&format!(
                "Interrupted after {} run(s); partial results kept",
                results.stats.len()
            ))?,
            MatrixTermination::Aborted { reason } => self.formatter.format_error(&format!(
                "Matrix aborted after {} run(s): {}",
                results.stats.len(),
                reason
            ))?,
        };
        output.push_str(&status);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn run() -> RunConfig {
        RunConfig::new(10.0, 5, Duration::from_secs(60))
    }

    fn progress() -> ConsoleProgress<Vec<u8>> {
        ConsoleProgress::new(OutputFormatterFactory::create_plain_formatter(), Vec::new())
    }

    fn text(progress: ConsoleProgress<Vec<u8>>) -> String {
        String::from_utf8(progress.into_inner()).unwrap()
    }

    #[test]
    fn test_factory_selects_formatter() {
        let plain = OutputFormatterFactory::create_formatter(false, false);
        assert_eq!(plain.format_error("boom").unwrap(), "Error: boom");
    }

    #[test]
    fn test_progress_echoes_first_outcomes_only() {
        let progress = progress();
        progress.on_run_start(0, 4, &run());
        for sequence in 0..20 {
            let outcome = ProbeOutcome::success(Utc::now(), Duration::from_millis(3), &run());
            progress.on_outcome(sequence, &outcome);
        }

        let output = text(progress);
        assert!(output.contains("Test 1/4: 10Hz, 5 registers"));
        assert_eq!(output.matches("[OK] Request").count(), ECHOED_OUTCOMES);
        assert_eq!(output.matches("continuing silently").count(), 1);
    }

    #[test]
    fn test_progress_reports_reconnects() {
        let progress = progress();
        progress.on_reconnect("10.0.0.1:502", &Ok(()));
        progress.on_reconnect("10.0.0.1:502", &Err(ProbeError::Connect("refused".to_string())));

        let output = text(progress);
        assert!(output.contains("Reconnected to 10.0.0.1:502"));
        assert!(output.contains("Error: Reconnect to 10.0.0.1:502 failed"));
    }

    #[test]
    fn test_display_results_reports_termination() {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter());
        let mut results = MatrixResults {
            stats: vec![RunStatistics::empty(&run())],
            outcomes: Vec::new(),
            termination: MatrixTermination::Completed,
            started_at: Utc::now(),
            elapsed: Duration::from_secs(90),
        };

        let output = coordinator.display_results(&results).unwrap();
        assert!(output.contains("MODBUS TCP PERFORMANCE TEST SUMMARY"));
        assert!(output.contains("All 1 runs completed in 1.5 min"));

        results.termination = MatrixTermination::Aborted {
            reason: "connection lost: broken pipe".to_string(),
        };
        let output = coordinator.display_results(&results).unwrap();
        assert!(output.contains("Matrix aborted after 1 run(s): connection lost: broken pipe"));
    }
}
