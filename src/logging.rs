//! Structured logging system for the Modbus latency tester
//!
//! This module provides:
//! - Structured logging with levels, session ids and custom fields
//! - Human-readable console lines on stderr
//! - An optional append-only log file that receives JSON lines
//! - Run and error event loggers used by the executor and the app

use crate::error::{AppError, Result};
use crate::models::metrics::{ProbeOutcome, RunConfig, RunStatistics};
use crate::models::Config;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Debug level - per-probe detail
    Debug = 0,
    /// Info level - run lifecycle
    Info = 1,
    /// Warning level - recoverable problems
    Warn = 2,
    /// Error level - failures that end a run or the matrix
    Error = 3,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Debug => "\x1b[36m",    // Cyan
            LogLevel::Info => "\x1b[32m",     // Green
            LogLevel::Warn => "\x1b[33m",     // Yellow
            LogLevel::Error => "\x1b[31m",    // Red
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp when log entry was created
    pub timestamp: DateTime<Utc>,
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Additional structured fields
    pub fields: HashMap<String, serde_json::Value>,
}

/// Shared logging context for session tracking
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
}

/// Append-only JSON lines log file shared between loggers
#[derive(Debug, Clone)]
pub struct LogFileSink {
    file: Arc<Mutex<File>>,
}

impl LogFileSink {
    /// Open (or create) the log file, creating parent directories as needed
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::io(format!("Failed to create log directory {}: {}", parent.display(), e))
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::io(format!("Failed to open log file {}: {}", path.display(), e)))?;

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}", line);
        }
    }
}

/// Logger writing console lines and, optionally, JSON lines to a file
pub struct Logger {
    /// Minimum log level written to the console
    min_level: LogLevel,
    /// Minimum log level written to the log file
    file_level: LogLevel,
    use_color: bool,
    name: String,
    context: Arc<RwLock<LogContext>>,
    file_sink: Option<LogFileSink>,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: String) -> Self {
        Self {
            min_level: LogLevel::Info,
            file_level: LogLevel::Info,
            use_color: true,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
            file_sink: None,
        }
    }

    /// Create a logger with specific configuration
    pub fn with_config(name: String, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            file_level: if config.debug { LogLevel::Debug } else { LogLevel::Info },
            use_color: config.enable_color,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
            file_sink: None,
        }
    }

    /// Mirror entries into a log file
    pub fn with_file_sink(mut self, sink: LogFileSink) -> Self {
        self.file_sink = Some(sink);
        self
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Check if a log level would be output anywhere
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level || (self.file_sink.is_some() && level >= self.file_level)
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        if let Some(session_id) = &self.context.read().await.session_id {
            entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }

        if let Some(sink) = &self.file_sink {
            if entry.level >= self.file_level {
                sink.write_line(&self.format_json(&entry));
            }
        }

        if entry.level < self.min_level {
            return;
        }

        // Log lines go to stderr so report output on stdout stays clean
        let _ = writeln!(io::stderr(), "{}", self.format_console(&entry));
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}",
            timestamp,
            formatted_level,
            entry.logger,
            entry.message
        );

        if !entry.fields.is_empty() {
            let mut fields_str: Vec<String> = entry.fields.iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields_str.sort();
            output.push_str(&format!(" {{{}}}", fields_str.join(", ")));
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!("{{\"error\": \"Failed to serialize log entry\", \"message\": \"{}\"}}", entry.message),
        }
    }
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                fields: HashMap::new(),
            },
        }
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add the fields of a run's parameters
    pub fn run(self, run: &RunConfig) -> Self {
        self.field("rate_hz", run.rate_hz)
            .field("request_size", run.request_size)
            .field("duration_minutes", run.duration_minutes())
    }

    /// Add the fields of one probe outcome
    pub fn outcome(self, outcome: &ProbeOutcome) -> Self {
        self.field("latency_ms", outcome.latency_ms())
            .field("success", outcome.success)
            .field("error", &outcome.error)
    }

    /// Add the headline figures of a run summary
    pub fn run_stats(self, stats: &RunStatistics) -> Self {
        self.field("total", stats.total)
            .field("succeeded", stats.succeeded)
            .field("failed", stats.failed)
            .field("success_rate", stats.success_rate)
            .field("avg_latency_ms", stats.avg_latency_ms)
            .field("max_latency_ms", stats.max_latency_ms)
            .field("dropout_count", stats.dropout_count)
    }

    /// Add error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Logger for run lifecycle and per-probe events
pub struct RunLogger {
    logger: Logger,
}

impl RunLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// A run is about to start
    pub async fn log_run_start(&self, index: usize, total: usize, run: &RunConfig) {
        self.logger.info(&format!("Starting run {}/{}: {}", index + 1, total, run.label()))
            .run(run)
            .field("run_index", index + 1)
            .field("run_total", total)
            .log()
            .await;
    }

    /// One probe finished; only emitted at debug level
    pub async fn log_probe(&self, sequence: usize, outcome: &ProbeOutcome) {
        if !self.logger.would_log(LogLevel::Debug) {
            return;
        }
        self.logger.debug(&format!("Probe {} ({} registers)", sequence + 1, outcome.request_size))
            .outcome(outcome)
            .log()
            .await;
    }

    /// A run ended
    pub async fn log_run_complete(&self, stats: &RunStatistics, termination: &str) {
        let message = format!(
            "Completed run {}Hz x {} registers ({}): {}/{} succeeded, {} dropouts",
            stats.rate_hz, stats.request_size, termination, stats.succeeded, stats.total, stats.dropout_count
        );

        self.logger.info(&message)
            .run_stats(stats)
            .field("termination", termination)
            .log()
            .await;
    }

    /// Connection attempt to the server
    pub async fn log_connection(&self, endpoint: &str, success: bool, error: Option<&str>) {
        let message = if success {
            format!("Connected to {}", endpoint)
        } else {
            format!("Failed to connect to {}", endpoint)
        };

        let mut builder = if success {
            self.logger.info(&message)
        } else {
            self.logger.warn(&message)
        };
        builder = builder.field("endpoint", endpoint).field("success", success);

        if let Some(err) = error {
            builder = builder.field("error", err);
        }

        builder.log().await;
    }

    /// The transport dropped in the middle of a run
    pub async fn log_connection_lost(&self, run: &RunConfig, reason: &str) {
        self.logger.warn(&format!("Connection lost during run {}: {}", run.label(), reason))
            .run(run)
            .field("reason", reason)
            .log()
            .await;
    }
}

/// Error event logger with enhanced context
pub struct ErrorEventLogger {
    logger: Logger,
}

impl ErrorEventLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Log an application error with full context
    pub async fn log_error(&self, error: &AppError, context: Option<&str>) {
        let message = if let Some(ctx) = context {
            format!("{}: {}", ctx, error)
        } else {
            error.to_string()
        };

        let mut builder = self.logger.error(&message)
            .error_info(error);

        if let Some(ctx) = context {
            builder = builder.field("context", ctx);
        }

        builder.log().await;
    }
}

/// Creates loggers that share one session id and log file
pub struct LoggerFactory {
    config: Config,
    session_id: String,
    file_sink: Option<LogFileSink>,
}

impl LoggerFactory {
    /// Create a new logger factory, opening the configured log file
    pub fn new(config: Config) -> Result<Self> {
        let file_sink = match &config.log_file {
            Some(path) => Some(LogFileSink::open(path)?),
            None => None,
        };

        Ok(Self {
            config,
            session_id: Uuid::new_v4().to_string(),
            file_sink,
        })
    }

    /// Create a logger with a specific name
    pub async fn create_logger(&self, name: &str) -> Logger {
        let mut logger = Logger::with_config(name.to_string(), &self.config);
        if let Some(sink) = &self.file_sink {
            logger = logger.with_file_sink(sink.clone());
        }
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_run_logger(&self) -> RunLogger {
        RunLogger::new(self.create_logger("RUN").await)
    }

    pub async fn create_error_logger(&self) -> ErrorEventLogger {
        ErrorEventLogger::new(self.create_logger("ERR").await)
    }
}
