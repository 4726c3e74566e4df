//! Main application orchestration and execution

use crate::{
    cli::Cli,
    client::{ModbusTcpClient, RegisterTarget},
    config::{display_config_summary, load_config, validate_config},
    diagnostics::ConnectionDiagnostics,
    error::{AppError, Result},
    executor::{ExecutionConfig, MatrixExecutor, MatrixResults, MatrixTermination},
    logging::LoggerFactory,
    models::Config,
    output::{ConsoleProgress, OutputCoordinator, OutputFormatter, OutputFormatterFactory},
    report::ReportWriter,
};
use tokio_util::sync::CancellationToken;

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        cli.validate().map_err(AppError::validation)?;
        Ok(Self { cli })
    }

    /// Run the application
    pub async fn run(self) -> Result<()> {
        if self.cli.should_show_topic_help() {
            println!("{}", self.cli.display_help());
            return Ok(());
        }

        let config = load_config(self.cli.clone())?;
        let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);

        if config.debug {
            println!("{} v{}", crate::PKG_NAME, crate::VERSION);
            println!("\nConfiguration Summary:");
            println!("{}\n", display_config_summary(&config));
        }

        let loggers = LoggerFactory::new(config.clone())?;
        let error_logger = loggers.create_error_logger().await;

        let result = if self.cli.check {
            run_check(&config, formatter.as_ref()).await
        } else {
            run_matrix(&config, formatter, &loggers).await
        };

        if let Err(e) = &result {
            error_logger.log_error(e, Some(if self.cli.check { "connection check" } else { "test matrix" })).await;
        }
        result
    }
}

/// `--check`: connect, read a few register blocks and report
async fn run_check(config: &Config, formatter: &dyn OutputFormatter) -> Result<()> {
    println!("{}", formatter.format_header("Modbus Connection Check")?);

    let client = ModbusTcpClient::from_config(config);
    let mut diagnostics = ConnectionDiagnostics::from_config(client, config)?;
    let report = diagnostics.run().await;

    println!("{}", formatter.format_diagnostics(&report)?);
    report.to_result()
}

async fn run_matrix(config: &Config, formatter: Box<dyn OutputFormatter>, loggers: &LoggerFactory) -> Result<()> {
    let matrix = config.test_matrix();

    println!("{}", formatter.format_header("Modbus Latency Test")?);
    for warning in validate_config(config)? {
        println!("{}", formatter.format_warning(&warning.format())?);
    }
    println!("{}", formatter.format_test_plan(config, &matrix)?);

    let client = ModbusTcpClient::from_config(config);
    let target = RegisterTarget::from_config(config)?;
    let mut executor = MatrixExecutor::new(client, target, ExecutionConfig::from(config))
        .with_run_logger(loggers.create_run_logger().await);

    executor.preflight().await?;
    println!("{}", formatter.format_success(&format!("Connected to {}", config.endpoint()))?);

    let cancel = CancellationToken::new();
    let interrupt = spawn_interrupt_handler(cancel.clone());

    let progress = ConsoleProgress::stdout(OutputFormatterFactory::create_formatter(
        config.enable_color,
        config.verbose,
    ));
    let outcome = executor.execute(&matrix, &cancel, &progress).await;

    interrupt.abort();
    executor.shutdown().await;
    let results = outcome?;

    let coordinator = OutputCoordinator::new(formatter);
    save_reports(config, &results, coordinator.formatter())?;
    println!("{}", coordinator.display_results(&results)?);

    termination_result(&results)
}

fn spawn_interrupt_handler(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received, stopping after the current probe...");
            cancel.cancel();
        }
    })
}

/// Partial results are written too, so an interrupted matrix still leaves files behind
fn save_reports(config: &Config, results: &MatrixResults, formatter: &dyn OutputFormatter) -> Result<()> {
    let writer = ReportWriter::from_config(config);
    if !writer.is_enabled() || results.stats.is_empty() {
        return Ok(());
    }

    let files = writer.write(&results.stats, &results.outcomes)?;
    println!("{}", formatter.format_saved_files(&files)?);
    Ok(())
}

/// Map how the matrix ended to the process result
pub fn termination_result(results: &MatrixResults) -> Result<()> {
    match &results.termination {
        MatrixTermination::Completed => Ok(()),
        MatrixTermination::Interrupted => Err(AppError::interrupted(format!(
            "stopped after {} run(s)",
            results.stats.len()
        ))),
        MatrixTermination::Aborted { reason } => Err(AppError::connection(reason.clone())),
    }
}
