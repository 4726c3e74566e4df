//! Modbus Latency Tester - Main CLI Application
//!
//! Polls Modbus TCP registers at fixed rates and reports latency, success
//! rate and dropouts for every rate/register-count combination.

use clap::Parser;
use modbus_latency_tester::{
    app::App,
    cli::Cli,
    error::{AppError, ErrorReporter},
};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("This is a bug. Please report it together with the command line you used.");
        process::exit(99);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    let result = match App::new(cli) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        reporter.report_error(&e);
        if !reporter.verbose {
            print_error_suggestions(&e);
        }
        process::exit(e.exit_code());
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) | AppError::Validation(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Run 'mlt --help-topic config' for the file layout and limits");
            eprintln!("  - Run 'mlt --help-topic env' for environment variables");
        }
        AppError::Connection(_) | AppError::Timeout(_) => {
            eprintln!();
            eprintln!("Connection troubleshooting:");
            eprintln!("  - Check host and port (Modbus TCP normally listens on 502)");
            eprintln!("  - Run 'mlt --check' to test the connection alone");
            eprintln!("  - Increase the timeout with --timeout");
        }
        AppError::Protocol(_) => {
            eprintln!();
            eprintln!("Protocol troubleshooting:");
            eprintln!("  - Verify the unit ID with --unit-id");
            eprintln!("  - Check --register-type and --start-address against the device register map");
        }
        _ => {}
    }
}
