//! End-to-end tests: the full matrix against an in-process Modbus TCP server
//!
//! These run in real time with sub-second runs, so probe counts are checked
//! with generous bounds.

mod common;

use common::{closed_port, FakeServer, ServerBehavior};
use modbus_latency_tester::{
    client::{ModbusTcpClient, RegisterTarget},
    diagnostics::ConnectionDiagnostics,
    executor::{ExecutionConfig, MatrixExecutor, MatrixResults, MatrixTermination, SilentObserver},
    models::Config,
    report::ReportWriter,
    types::{ConnectionLossPolicy, RegisterType},
    AppError,
};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn test_config(port: u16) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port,
        timeout_seconds: 1.0,
        rates_hz: vec![20.0, 50.0],
        register_counts: vec![1, 10],
        // 300 ms per run
        duration_minutes: 0.005,
        ..Config::default()
    }
}

fn executor(config: &Config) -> MatrixExecutor<ModbusTcpClient> {
    MatrixExecutor::new(
        ModbusTcpClient::from_config(config),
        RegisterTarget::from_config(config).unwrap(),
        ExecutionConfig::from(config),
    )
}

async fn run_matrix(config: &Config) -> MatrixResults {
    let mut executor = executor(config);
    executor.preflight().await.unwrap();
    let results = executor
        .execute(&config.test_matrix(), &CancellationToken::new(), &SilentObserver)
        .await
        .unwrap();
    executor.shutdown().await;
    results
}

#[tokio::test]
async fn test_full_matrix_against_server() {
    let server = FakeServer::start().await;
    let config = test_config(server.port());

    let results = run_matrix(&config).await;

    assert!(results.is_complete());
    assert_eq!(results.stats.len(), 4);

    let combos: Vec<(f64, u16)> = results.stats.iter().map(|s| (s.rate_hz, s.request_size)).collect();
    assert_eq!(combos, vec![(20.0, 1), (20.0, 10), (50.0, 1), (50.0, 10)]);

    for stats in &results.stats {
        assert!(stats.total > 0, "{:?}", stats);
        assert_eq!(stats.succeeded, stats.total);
        assert_eq!(stats.success_rate, 1.0);
        assert_eq!(stats.dropout_count, 0);
        assert!(stats.max_latency_ms >= stats.min_latency_ms);
        // Never more probes than the grid allows
        assert!(stats.total as f64 <= stats.rate_hz * 0.3 + 1.0, "{:?}", stats);
    }

    assert_eq!(results.total_probes() as usize, results.outcomes.len());
    // Preflight read plus every probe on one connection
    assert_eq!(server.requests(), results.outcomes.len() + 1);
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn test_reports_written_for_matrix() {
    let server = FakeServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(server.port());
    config.rates_hz = vec![20.0];
    config.output_directory = dir.path().join("results");

    let results = run_matrix(&config).await;
    let files = ReportWriter::from_config(&config)
        .write(&results.stats, &results.outcomes)
        .unwrap();

    assert_eq!(files.len(), 3);
    for file in &files {
        assert!(file.exists(), "{}", file.display());
    }

    let stats_csv = fs::read_to_string(&files[0]).unwrap();
    assert_eq!(stats_csv.lines().count(), 1 + results.stats.len());

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&files[1]).unwrap()).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[1]["request_size"], 10);

    let detailed = fs::read_to_string(&files[2]).unwrap();
    assert_eq!(detailed.lines().count(), 1 + results.outcomes.len());
}

#[tokio::test]
async fn test_slow_server_lowers_rate_without_bursts() {
    let server = FakeServer::with_behavior(ServerBehavior {
        delay: Duration::from_millis(100),
        ..ServerBehavior::default()
    }).await;
    let mut config = test_config(server.port());
    config.rates_hz = vec![50.0];
    config.register_counts = vec![1];
    config.duration_minutes = 0.01;

    let results = run_matrix(&config).await;
    let stats = &results.stats[0];

    // 600 ms at ~100 ms per probe, nowhere near the 30 a 50 Hz grid would give
    assert!(stats.total >= 3 && stats.total <= 8, "{:?}", stats);
    assert_eq!(stats.succeeded, stats.total);
    assert!(stats.min_latency_ms >= 90.0);
}

#[tokio::test]
async fn test_abort_on_connection_loss_keeps_partial_run() {
    let server = FakeServer::with_behavior(ServerBehavior {
        close_after: Some(4),
        ..ServerBehavior::default()
    }).await;
    let mut config = test_config(server.port());
    config.duration_minutes = 0.01;

    let results = run_matrix(&config).await;

    match &results.termination {
        MatrixTermination::Aborted { reason } => assert!(reason.contains("20Hz"), "{}", reason),
        other => panic!("unexpected termination {:?}", other),
    }
    assert_eq!(results.stats.len(), 1);
    let partial = &results.stats[0];
    assert_eq!(partial.succeeded, 3);
    assert_eq!(partial.failed, 1);
    assert!(!results.outcomes.last().unwrap().success);
}

#[tokio::test]
async fn test_skip_reconnects_for_next_run() {
    let server = FakeServer::with_behavior(ServerBehavior {
        close_after: Some(4),
        ..ServerBehavior::default()
    }).await;
    let mut config = test_config(server.port());
    config.rates_hz = vec![50.0];
    config.duration_minutes = 0.01;
    config.on_connection_loss = ConnectionLossPolicy::Skip;

    let results = run_matrix(&config).await;

    assert_eq!(results.termination, MatrixTermination::Completed);
    assert_eq!(results.stats.len(), 2);
    assert_eq!(results.stats[0].succeeded, 3);
    // Second run starts on a fresh connection with no preflight read
    assert_eq!(results.stats[1].succeeded, 4);
    assert_eq!(server.connections(), 2);
}

#[tokio::test]
async fn test_record_counts_failures_after_loss() {
    let server = FakeServer::with_behavior(ServerBehavior {
        close_after: Some(4),
        ..ServerBehavior::default()
    }).await;
    let mut config = test_config(server.port());
    config.rates_hz = vec![50.0];
    config.register_counts = vec![1];
    config.duration_minutes = 0.01;
    config.on_connection_loss = ConnectionLossPolicy::Record;

    let results = run_matrix(&config).await;

    assert!(results.is_complete());
    let stats = &results.stats[0];
    assert_eq!(stats.succeeded, 3);
    assert!(stats.failed >= 5, "{:?}", stats);
    assert_eq!(stats.dropout_count, 1);
    assert_eq!(stats.max_consecutive_failures, stats.failed);
}

#[tokio::test]
async fn test_cancellation_stops_matrix() {
    let server = FakeServer::start().await;
    let mut config = test_config(server.port());
    config.duration_minutes = 1.0;

    let mut executor = executor(&config);
    executor.preflight().await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let results = executor
        .execute(&config.test_matrix(), &cancel, &SilentObserver)
        .await
        .unwrap();

    assert_eq!(results.termination, MatrixTermination::Interrupted);
    assert_eq!(results.stats.len(), 1);
    assert!(results.stats[0].total > 0);
    assert!(results.elapsed < Duration::from_secs(5));
}

#[tokio::test]
async fn test_preflight_fails_without_server() {
    let config = test_config(closed_port().await);
    let mut executor = executor(&config);

    let err = executor.preflight().await.unwrap_err();
    assert!(matches!(err, AppError::Connection(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_preflight_fails_on_exception() {
    let server = FakeServer::with_behavior(ServerBehavior {
        exception: Some(0x02),
        ..ServerBehavior::default()
    }).await;
    let config = test_config(server.port());

    let err = executor(&config).preflight().await.unwrap_err();
    assert!(err.to_string().contains("0x02"), "{}", err);
}

#[tokio::test]
async fn test_connection_check_reads_values() {
    let server = FakeServer::start().await;
    let mut config = test_config(server.port());
    config.register_type = RegisterType::Holding;
    config.start_address = 40011;

    let mut diagnostics =
        ConnectionDiagnostics::from_config(ModbusTcpClient::from_config(&config), &config).unwrap();
    let report = diagnostics.run().await;

    assert!(report.is_healthy(), "{:?}", report);
    assert_eq!(report.protocol_address, 10);
    let counts: Vec<u16> = report.reads.iter().map(|r| r.count).collect();
    assert_eq!(counts, vec![1, 5, 10, 20]);
    assert_eq!(report.reads[0].first_values, vec![10]);
    assert_eq!(report.reads[3].first_values, vec![10, 11, 12]);
    assert!(report.to_result().is_ok());
}

#[tokio::test]
async fn test_connection_check_reports_refused_connection() {
    let config = test_config(closed_port().await);

    let mut diagnostics =
        ConnectionDiagnostics::from_config(ModbusTcpClient::from_config(&config), &config).unwrap();
    let report = diagnostics.run().await;

    assert!(!report.is_healthy());
    assert!(report.connect_error.is_some());
    assert!(report.reads.is_empty());
    assert_eq!(report.to_result().unwrap_err().exit_code(), 2);
}
