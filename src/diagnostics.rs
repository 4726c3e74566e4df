//! Connection check: connect, read a few register blocks, report what came back

use crate::{
    client::{RegisterClient, RegisterTarget},
    error::{AppError, Result},
    models::Config,
    types::RegisterType,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Register counts read by the connection check, in order
pub const CHECK_READ_SIZES: [u16; 4] = [1, 5, 10, 20];

/// Values kept from each read for display
pub const SAMPLE_VALUES: usize = 3;

/// Result of a single check read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadCheck {
    /// Registers requested
    pub count: u16,
    /// Round trip of the read, failed or not
    pub latency_ms: f64,
    /// Leading register values of a successful read
    pub first_values: Vec<u16>,
    pub error: Option<String>,
}

impl ReadCheck {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything the connection check found out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub endpoint: String,
    /// Set when the TCP session could not be opened; `reads` is then empty
    pub connect_error: Option<String>,
    pub connect_latency_ms: f64,
    pub register_type: RegisterType,
    /// Address as configured (3xxxx / 4xxxx numbering allowed)
    pub logical_address: u32,
    /// Zero-based address sent on the wire
    pub protocol_address: u16,
    pub unit_id: u8,
    pub reads: Vec<ReadCheck>,
    pub generated_at: DateTime<Utc>,
}

impl DiagnosticReport {
    /// Connected and every read returned data
    pub fn is_healthy(&self) -> bool {
        self.connect_error.is_none() && !self.reads.is_empty() && self.reads.iter().all(ReadCheck::is_success)
    }

    pub fn successful_reads(&self) -> usize {
        self.reads.iter().filter(|r| r.is_success()).count()
    }

    /// Turn a failed check into the error the application exits with
    pub fn to_result(&self) -> Result<()> {
        if let Some(err) = &self.connect_error {
            return Err(AppError::connection(format!("Failed to connect to {}: {}", self.endpoint, err)));
        }

        match self.reads.iter().find(|r| !r.is_success()) {
            Some(failed) => Err(AppError::connection(format!(
                "Reading {} registers from {} failed: {}",
                failed.count,
                self.endpoint,
                failed.error.as_deref().unwrap_or("unknown error")
            ))),
            None => Ok(()),
        }
    }

    /// Export the report as JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::io(format!("Failed to export check report to JSON: {}", e)))
    }
}

/// Runs the connection check against one register target
pub struct ConnectionDiagnostics<C> {
    client: C,
    target: RegisterTarget,
    logical_address: u32,
}

impl<C: RegisterClient> ConnectionDiagnostics<C> {
    pub fn new(client: C, target: RegisterTarget, logical_address: u32) -> Self {
        Self {
            client,
            target,
            logical_address,
        }
    }

    /// Build from configuration, translating the start address
    pub fn from_config(client: C, config: &Config) -> Result<Self> {
        let target = RegisterTarget::from_config(config)?;
        Ok(Self::new(client, target, config.start_address))
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Connect, read each of `CHECK_READ_SIZES`, disconnect.
    ///
    /// Failures are reported, not returned; a failed read does not stop the
    /// remaining ones.
    pub async fn run(&mut self) -> DiagnosticReport {
        let mut report = DiagnosticReport {
            endpoint: self.client.endpoint().to_string(),
            connect_error: None,
            connect_latency_ms: 0.0,
            register_type: self.target.register_type,
            logical_address: self.logical_address,
            protocol_address: self.target.address,
            unit_id: self.target.unit_id,
            reads: Vec::with_capacity(CHECK_READ_SIZES.len()),
            generated_at: Utc::now(),
        };

        let started = Instant::now();
        let connected = self.client.connect().await;
        report.connect_latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        if let Err(e) = connected {
            report.connect_error = Some(e.to_string());
            return report;
        }

        for count in CHECK_READ_SIZES {
            report.reads.push(self.check_read(count).await);
        }

        self.client.disconnect().await;
        report
    }

    async fn check_read(&mut self, count: u16) -> ReadCheck {
        let started = Instant::now();
        let result = self
            .client
            .read_registers(self.target.register_type, self.target.address, count, self.target.unit_id)
            .await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(values) => ReadCheck {
                count,
                latency_ms,
                first_values: values.into_iter().take(SAMPLE_VALUES).collect(),
                error: None,
            },
            Err(e) => ReadCheck {
                count,
                latency_ms,
                first_values: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}
