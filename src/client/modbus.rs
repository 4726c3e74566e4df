//! Modbus TCP transport

use super::frame::{self, ReadRequest, MAX_ADU_LEN, MODBUS_PROTOCOL_ID};
use super::{ProbeError, RegisterClient};
use crate::models::Config;
use crate::types::RegisterType;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// One established Modbus TCP session over any byte stream.
///
/// Incoming bytes are buffered across calls, so a request abandoned on
/// timeout leaves its late response to be skipped by transaction id
/// instead of corrupting the next exchange.
pub struct ModbusConnection<S> {
    stream: S,
    buffer: Vec<u8>,
    next_transaction_id: u16,
    /// Set while a request is only partly on the wire
    writing: bool,
}

impl<S> ModbusConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(MAX_ADU_LEN),
            next_transaction_id: 1,
            writing: false,
        }
    }

    /// Whether a request was abandoned part way through being written
    pub fn has_partial_request(&self) -> bool {
        self.writing
    }

    fn allocate_transaction_id(&mut self) -> u16 {
        let id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        id
    }

    /// Issue one read and wait for its matching response
    pub async fn read_registers(
        &mut self,
        register_type: RegisterType,
        address: u16,
        count: u16,
        unit_id: u8,
    ) -> Result<Vec<u16>, ProbeError> {
        let request = ReadRequest {
            transaction_id: self.allocate_transaction_id(),
            unit_id,
            function: register_type.function_code(),
            address,
            count,
        };

        self.writing = true;
        self.stream
            .write_all(&request.encode())
            .await
            .map_err(ProbeError::from_io)?;
        self.stream.flush().await.map_err(ProbeError::from_io)?;
        self.writing = false;

        loop {
            let (header, pdu) = self.next_frame().await?;

            if header.transaction_id != request.transaction_id {
                // Late answer to an earlier, timed-out request
                continue;
            }

            if header.protocol_id != MODBUS_PROTOCOL_ID {
                return Err(ProbeError::Malformed(format!(
                    "unexpected protocol id {}",
                    header.protocol_id
                )));
            }

            if header.unit_id != request.unit_id {
                return Err(ProbeError::Malformed(format!(
                    "response from unit {}, expected unit {}",
                    header.unit_id, request.unit_id
                )));
            }

            return frame::decode_read_response(request.function, count, &pdu);
        }
    }

    /// [`read_registers`](Self::read_registers) bounded by `limit`.
    ///
    /// Expiry before the request is fully written leaves a fragment on the
    /// wire that the server will misread, so it counts as connection loss.
    pub async fn read_registers_within(
        &mut self,
        limit: Duration,
        register_type: RegisterType,
        address: u16,
        count: u16,
        unit_id: u8,
    ) -> Result<Vec<u16>, ProbeError> {
        let outcome = timeout(limit, self.read_registers(register_type, address, count, unit_id)).await;
        match outcome {
            Ok(result) => result,
            Err(_) if self.writing => Err(ProbeError::ConnectionLost(format!(
                "request write timed out after {:?}",
                limit
            ))),
            Err(_) => Err(ProbeError::Timeout(limit)),
        }
    }

    async fn next_frame(&mut self) -> Result<(frame::MbapHeader, Vec<u8>), ProbeError> {
        let mut chunk = [0u8; MAX_ADU_LEN];
        loop {
            if let Some(frame) = frame::take_frame(&mut self.buffer)? {
                return Ok(frame);
            }

            let read = self.stream.read(&mut chunk).await.map_err(ProbeError::from_io)?;
            if read == 0 {
                return Err(ProbeError::ConnectionLost("connection closed by server".to_string()));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }

    /// Close the write half of the stream
    pub async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Modbus TCP client with a per-request timeout
pub struct ModbusTcpClient {
    endpoint: String,
    timeout: Duration,
    connection: Option<ModbusConnection<TcpStream>>,
}

impl ModbusTcpClient {
    /// Create a client for `host:port`; no connection is made yet
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            endpoint: format!("{}:{}", host, port),
            timeout,
            connection: None,
        }
    }

    /// Create a client from application configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.host, config.port, config.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl RegisterClient for ModbusTcpClient {
    async fn connect(&mut self) -> Result<(), ProbeError> {
        self.disconnect().await;

        let stream = timeout(self.timeout, TcpStream::connect(&self.endpoint))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(|e| ProbeError::Connect(format!("{}: {}", self.endpoint, e)))?;

        stream
            .set_nodelay(true)
            .map_err(|e| ProbeError::Connect(format!("{}: {}", self.endpoint, e)))?;

        self.connection = Some(ModbusConnection::new(stream));
        Ok(())
    }

    async fn read_registers(
        &mut self,
        register_type: RegisterType,
        address: u16,
        count: u16,
        unit_id: u8,
    ) -> Result<Vec<u16>, ProbeError> {
        let connection = self.connection.as_mut().ok_or(ProbeError::NotConnected)?;

        let result = connection
            .read_registers_within(self.timeout, register_type, address, count, unit_id)
            .await;

        if matches!(result, Err(ref e) if e.is_connection_loss()) {
            self.connection = None;
        }

        result
    }

    async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.shutdown().await;
        }
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
