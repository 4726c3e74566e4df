//! Modbus register client and the probe the scheduler drives

pub mod frame;
pub mod modbus;


pub use modbus::{ModbusConnection, ModbusTcpClient};

use crate::models::Config;
use crate::types::{AppError, RegisterType, Result};
use async_trait::async_trait;
use std::io;
use std::time::Duration;

/// Failure of a single register read
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbeError {
    #[error("not connected to the Modbus server")]
    NotConnected,

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("failed to connect to {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Modbus exception {code:#04x} ({}) for function {function:#04x}", frame::exception_name(.code))]
    Exception { function: u8, code: u8 },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProbeError {
    /// Classify an I/O error on an established session.
    ///
    /// Any stream error leaves the session unusable, so all of them count
    /// as connection loss.
    pub fn from_io(err: io::Error) -> Self {
        let reason = match err.kind() {
            io::ErrorKind::ConnectionReset => "connection reset by peer".to_string(),
            io::ErrorKind::ConnectionAborted => "connection aborted".to_string(),
            io::ErrorKind::BrokenPipe => "broken pipe".to_string(),
            io::ErrorKind::UnexpectedEof => "unexpected end of stream".to_string(),
            _ => err.to_string(),
        };
        ProbeError::ConnectionLost(reason)
    }

    /// Whether the transport is gone and further probes cannot succeed
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, ProbeError::NotConnected | ProbeError::ConnectionLost(_))
    }
}

impl From<ProbeError> for AppError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Timeout(_) => AppError::timeout(err.to_string()),
            ProbeError::Exception { .. } | ProbeError::Malformed(_) => AppError::protocol(err.to_string()),
            _ => AppError::connection(err.to_string()),
        }
    }
}

/// Register-reading client abstraction for the transport and for testing
#[async_trait]
pub trait RegisterClient: Send {
    /// Open (or reopen) the session
    async fn connect(&mut self) -> std::result::Result<(), ProbeError>;

    /// Read `count` registers starting at the zero-based protocol `address`
    async fn read_registers(
        &mut self,
        register_type: RegisterType,
        address: u16,
        count: u16,
        unit_id: u8,
    ) -> std::result::Result<Vec<u16>, ProbeError>;

    /// Close the session; a no-op when not connected
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// `host:port` description used in messages
    fn endpoint(&self) -> &str;
}

/// One timed unit of work issued by the scheduler.
///
/// The scheduler awaits each call before deciding on the next tick, so an
/// implementation never sees overlapping calls.
#[async_trait]
pub trait Probe: Send {
    async fn probe(&mut self, request_size: u16) -> std::result::Result<(), ProbeError>;
}

/// Where probes read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterTarget {
    pub register_type: RegisterType,
    /// Zero-based protocol address
    pub address: u16,
    pub unit_id: u8,
}

impl RegisterTarget {
    /// Resolve the target from configuration, translating the logical address
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            register_type: config.register_type,
            address: config.protocol_address()?,
            unit_id: config.unit_id,
        })
    }
}

/// A `Probe` that reads `request_size` registers from a fixed target
pub struct RegisterProbe<C> {
    client: C,
    target: RegisterTarget,
}

impl<C: RegisterClient> RegisterProbe<C> {
    pub fn new(client: C, target: RegisterTarget) -> Self {
        Self { client, target }
    }

    pub fn target(&self) -> &RegisterTarget {
        &self.target
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }
}

#[async_trait]
impl<C: RegisterClient> Probe for RegisterProbe<C> {
    async fn probe(&mut self, request_size: u16) -> std::result::Result<(), ProbeError> {
        self.client
            .read_registers(
                self.target.register_type,
                self.target.address,
                request_size,
                self.target.unit_id,
            )
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted client used by unit tests across the crate

    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    pub struct ReadCall {
        pub register_type: RegisterType,
        pub address: u16,
        pub count: u16,
        pub unit_id: u8,
    }

    /// Replays queued read results; an empty queue means success
    #[derive(Default)]
    pub struct MockClient {
        pub connected: bool,
        pub fail_connect: bool,
        pub connects: usize,
        pub reads: VecDeque<std::result::Result<(), ProbeError>>,
        pub calls: Vec<ReadCall>,
    }

    impl MockClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_reads(reads: Vec<std::result::Result<(), ProbeError>>) -> Self {
            Self {
                reads: reads.into(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RegisterClient for MockClient {
        async fn connect(&mut self) -> std::result::Result<(), ProbeError> {
            self.connects += 1;
            if self.fail_connect {
                return Err(ProbeError::Connect("127.0.0.1:1502: connection refused".to_string()));
            }
            self.connected = true;
            Ok(())
        }

        async fn read_registers(
            &mut self,
            register_type: RegisterType,
            address: u16,
            count: u16,
            unit_id: u8,
        ) -> std::result::Result<Vec<u16>, ProbeError> {
            if !self.connected {
                return Err(ProbeError::NotConnected);
            }
            self.calls.push(ReadCall { register_type, address, count, unit_id });

            match self.reads.pop_front().unwrap_or(Ok(())) {
                Ok(()) => Ok(vec![0; count as usize]),
                Err(e) => {
                    if e.is_connection_loss() {
                        self.connected = false;
                    }
                    Err(e)
                }
            }
        }

        async fn disconnect(&mut self) {
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn endpoint(&self) -> &str {
            "127.0.0.1:1502"
        }
    }
}
