//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// First logical address of the input register block (3xxxx numbering)
pub const INPUT_REGISTER_BASE: u32 = 30001;

/// First logical address of the holding register block (4xxxx numbering)
pub const HOLDING_REGISTER_BASE: u32 = 40001;

/// Register table a probe reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterType {
    /// Read-only input registers (function code 0x04)
    #[default]
    Input,
    /// Read/write holding registers (function code 0x03)
    Holding,
}

impl RegisterType {
    /// Modbus function code used to read this register table
    pub fn function_code(&self) -> u8 {
        match self {
            RegisterType::Input => 0x04,
            RegisterType::Holding => 0x03,
        }
    }

    /// Logical numbering base for this register table
    pub fn logical_base(&self) -> u32 {
        match self {
            RegisterType::Input => INPUT_REGISTER_BASE,
            RegisterType::Holding => HOLDING_REGISTER_BASE,
        }
    }

    /// Translate a logical register number into a zero-based protocol address.
    ///
    /// Addresses at or above the table's base (30001 for input, 40001 for
    /// holding) have the base subtracted; anything below passes through
    /// unchanged. Fails when the result does not fit the 16-bit address field.
    pub fn to_protocol_address(&self, logical: u32) -> Result<u16> {
        let base = self.logical_base();
        let address = if logical >= base { logical - base } else { logical };

        u16::try_from(address).map_err(|_| {
            AppError::config(format!(
                "Register {} does not map to a 16-bit {} register address (got {})",
                logical, self, address
            ))
        })
    }

    /// Human-readable name used in console output
    pub fn display_name(&self) -> &'static str {
        match self {
            RegisterType::Input => "INPUT",
            RegisterType::Holding => "HOLDING",
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterType::Input => write!(f, "input"),
            RegisterType::Holding => write!(f, "holding"),
        }
    }
}

impl FromStr for RegisterType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "input" | "inputs" | "ir" => Ok(RegisterType::Input),
            "holding" | "hr" => Ok(RegisterType::Holding),
            other => Err(AppError::config(format!(
                "Invalid register type '{}': expected 'input' or 'holding'",
                other
            ))),
        }
    }
}

/// What the matrix does when the transport is lost in the middle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionLossPolicy {
    /// Keep the partial run, stop the whole matrix
    #[default]
    Abort,
    /// Keep the partial run, reconnect and continue with the next run
    Skip,
    /// Treat connection loss like any other probe failure
    Record,
}

impl fmt::Display for ConnectionLossPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionLossPolicy::Abort => write!(f, "abort"),
            ConnectionLossPolicy::Skip => write!(f, "skip"),
            ConnectionLossPolicy::Record => write!(f, "record"),
        }
    }
}

impl FromStr for ConnectionLossPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(ConnectionLossPolicy::Abort),
            "skip" | "continue" => Ok(ConnectionLossPolicy::Skip),
            "record" => Ok(ConnectionLossPolicy::Record),
            other => Err(AppError::config(format!(
                "Invalid connection loss policy '{}': expected 'abort', 'skip' or 'record'",
                other
            ))),
        }
    }
}
