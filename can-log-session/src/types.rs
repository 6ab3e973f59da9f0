//! Core types for the CAN log session library
//!
//! This module defines the raw frame type produced by the log file parsers,
//! the signal value types produced by the message decoder, and the error type
//! shared by every operation in the crate.

use chrono::{DateTime, Utc};

/// Timestamp type used throughout the library
pub type Timestamp = DateTime<Utc>;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Raw CAN frame from a log file
///
/// This represents a single CAN frame as read from the log file,
/// before any signal decoding or message interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct CanFrame {
    /// Timestamp in nanoseconds relative to the measurement start
    pub timestamp_ns: u64,
    /// CAN channel number (e.g., 0, 1, 2...)
    pub channel: u8,
    /// CAN message ID (11-bit or 29-bit)
    pub can_id: u32,
    /// Frame data bytes (0-8 bytes for classic CAN, up to 64 for CAN-FD)
    pub data: Vec<u8>,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended: bool,
    /// True if this is an error frame
    pub is_error_frame: bool,
    /// True if this is a remote frame
    pub is_remote_frame: bool,
}

impl CanFrame {
    /// Timestamp in seconds relative to the measurement start
    pub fn relative_seconds(&self) -> f64 {
        self.timestamp_ns as f64 / 1_000_000_000.0
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }
}

/// Errors that can occur while loading, decoding or analysing a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No input files")]
    NoInput,

    #[error("Failed to parse log file: {0}")]
    LogFormat(String),

    #[error("Failed to parse DBC file: {0}")]
    DbcParse(String),

    #[error("Name not found: {0}")]
    NameNotFound(String),

    #[error("Invalid value for signal '{signal}' in frame 0x{can_id:X} at {timestamp:.6}s: {reason}")]
    InvalidSignal {
        signal: String,
        can_id: u32,
        timestamp: f64,
        reason: String,
    },

    #[error("Column '{0}' is not numeric")]
    ColumnType(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// A decoded signal with its current value
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    /// Signal name from the DBC
    pub name: String,
    /// Decoded value
    pub value: SignalValue,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Raw value before scaling (useful for debugging)
    pub raw_value: i64,
}

/// Signal value types supported by the decoder
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    /// Signed integer value
    Integer(i64),
    /// Floating-point value (after scaling/offset)
    Float(f64),
    /// Boolean value (single bit, unscaled)
    Boolean(bool),
}

impl SignalValue {
    /// Convert signal value to f64 for tabulation and statistics
    pub fn as_f64(&self) -> f64 {
        match self {
            SignalValue::Integer(v) => *v as f64,
            SignalValue::Float(v) => *v,
            SignalValue::Boolean(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}
