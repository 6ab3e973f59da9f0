//! Signal database and DBC parser
//!
//! This module contains the DBC parser and the database that merges the
//! definitions of one or more DBC files.

pub mod database;
pub mod dbc;

// Re-export key types for convenience
pub use database::{
    j1939_pgn, ByteOrder, DatabaseStats, MessageDefinition, MultiplexerInfo, SignalDatabase,
    SignalDefinition, ValueType,
};
