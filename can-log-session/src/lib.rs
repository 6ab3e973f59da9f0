//! CAN Log Session Library
//!
//! Loads CAN bus recordings into time-aligned sessions and turns them into
//! physical signal tables.
//!
//! # Architecture
//!
//! - Log files (BLF, or sessions saved by this crate) become a [`LogSession`]
//!   with the raw `CAN_DataFrame` layout
//! - Recordings are concatenated, filtered and persisted as sessions
//! - DBC databases decode raw frames into per-message signal groups
//! - Sessions become [`Table`]s for arithmetic, time slicing and row filters
//! - Summary statistics feed a [`ReportHook`], e.g. [`SpreadAlert`] which
//!   writes a plot when a column's range is too wide
//!
//! Everything is synchronous and every operation returns a new value.
//!
//! # Example Usage
//!
//! ```no_run
//! use can_log_session::{concatenate, discover_files, DecodeOptions, Decoder, Table};
//! use std::path::Path;
//!
//! let logs = discover_files(Path::new("input"), "blf").unwrap();
//! let session = concatenate(&logs).unwrap();
//!
//! let mut decoder = Decoder::new();
//! decoder.add_dbc(Path::new("input/j1939.dbc")).unwrap();
//! let decoded = decoder
//!     .extract_can_logging(&session, &DecodeOptions::new().with_ignore_invalid_signals(true))
//!     .unwrap();
//!
//! let table = Table::from_session(&decoded.select(&["EngineSpeed"]), true);
//! println!("{}", table.summary("EngineSpeed").unwrap());
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod discover;
pub mod export;
pub mod formats;
pub mod merge;
pub mod metadata;
pub mod plot;
pub mod report;
pub mod session;
pub mod signals;
pub mod stats;
pub mod table;
pub mod types;

// Internal modules (not exposed in public API)
mod message_decoder;

// Re-export main types for convenience
pub use config::{DecodeOptions, ExportOptions};
pub use decoder::{DatabaseStats, Decoder};
pub use discover::discover_files;
pub use export::{export_csv, read_csv};
pub use formats::load_log_file;
pub use merge::{concatenate, concatenate_sessions};
pub use report::{ReportHook, ReportOutcome, SpreadAlert};
pub use session::{Channel, ChannelGroup, LogSession, Samples, SessionHeader, Signal};
pub use stats::SummaryStats;
pub use table::{BinaryOp, Column, ColumnData, Comparison, IndexKind, Table, ValuePredicate};
pub use types::{CanFrame, DecodedSignal, Result, SessionError, SignalValue, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
