//! Log file formats
//!
//! Vector BLF recordings are read through the `ablf` crate and turned into the
//! raw `CAN_DataFrame` layout. Sessions written by [`LogSession::save`] are
//! read back directly.

use crate::session::{LogSession, SESSION_EXTENSION};
use crate::types::{Result, SessionError};
use std::path::Path;

pub mod blf;

pub use blf::{BlfFrameIterator, BlfParser};

/// Load any supported log file into a session
///
/// The format is chosen from the file extension (case-insensitive).
pub fn load_log_file(path: &Path) -> Result<LogSession> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());

    match extension.as_deref() {
        Some("blf") => {
            log::debug!("Detected BLF file format");
            let frames = BlfParser::parse(path)?;
            let start_time = frames.start_time();
            let frames = frames.collect::<Result<Vec<_>>>()?;
            let mut session = LogSession::from_frames(start_time, frames);
            session.header.comment = Some(format!("Converted from {}", path.display()));
            Ok(session)
        }
        Some(ext) if ext == SESSION_EXTENSION => {
            log::debug!("Detected session file format");
            LogSession::load(path)
        }
        _ => Err(SessionError::LogFormat(format!(
            "Unsupported file format: {:?}",
            path
        ))),
    }
}
