//! BLF (Binary Log Format) file parser
//!
//! Parses Vector BLF files using the `ablf` crate.
//!
//! ## Supported Object Types
//! - Type 86 (CanMessage2): CAN 2.0 messages
//! - Type 10 (LogContainer): Automatically decompressed by ablf
//!
//! Every other object type is skipped. Object timestamps are relative to the
//! measurement start stored in the file statistics block.

use crate::types::{CanFrame, Result, SessionError, Timestamp};
use ablf::{BlfFile, ObjectTypes};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Bit 31 of a BLF CAN identifier marks a 29-bit ID
const EXTENDED_ID_FLAG: u32 = 0x8000_0000;
/// Remote transmission request flag of a CanMessage2 object
const RTR_FLAG: u8 = 0x80;

/// BLF file parser using ablf crate
pub struct BlfParser;

impl BlfParser {
    /// Parse a BLF file and return an iterator over CAN frames
    ///
    /// Opens the BLF file and validates its structure.
    pub fn parse(path: &Path) -> Result<BlfFrameIterator> {
        log::info!("Parsing BLF file: {:?}", path);

        if !path.exists() {
            return Err(SessionError::LogFormat(format!(
                "BLF file not found: {:?}",
                path
            )));
        }

        // Open file with buffered reading
        let file = File::open(path).map_err(|e| {
            SessionError::LogFormat(format!("Failed to open BLF file {:?}: {}", path, e))
        })?;

        let reader = BufReader::new(file);

        // Parse BLF file structure
        let blf = BlfFile::from_reader(reader).map_err(|(e, _)| {
            SessionError::LogFormat(format!("Failed to parse BLF file {:?}: {}", path, e))
        })?;

        if !blf.is_valid() {
            return Err(SessionError::LogFormat(format!(
                "Invalid BLF file format: {:?}",
                path
            )));
        }

        let start_time = systemtime_to_utc(&blf.file_stats.measurement_start).unwrap_or_else(|| {
            log::warn!("BLF file {:?} has no measurement start time, using epoch", path);
            DateTime::<Utc>::UNIX_EPOCH
        });

        log::info!("BLF file opened, measurement start {}", start_time);

        Ok(BlfFrameIterator {
            objects: blf.into_iter(),
            start_time,
            skipped_types: HashSet::new(),
        })
    }
}

/// Convert a Windows SYSTEMTIME (year, month, weekday, day, h, m, s, ms)
fn systemtime_to_utc(st: &[u16; 8]) -> Option<Timestamp> {
    NaiveDate::from_ymd_opt(st[0] as i32, st[1] as u32, st[3] as u32)
        .and_then(|d| d.and_hms_milli_opt(st[4] as u32, st[5] as u32, st[6] as u32, st[7] as u32))
        .map(|naive| naive.and_utc())
}

/// Iterator over CAN frames from a BLF file
pub struct BlfFrameIterator {
    objects: ablf::ObjectIterator<BufReader<File>>,
    start_time: Timestamp,
    skipped_types: HashSet<u32>,
}

impl BlfFrameIterator {
    /// Measurement start of the recording
    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }
}

impl Iterator for BlfFrameIterator {
    type Item = Result<CanFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let obj = self.objects.next()?;
            match obj.data {
                ObjectTypes::CanMessage86(msg) => {
                    return Some(Ok(CanFrame {
                        timestamp_ns: msg.header.timestamp_ns,
                        channel: msg.channel as u8,
                        can_id: msg.id & !EXTENDED_ID_FLAG,
                        data: msg.data,
                        is_extended: (msg.id & EXTENDED_ID_FLAG) != 0,
                        is_error_frame: false,
                        is_remote_frame: (msg.flags & RTR_FLAG) != 0,
                    }));
                }
                _ => {
                    let obj_type = obj.object_type;
                    if self.skipped_types.insert(obj_type) {
                        log::debug!(
                            "Skipping BLF object type {} (size {} bytes)",
                            obj_type,
                            obj.object_size
                        );
                    }
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_blf_file_not_found() {
        let result = BlfParser::parse(Path::new("nonexistent.blf"));
        assert!(matches!(result, Err(SessionError::LogFormat(_))));
    }

    #[test]
    fn test_blf_garbage_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.blf");
        std::fs::write(&path, b"definitely not a blf file").unwrap();

        assert!(BlfParser::parse(&path).is_err());
    }

    #[test]
    fn test_systemtime_conversion() {
        let st = [2020, 1, 1, 13, 13, 58, 35, 250];
        let ts = systemtime_to_utc(&st).unwrap();
        assert_eq!(
            ts,
            Utc.with_ymd_and_hms(2020, 1, 13, 13, 58, 35).unwrap()
                + chrono::Duration::milliseconds(250)
        );

        assert!(systemtime_to_utc(&[0; 8]).is_none());
    }
}
