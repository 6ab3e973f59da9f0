//! Main decoder API
//!
//! The [`Decoder`] owns the signal database loaded from DBC files and turns
//! raw `CAN_DataFrame` sessions into sessions of physical signal values.

use crate::config::DecodeOptions;
use crate::message_decoder::{InvalidRecord, MessageDecoder};
use crate::session::{
    Channel, ChannelGroup, LogSession, Samples, Signal, DATA_BYTES_CHANNEL, ID_CHANNEL,
    IDE_CHANNEL, RAW_GROUP,
};
use crate::signals::{MessageDefinition, SignalDatabase};
use crate::types::{DecodedSignal, Result, SessionError};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Highest 11-bit identifier
const MAX_STANDARD_ID: u32 = 0x7FF;

/// The main decoder struct - entry point for all decoding operations
pub struct Decoder {
    /// Internal signal database (loaded from DBC files)
    signal_db: SignalDatabase,
}

impl Decoder {
    /// Create a new decoder instance
    pub fn new() -> Self {
        Self {
            signal_db: SignalDatabase::new(),
        }
    }

    /// Load a DBC file and add its definitions to the signal database
    ///
    /// Can be called repeatedly; for IDs defined by several files the first
    /// loaded definition wins.
    ///
    /// # Example
    /// ```no_run
    /// use can_log_session::Decoder;
    /// use std::path::Path;
    ///
    /// let mut decoder = Decoder::new();
    /// decoder.add_dbc(Path::new("powertrain.dbc")).unwrap();
    /// ```
    pub fn add_dbc(&mut self, path: &Path) -> Result<()> {
        log::info!("Loading DBC file: {:?}", path);

        let messages = crate::signals::dbc::parse_dbc_file(path)?;
        for message in messages {
            self.signal_db.add_message(message);
        }

        log::info!("DBC file loaded successfully: {:?}", path);
        Ok(())
    }

    /// Decode the raw CAN logging of a session into physical signals
    ///
    /// Each DBC message becomes one channel group; multiplexed messages get
    /// one group per multiplexer value. Frames without a definition are
    /// skipped. A signal failing validation aborts the decode, unless
    /// `ignore_invalid_signals` is set: then that sample becomes NaN and the
    /// other signals of the record are kept. Records with no valid signal are
    /// dropped.
    pub fn extract_can_logging(
        &self,
        session: &LogSession,
        options: &DecodeOptions,
    ) -> Result<LogSession> {
        let raw = RawFrames::from_session(session)?;
        log::info!("Decoding {} raw frames", raw.len());

        let mut groups: Vec<GroupBuilder> = Vec::new();
        let mut group_index: HashMap<(u32, Option<u64>), usize> = HashMap::new();
        let mut unknown_ids: HashSet<u32> = HashSet::new();
        let mut invalid_values = 0usize;
        let mut dropped_records = 0usize;

        for i in 0..raw.len() {
            let (timestamp, can_id, is_extended, data) = raw.record(i);

            let Some(message_def) = self.signal_db.lookup_frame(can_id, is_extended) else {
                if unknown_ids.insert(can_id) {
                    log::trace!("Unknown CAN ID: 0x{:X}, skipping", can_id);
                }
                continue;
            };

            let decoded = match MessageDecoder::decode_message(data, message_def) {
                Ok(decoded) => decoded,
                Err(invalid) if options.ignore_invalid_signals => {
                    log::trace!(
                        "Dropping record of 0x{:X} at {:.6}s: {} {}",
                        can_id,
                        timestamp,
                        invalid.signal,
                        invalid.reason
                    );
                    dropped_records += 1;
                    continue;
                }
                Err(invalid) => {
                    return Err(SessionError::InvalidSignal {
                        signal: invalid.signal,
                        can_id,
                        timestamp,
                        reason: invalid.reason,
                    });
                }
            };

            if let Some(invalid) = decoded.invalid_signals().next() {
                if !options.ignore_invalid_signals {
                    return Err(SessionError::InvalidSignal {
                        signal: invalid.signal.clone(),
                        can_id,
                        timestamp,
                        reason: invalid.reason.clone(),
                    });
                }
            }
            for invalid in decoded.invalid_signals() {
                log::trace!(
                    "Invalid {} of 0x{:X} at {:.6}s: {}",
                    invalid.signal,
                    can_id,
                    timestamp,
                    invalid.reason
                );
            }

            // Nothing usable in this record
            if !decoded.has_valid_signal() {
                dropped_records += 1;
                continue;
            }
            invalid_values += decoded.invalid_signals().count();

            let key = (message_def.id, decoded.multiplexer_value);
            let idx = *group_index.entry(key).or_insert_with(|| {
                log::debug!("Decoding message: {} (ID 0x{:X})", message_def.name, message_def.id);
                groups.push(GroupBuilder::new(
                    message_def,
                    decoded.multiplexer_value,
                    &decoded.signals,
                ));
                groups.len() - 1
            });
            groups[idx].push(timestamp, &decoded.signals);
        }

        if invalid_values > 0 || dropped_records > 0 {
            log::warn!(
                "Replaced {} invalid values with NaN, dropped {} records without valid signals",
                invalid_values,
                dropped_records
            );
        }
        if !unknown_ids.is_empty() {
            log::info!("{} CAN IDs had no definition", unknown_ids.len());
        }

        let mut decoded = LogSession::new(session.start_time());
        decoded.header.comment = Some("Decoded from raw CAN logging".to_string());
        decoded.groups = groups.into_iter().map(GroupBuilder::finish).collect();

        log::info!("Decoded {} message groups", decoded.groups.len());
        Ok(decoded)
    }

    /// Decode a single signal straight from the raw CAN logging
    ///
    /// Only frames whose definition carries `name` are decoded. Samples that
    /// fail validation are skipped.
    pub fn get_can_signal(&self, session: &LogSession, name: &str) -> Result<Signal> {
        let candidates = self.signal_db.find_signal(name);
        let (_, first_def) = candidates
            .first()
            .ok_or_else(|| SessionError::NameNotFound(name.to_string()))?;
        let unit = first_def.unit.clone();
        let carrier_ids: HashSet<u32> = candidates.iter().map(|(msg, _)| msg.id).collect();

        let raw = RawFrames::from_session(session)?;
        let mut timestamps = Vec::new();
        let mut values = Vec::new();
        let mut skipped = 0usize;

        for i in 0..raw.len() {
            let (timestamp, can_id, is_extended, data) = raw.record(i);

            let Some(message_def) = self
                .signal_db
                .lookup_frame(can_id, is_extended)
                .filter(|m| carrier_ids.contains(&m.id))
            else {
                continue;
            };
            let Some(signal_def) = message_def.signal(name) else {
                continue;
            };

            if let Some(ref mux_info) = signal_def.multiplexer_info {
                let active = message_def
                    .signal(&mux_info.multiplexer_signal)
                    .and_then(|mux| MessageDecoder::decode_signal(data, mux).ok())
                    .map(|mux| mux_info.multiplexer_values.contains(&(mux.raw_value as u64)))
                    .unwrap_or(false);
                if !active {
                    continue;
                }
            }

            match MessageDecoder::decode_signal(data, signal_def) {
                Ok(decoded) => {
                    timestamps.push(timestamp);
                    values.push(decoded.value.as_f64());
                }
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {} invalid samples of '{}'", skipped, name);
        }
        log::info!("Extracted {} samples of '{}'", values.len(), name);

        Ok(Signal {
            name: name.to_string(),
            unit,
            timestamps,
            samples: Samples::Numeric(values),
        })
    }

    /// Get statistics about the loaded signal database
    pub fn database_stats(&self) -> DatabaseStats {
        self.signal_db.stats()
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of the raw `CAN_DataFrame` group
struct RawFrames<'a> {
    timestamps: &'a [f64],
    ids: &'a [f64],
    ide: Option<&'a [f64]>,
    data: &'a [Vec<u8>],
}

impl<'a> RawFrames<'a> {
    fn from_session(session: &'a LogSession) -> Result<Self> {
        let group = session
            .group(RAW_GROUP)
            .ok_or_else(|| SessionError::NameNotFound(RAW_GROUP.to_string()))?;

        let ids = numeric_channel(group, ID_CHANNEL)?;
        let ide = match group.channel(IDE_CHANNEL) {
            Some(_) => Some(numeric_channel(group, IDE_CHANNEL)?),
            None => None,
        };
        let data = match group.channel(DATA_BYTES_CHANNEL).map(|c| &c.samples) {
            Some(Samples::Bytes(data)) => data.as_slice(),
            Some(_) => {
                return Err(SessionError::LogFormat(format!(
                    "Channel '{}' does not hold byte payloads",
                    DATA_BYTES_CHANNEL
                )))
            }
            None => return Err(SessionError::NameNotFound(DATA_BYTES_CHANNEL.to_string())),
        };

        Ok(Self {
            timestamps: &group.timestamps,
            ids,
            ide,
            data,
        })
    }

    fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// (timestamp, CAN ID, extended flag, payload) of record `i`
    fn record(&self, i: usize) -> (f64, u32, bool, &'a [u8]) {
        let can_id = self.ids[i] as u32;
        let is_extended = match self.ide {
            Some(ide) => ide[i] != 0.0,
            None => can_id > MAX_STANDARD_ID,
        };
        (self.timestamps[i], can_id, is_extended, &self.data[i])
    }
}

fn numeric_channel<'a>(group: &'a ChannelGroup, name: &str) -> Result<&'a [f64]> {
    let channel = group
        .channel(name)
        .ok_or_else(|| SessionError::NameNotFound(name.to_string()))?;
    channel.samples.as_numeric().ok_or_else(|| {
        SessionError::LogFormat(format!("Channel '{}' is not numeric", name))
    })
}

type SignalOutcome = std::result::Result<DecodedSignal, InvalidRecord>;

/// Accumulates the records of one message (and multiplexer value)
struct GroupBuilder {
    name: String,
    comment: String,
    timestamps: Vec<f64>,
    channels: Vec<(String, Option<String>, Vec<f64>)>,
}

impl GroupBuilder {
    fn new(message: &MessageDefinition, mux: Option<u64>, signals: &[SignalOutcome]) -> Self {
        let name = match mux {
            Some(value) => format!("{}_mux{}", message.name, value),
            None => message.name.clone(),
        };
        Self {
            name,
            comment: format!("CAN ID 0x{:X} from {}", message.id, message.source),
            timestamps: Vec::new(),
            channels: signals
                .iter()
                .map(|outcome| match outcome {
                    Ok(signal) => (signal.name.clone(), signal.unit.clone(), Vec::new()),
                    Err(invalid) => (
                        invalid.signal.clone(),
                        message.signal(&invalid.signal).and_then(|s| s.unit.clone()),
                        Vec::new(),
                    ),
                })
                .collect(),
        }
    }

    fn push(&mut self, timestamp: f64, signals: &[SignalOutcome]) {
        self.timestamps.push(timestamp);
        for ((_, _, values), outcome) in self.channels.iter_mut().zip(signals) {
            values.push(match outcome {
                Ok(signal) => signal.value.as_f64(),
                Err(_) => f64::NAN,
            });
        }
    }

    fn finish(self) -> ChannelGroup {
        ChannelGroup {
            name: self.name,
            comment: Some(self.comment),
            timestamps: self.timestamps,
            channels: self
                .channels
                .into_iter()
                .map(|(name, unit, values)| Channel::numeric(name, unit, values))
                .collect(),
        }
    }
}

// Re-export DatabaseStats for public API
pub use crate::signals::DatabaseStats;
