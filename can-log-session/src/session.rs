//! In-memory log sessions
//!
//! A [`LogSession`] is an ordered list of channel groups sharing one recording
//! start time. Every group owns a master time axis (seconds relative to the
//! session start) and one sample per timestamp for each of its channels. Raw
//! CAN logging and decoded signals use the same representation: raw frames
//! live in the `CAN_DataFrame` group, decoded messages get one group each.
//!
//! Sessions persist to a JSON file with the `.session` extension.

use crate::metadata::offset_time;
use crate::types::{CanFrame, Result, SessionError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Name of the raw CAN logging group
pub const RAW_GROUP: &str = "CAN_DataFrame";
/// Raw CAN logging channel: bus number
pub const BUS_CHANNEL: &str = "CAN_DataFrame.BusChannel";
/// Raw CAN logging channel: identifier without the extended flag
pub const ID_CHANNEL: &str = "CAN_DataFrame.ID";
/// Raw CAN logging channel: 1 for 29-bit identifiers
pub const IDE_CHANNEL: &str = "CAN_DataFrame.IDE";
/// Raw CAN logging channel: data length code
pub const DLC_CHANNEL: &str = "CAN_DataFrame.DLC";
/// Raw CAN logging channel: payload length in bytes
pub const DATA_LENGTH_CHANNEL: &str = "CAN_DataFrame.DataLength";
/// Raw CAN logging channel: payload bytes
pub const DATA_BYTES_CHANNEL: &str = "CAN_DataFrame.DataBytes";

/// File extension of persisted sessions
pub const SESSION_EXTENSION: &str = "session";

const FORMAT_NAME: &str = "can-log-session";
const FORMAT_VERSION: u32 = 1;

/// Session-wide metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHeader {
    /// Absolute recording start; all group timestamps are relative to it
    pub start_time: Timestamp,
    /// Free-form description (source files, tool)
    #[serde(default)]
    pub comment: Option<String>,
}

/// Kind of samples stored in a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Numeric,
    Bytes,
}

/// Sample storage of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Samples {
    /// Physical or raw numeric values
    Numeric(Vec<f64>),
    /// Byte payloads (raw CAN data)
    Bytes(Vec<Vec<u8>>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Numeric(values) => values.len(),
            Samples::Bytes(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> SampleKind {
        match self {
            Samples::Numeric(_) => SampleKind::Numeric,
            Samples::Bytes(_) => SampleKind::Bytes,
        }
    }

    /// Append samples of the same kind, returns false on a kind mismatch
    pub fn append(&mut self, other: &Samples) -> bool {
        match (self, other) {
            (Samples::Numeric(a), Samples::Numeric(b)) => {
                a.extend_from_slice(b);
                true
            }
            (Samples::Bytes(a), Samples::Bytes(b)) => {
                a.extend(b.iter().cloned());
                true
            }
            _ => false,
        }
    }

    /// Numeric view, if this is a numeric channel
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Samples::Numeric(values) => Some(values),
            Samples::Bytes(_) => None,
        }
    }
}

/// One named channel inside a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub samples: Samples,
}

impl Channel {
    pub fn numeric(name: impl Into<String>, unit: Option<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            unit,
            samples: Samples::Numeric(values),
        }
    }
}

/// A set of channels sampled on one master time axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelGroup {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    /// Seconds relative to the session start, non-decreasing
    pub timestamps: Vec<f64>,
    pub channels: Vec<Channel>,
}

impl ChannelGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: None,
            timestamps: Vec::new(),
            channels: Vec::new(),
        }
    }

    /// Number of records (samples per channel)
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    fn validate(&self) -> Result<()> {
        for channel in &self.channels {
            if channel.samples.len() != self.timestamps.len() {
                return Err(SessionError::LogFormat(format!(
                    "Channel '{}' in group '{}' has {} samples for {} timestamps",
                    channel.name,
                    self.name,
                    channel.samples.len(),
                    self.timestamps.len()
                )));
            }
        }
        if let Some(bad) = self.timestamps.iter().find(|t| !t.is_finite()) {
            return Err(SessionError::LogFormat(format!(
                "Group '{}' has a non-finite timestamp {}",
                self.name, bad
            )));
        }
        if self.timestamps.windows(2).any(|w| w[1] < w[0]) {
            return Err(SessionError::LogFormat(format!(
                "Timestamps of group '{}' are not monotonic",
                self.name
            )));
        }
        Ok(())
    }
}

/// A single channel detached from its group
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub name: String,
    pub unit: Option<String>,
    pub timestamps: Vec<f64>,
    pub samples: Samples,
}

/// One or more merged recordings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSession {
    pub header: SessionHeader,
    pub groups: Vec<ChannelGroup>,
}

#[derive(Serialize)]
struct SessionFileOut<'a> {
    format: &'a str,
    version: u32,
    session: &'a LogSession,
}

#[derive(Deserialize)]
struct SessionFileIn {
    format: String,
    version: u32,
    session: LogSession,
}

impl LogSession {
    /// Create an empty session
    pub fn new(start_time: Timestamp) -> Self {
        Self {
            header: SessionHeader {
                start_time,
                comment: None,
            },
            groups: Vec::new(),
        }
    }

    pub fn start_time(&self) -> Timestamp {
        self.header.start_time
    }

    pub fn group(&self, name: &str) -> Option<&ChannelGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// All channel names in group order
    pub fn channel_names(&self) -> Vec<&str> {
        self.groups
            .iter()
            .flat_map(|g| g.channels.iter().map(|c| c.name.as_str()))
            .collect()
    }

    /// First group/channel pair carrying `name`
    pub fn find_channel(&self, name: &str) -> Option<(&ChannelGroup, &Channel)> {
        self.groups
            .iter()
            .find_map(|g| g.channel(name).map(|c| (g, c)))
    }

    /// Detach one channel together with its time axis
    pub fn signal(&self, name: &str) -> Result<Signal> {
        let (group, channel) = self
            .find_channel(name)
            .ok_or_else(|| SessionError::NameNotFound(name.to_string()))?;
        Ok(Signal {
            name: channel.name.clone(),
            unit: channel.unit.clone(),
            timestamps: group.timestamps.clone(),
            samples: channel.samples.clone(),
        })
    }

    /// Keep only the named channels, preserving the group layout
    ///
    /// Names that do not exist are dropped with a warning. Groups left without
    /// channels are removed.
    pub fn filter<S: AsRef<str>>(&self, names: &[S]) -> LogSession {
        let wanted: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        warn_missing(self, names);

        let groups = self
            .groups
            .iter()
            .filter_map(|group| {
                let channels: Vec<Channel> = group
                    .channels
                    .iter()
                    .filter(|c| wanted.contains(c.name.as_str()))
                    .cloned()
                    .collect();
                if channels.is_empty() {
                    return None;
                }
                Some(ChannelGroup {
                    name: group.name.clone(),
                    comment: group.comment.clone(),
                    timestamps: group.timestamps.clone(),
                    channels,
                })
            })
            .collect();

        LogSession {
            header: self.header.clone(),
            groups,
        }
    }

    /// Extract the named channels in request order, one group per channel
    ///
    /// The first occurrence of a name wins. Missing names are dropped with a
    /// warning, as in [`LogSession::filter`].
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> LogSession {
        warn_missing(self, names);

        let mut seen = HashSet::new();
        let groups = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| seen.insert(*n))
            .filter_map(|name| self.find_channel(name))
            .map(|(group, channel)| ChannelGroup {
                name: group.name.clone(),
                comment: group.comment.clone(),
                timestamps: group.timestamps.clone(),
                channels: vec![channel.clone()],
            })
            .collect();

        LogSession {
            header: self.header.clone(),
            groups,
        }
    }

    /// Build the raw `CAN_DataFrame` layout from logged frames
    ///
    /// Error and remote frames carry no payload and are skipped. Frames are
    /// ordered by timestamp.
    pub fn from_frames<I>(start_time: Timestamp, frames: I) -> LogSession
    where
        I: IntoIterator<Item = CanFrame>,
    {
        let mut frames: Vec<CanFrame> = frames
            .into_iter()
            .filter(|f| !f.is_error_frame && !f.is_remote_frame)
            .collect();
        frames.sort_by_key(|f| f.timestamp_ns);

        let mut session = LogSession::new(start_time);
        if frames.is_empty() {
            log::warn!("No data frames found, session is empty");
            return session;
        }

        let mut group = ChannelGroup::new(RAW_GROUP);
        group.timestamps = frames.iter().map(CanFrame::relative_seconds).collect();
        group.channels = vec![
            Channel::numeric(
                BUS_CHANNEL,
                None,
                frames.iter().map(|f| f.channel as f64).collect(),
            ),
            Channel::numeric(
                ID_CHANNEL,
                None,
                frames.iter().map(|f| f.can_id as f64).collect(),
            ),
            Channel::numeric(
                IDE_CHANNEL,
                None,
                frames
                    .iter()
                    .map(|f| if f.is_extended { 1.0 } else { 0.0 })
                    .collect(),
            ),
            Channel::numeric(
                DLC_CHANNEL,
                None,
                frames.iter().map(|f| length_to_dlc(f.dlc()) as f64).collect(),
            ),
            Channel::numeric(
                DATA_LENGTH_CHANNEL,
                None,
                frames.iter().map(|f| f.dlc() as f64).collect(),
            ),
            Channel {
                name: DATA_BYTES_CHANNEL.to_string(),
                unit: None,
                samples: Samples::Bytes(frames.into_iter().map(|f| f.data).collect()),
            },
        ];

        log::debug!("Built raw group with {} frames", group.len());
        session.groups.push(group);
        session
    }

    /// Check the group invariants (sample counts, finite monotonic time
    /// that stays within the calendar range from the start time)
    pub fn validate(&self) -> Result<()> {
        for group in &self.groups {
            group.validate()?;
            let ends = group.timestamps.first().into_iter().chain(group.timestamps.last());
            for &t in ends {
                if offset_time(self.start_time(), t).is_none() {
                    return Err(SessionError::LogFormat(format!(
                        "Timestamp {} of group '{}' is outside the calendar range",
                        t, group.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Persist the session, overwriting any existing file
    ///
    /// A path without extension gets `.session` appended. Returns the path
    /// actually written.
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        let path = with_session_extension(path);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer(
            &mut writer,
            &SessionFileOut {
                format: FORMAT_NAME,
                version: FORMAT_VERSION,
                session: self,
            },
        )?;
        writer.flush()?;

        log::info!(
            "Saved session with {} groups to {:?}",
            self.groups.len(),
            path
        );
        Ok(path)
    }

    /// Load a persisted session
    pub fn load(path: &Path) -> Result<LogSession> {
        log::info!("Loading session file: {:?}", path);

        let file = File::open(path).map_err(|e| {
            SessionError::LogFormat(format!("Failed to open session file {:?}: {}", path, e))
        })?;

        let parsed: SessionFileIn =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                SessionError::LogFormat(format!("Failed to parse session file {:?}: {}", path, e))
            })?;

        if parsed.format != FORMAT_NAME || parsed.version != FORMAT_VERSION {
            return Err(SessionError::LogFormat(format!(
                "Unsupported session file {:?}: {} v{}",
                path, parsed.format, parsed.version
            )));
        }

        parsed.session.validate()?;
        Ok(parsed.session)
    }
}

fn warn_missing<S: AsRef<str>>(session: &LogSession, names: &[S]) {
    for name in names.iter().map(|n| n.as_ref()) {
        if session.find_channel(name).is_none() {
            log::warn!("Channel '{}' not found in session, skipping", name);
        }
    }
}

fn with_session_extension(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(SESSION_EXTENSION)
    }
}

/// CAN-FD payload length to data length code
fn length_to_dlc(length: usize) -> u8 {
    match length {
        0..=8 => length as u8,
        9..=12 => 9,
        13..=16 => 10,
        17..=20 => 11,
        21..=24 => 12,
        25..=32 => 13,
        33..=48 => 14,
        _ => 15,
    }
}
