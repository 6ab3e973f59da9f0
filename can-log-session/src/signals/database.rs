//! Unified signal database
//!
//! Combines message definitions from multiple DBC files into a single
//! queryable database.

use std::collections::HashMap;

/// A complete CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN message ID (without the DBC extended flag)
    pub id: u32,
    /// True if the DBC declares a 29-bit ID
    pub is_extended: bool,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// Sender ECU name (optional)
    pub sender: Option<String>,
    /// All signals in this message
    pub signals: Vec<SignalDefinition>,
    /// True if this message has multiplexed signals
    pub is_multiplexed: bool,
    /// Multiplexer signal name (if multiplexed)
    pub multiplexer_signal: Option<String>,
    /// Source file (DBC filename)
    pub source: String,
}

impl MessageDefinition {
    /// J1939 parameter group number, for extended messages
    pub fn pgn(&self) -> Option<u32> {
        self.is_extended.then(|| j1939_pgn(self.id))
    }

    pub fn signal(&self, name: &str) -> Option<&SignalDefinition> {
        self.signals.iter().find(|s| s.name == name)
    }
}

/// A CAN signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit in the CAN frame (DBC numbering)
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    /// Byte order
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value
    pub min: f64,
    /// Maximum physical value
    pub max: f64,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Multiplexer info (None if not multiplexed)
    pub multiplexer_info: Option<MultiplexerInfo>,
}

impl SignalDefinition {
    /// Whether the DBC declares a usable physical range
    pub fn has_range(&self) -> bool {
        self.max > self.min
    }
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Multiplexer information for multiplexed signals
#[derive(Debug, Clone)]
pub struct MultiplexerInfo {
    /// Name of the multiplexer signal that controls this signal
    pub multiplexer_signal: String,
    /// Multiplexer value(s) for which this signal is active
    pub multiplexer_values: Vec<u64>,
}

/// J1939 parameter group number of a 29-bit identifier
///
/// PDU1 messages (PF < 240) carry a destination address in the PS byte, which
/// is not part of the PGN.
pub fn j1939_pgn(can_id: u32) -> u32 {
    let pgn = (can_id >> 8) & 0x3_FFFF;
    let pdu_format = (pgn >> 8) & 0xFF;
    if pdu_format < 240 {
        pgn & 0x3_FF00
    } else {
        pgn
    }
}

/// The unified signal database
pub struct SignalDatabase {
    /// Message definitions by CAN ID; the first definition of an ID wins
    messages: HashMap<u32, MessageDefinition>,

    /// Extended messages by J1939 PGN
    pgn_lookup: HashMap<u32, u32>,

    /// Signal name lookup
    /// Key: Signal name, Value: CAN IDs of the messages carrying it, in load order
    signal_lookup: HashMap<String, Vec<u32>>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
            pgn_lookup: HashMap::new(),
            signal_lookup: HashMap::new(),
        }
    }

    /// Add a message definition to the database
    pub fn add_message(&mut self, message: MessageDefinition) {
        let can_id = message.id;

        if let Some(existing) = self.messages.get(&can_id) {
            log::warn!(
                "Message 0x{:X} '{}' from {} already defined by {}, ignoring",
                can_id,
                message.name,
                message.source,
                existing.source
            );
            return;
        }

        for signal in &message.signals {
            self.signal_lookup
                .entry(signal.name.clone())
                .or_default()
                .push(can_id);
        }

        if let Some(pgn) = message.pgn() {
            self.pgn_lookup.entry(pgn).or_insert(can_id);
        }

        self.messages.insert(can_id, message);
    }

    /// Get a message definition by exact CAN ID
    pub fn get_message(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&can_id)
    }

    /// Find the definition for a logged frame
    ///
    /// Exact ID matches win. Extended frames without an exact match fall back
    /// to J1939 PGN matching, so one definition covers every source address.
    pub fn lookup_frame(&self, can_id: u32, is_extended: bool) -> Option<&MessageDefinition> {
        if let Some(message) = self.messages.get(&can_id) {
            if message.is_extended == is_extended {
                return Some(message);
            }
        }
        if !is_extended {
            return None;
        }
        self.pgn_lookup
            .get(&j1939_pgn(can_id))
            .and_then(|id| self.messages.get(id))
    }

    /// Find all messages containing a specific signal name
    pub fn find_signal(&self, signal_name: &str) -> Vec<(&MessageDefinition, &SignalDefinition)> {
        self.signal_lookup
            .get(signal_name)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.messages.get(id))
                    .filter_map(|msg| msg.signal(signal_name).map(|sig| (msg, sig)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.values().map(|msg| msg.signals.len()).sum(),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}

impl Default for SignalDatabase {
    fn default() -> Self {
        Self::new()
    }
}
