//! DBC file parser
//!
//! Parses Vector DBC files and converts them into our internal signal database format.

use crate::signals::database::{
    ByteOrder, MessageDefinition, MultiplexerInfo, SignalDefinition, ValueType,
};
use crate::types::{Result, SessionError};
use std::path::Path;

/// Bit 31 of a DBC message ID marks a 29-bit identifier
const DBC_EXTENDED_FLAG: u32 = 0x8000_0000;

/// Pseudo message holding signals not assigned to any frame
const INDEPENDENT_SIGNALS_MESSAGE: &str = "VECTOR__INDEPENDENT_SIG_MSG";

/// Parse a DBC file and return message definitions
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    // Read the DBC file as bytes first (handle non-UTF8 encodings)
    let bytes = std::fs::read(path).map_err(|e| {
        SessionError::DbcParse(format!("Failed to read file {:?}: {}", path, e))
    })?;

    // Fall back to Latin-1 (compatible with Windows-1252) when not UTF-8
    let dbc_content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    // Parse using can-dbc crate
    let dbc = can_dbc::DBC::from_slice(dbc_content.as_bytes()).map_err(|e| {
        SessionError::DbcParse(format!("Failed to parse DBC file {:?}: {:?}", path, e))
    })?;

    let source_filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc")
        .to_string();

    let mut messages = Vec::new();

    for dbc_msg in dbc.messages() {
        if dbc_msg.message_name() == INDEPENDENT_SIGNALS_MESSAGE {
            continue;
        }
        messages.push(convert_message(dbc_msg, &source_filename)?);
    }

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(dbc_msg: &can_dbc::Message, source: &str) -> Result<MessageDefinition> {
    let mut signals = Vec::new();
    let mut is_multiplexed = false;
    let mut multiplexer_signal_name: Option<String> = None;

    // First pass: identify multiplexer signal
    for dbc_sig in dbc_msg.signals() {
        if let can_dbc::MultiplexIndicator::Multiplexor = dbc_sig.multiplexer_indicator() {
            is_multiplexed = true;
            multiplexer_signal_name = Some(dbc_sig.name().to_string());
            break;
        } else if matches!(
            dbc_sig.multiplexer_indicator(),
            can_dbc::MultiplexIndicator::MultiplexedSignal(_)
        ) {
            is_multiplexed = true;
        }
    }

    // Second pass: convert all signals
    for dbc_sig in dbc_msg.signals() {
        let signal = convert_signal(dbc_sig, multiplexer_signal_name.as_deref())?;
        signals.push(signal);
    }

    let raw_id = dbc_msg.message_id().0;

    Ok(MessageDefinition {
        id: raw_id & !DBC_EXTENDED_FLAG,
        is_extended: (raw_id & DBC_EXTENDED_FLAG) != 0,
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        sender: match dbc_msg.transmitter() {
            can_dbc::Transmitter::NodeName(name) => Some(name.to_string()),
            _ => None,
        },
        signals,
        is_multiplexed,
        multiplexer_signal: multiplexer_signal_name,
        source: source.to_string(),
    })
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(
    dbc_sig: &can_dbc::Signal,
    multiplexer_signal_name: Option<&str>,
) -> Result<SignalDefinition> {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let multiplexer_info = match *dbc_sig.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::MultiplexedSignal(switch_value) => Some(MultiplexerInfo {
            multiplexer_signal: multiplexer_signal_name
                .ok_or_else(|| {
                    SessionError::DbcParse(format!(
                        "Multiplexed signal '{}' but no multiplexer found",
                        dbc_sig.name()
                    ))
                })?
                .to_string(),
            multiplexer_values: vec![switch_value],
        }),
        _ => None,
    };

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length: *dbc_sig.signal_size() as u16,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: *dbc_sig.min(),
        max: *dbc_sig.max(),
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
        multiplexer_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_dbc(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_simple_dbc() {
        let dbc_content = r#"
VERSION ""

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_

BS_:

BU_: ECU1 ECU2

BO_ 291 EngineData: 8 ECU1
 SG_ EngineSpeed : 0|16@1+ (1,0) [0|8000] "rpm" ECU2
 SG_ EngineTemp : 16|8@1+ (1,-40) [-40|215] "C" ECU2

BO_ 512 BatteryStatus: 8 ECU1
 SG_ BatteryVoltage : 0|16@1+ (0.01,0) [0|16] "V" ECU2
"#;

        let temp_file = write_dbc(dbc_content);
        let messages = parse_dbc_file(temp_file.path()).unwrap();

        assert_eq!(messages.len(), 2);

        let msg1 = &messages[0];
        assert_eq!(msg1.id, 291);
        assert!(!msg1.is_extended);
        assert_eq!(msg1.name, "EngineData");
        assert_eq!(msg1.size, 8);
        assert_eq!(msg1.sender, Some("ECU1".to_string()));
        assert_eq!(msg1.signals.len(), 2);

        let sig1 = &msg1.signals[0];
        assert_eq!(sig1.name, "EngineSpeed");
        assert_eq!(sig1.start_bit, 0);
        assert_eq!(sig1.length, 16);
        assert_eq!(sig1.factor, 1.0);
        assert_eq!(sig1.offset, 0.0);
        assert_eq!(sig1.unit, Some("rpm".to_string()));

        let temp = &msg1.signals[1];
        assert_eq!(temp.offset, -40.0);
        assert_eq!(temp.min, -40.0);
        assert_eq!(temp.max, 215.0);
    }

    #[test]
    fn test_parse_extended_ids() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: Vector__XXX

BO_ 2364540158 EEC1: 8 Vector__XXX
 SG_ EngineSpeed : 24|16@1+ (0.125,0) [0|8031.875] "rpm" Vector__XXX
"#;

        let temp_file = write_dbc(dbc_content);
        let messages = parse_dbc_file(temp_file.path()).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 0x0CF0_04FE);
        assert!(messages[0].is_extended);
        assert_eq!(messages[0].pgn(), Some(0xF004));
    }

    #[test]
    fn test_parse_multiplexed_signals() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: ECU1

BO_ 512 MultiplexedMsg: 8 ECU1
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" ECU1
 SG_ SignalA m0 : 8|16@1+ (1,0) [0|100] "%" ECU1
 SG_ SignalB m1 : 8|16@1+ (0.1,0) [0|1000] "mV" ECU1
"#;

        let temp_file = write_dbc(dbc_content);
        let messages = parse_dbc_file(temp_file.path()).unwrap();

        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert!(msg.is_multiplexed);
        assert_eq!(msg.multiplexer_signal, Some("Mode".to_string()));
        assert_eq!(msg.signals.len(), 3);

        let sig_a = msg.signals.iter().find(|s| s.name == "SignalA").unwrap();
        assert_eq!(
            sig_a.multiplexer_info.as_ref().unwrap().multiplexer_signal,
            "Mode"
        );
        assert_eq!(sig_a.multiplexer_info.as_ref().unwrap().multiplexer_values, vec![0]);
    }

    #[test]
    fn test_missing_dbc_file() {
        let result = parse_dbc_file(Path::new("does-not-exist.dbc"));
        assert!(matches!(result, Err(SessionError::DbcParse(_))));
    }
}
