//! Message Decoding Engine
//!
//! Extracts signal values from raw CAN payloads based on signal definitions
//! from the signal database. Handles bit extraction, endianness, multiplexing,
//! physical value conversion and range validation.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use crate::types::{DecodedSignal, SignalValue};

/// Signals decoded from one payload
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Active multiplexer value (if message is multiplexed)
    pub multiplexer_value: Option<u64>,
    /// Outcome of every applicable signal, in definition order
    pub signals: Vec<Result<DecodedSignal, InvalidRecord>>,
}

impl DecodedMessage {
    /// At least one signal decoded and validated
    pub fn has_valid_signal(&self) -> bool {
        self.signals.iter().any(Result::is_ok)
    }

    pub fn invalid_signals(&self) -> impl Iterator<Item = &InvalidRecord> {
        self.signals.iter().filter_map(|s| s.as_ref().err())
    }
}

/// Why a payload failed validation
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRecord {
    pub signal: String,
    pub reason: String,
}

/// Message decoder - extracts signals from CAN payloads
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode every applicable signal of a message
    ///
    /// For multiplexed messages only the signals belonging to the active
    /// multiplexer value are returned. Each signal is validated on its own;
    /// the whole record only fails when the multiplexer cannot be read.
    pub fn decode_message(
        data: &[u8],
        message_def: &MessageDefinition,
    ) -> Result<DecodedMessage, InvalidRecord> {
        let mut multiplexer_value: Option<u64> = None;

        if message_def.is_multiplexed {
            if let Some(mux_signal) = message_def
                .multiplexer_signal
                .as_deref()
                .and_then(|name| message_def.signal(name))
            {
                let raw = Self::extract_signal_value(data, mux_signal).ok_or_else(|| {
                    Self::too_short(mux_signal, data.len())
                })?;
                multiplexer_value = Some(raw as u64);
            }
        }

        let mut signals = Vec::with_capacity(message_def.signals.len());
        for signal in &message_def.signals {
            if let Some(ref mux_info) = signal.multiplexer_info {
                match multiplexer_value {
                    Some(current) if mux_info.multiplexer_values.contains(&current) => {}
                    _ => continue,
                }
            }
            signals.push(Self::decode_signal(data, signal));
        }

        Ok(DecodedMessage {
            multiplexer_value,
            signals,
        })
    }

    /// Decode and validate a single signal
    pub fn decode_signal(data: &[u8], signal: &SignalDefinition) -> Result<DecodedSignal, InvalidRecord> {
        let raw_value = Self::extract_signal_value(data, signal)
            .ok_or_else(|| Self::too_short(signal, data.len()))?;

        // Apply physical value conversion (factor and offset)
        let physical_value = signal.offset + signal.factor * (raw_value as f64);

        if signal.has_range() && !within(physical_value, signal.min, signal.max) {
            return Err(InvalidRecord {
                signal: signal.name.clone(),
                reason: format!(
                    "value {} outside [{}, {}]",
                    physical_value, signal.min, signal.max
                ),
            });
        }

        let value = if signal.factor == 1.0 && signal.offset == 0.0 && signal.length == 1 {
            SignalValue::Boolean(raw_value != 0)
        } else if signal.factor != 1.0 || signal.offset != 0.0 {
            SignalValue::Float(physical_value)
        } else {
            SignalValue::Integer(raw_value)
        };

        Ok(DecodedSignal {
            name: signal.name.clone(),
            value,
            unit: signal.unit.clone(),
            raw_value,
        })
    }

    fn too_short(signal: &SignalDefinition, available: usize) -> InvalidRecord {
        InvalidRecord {
            signal: signal.name.clone(),
            reason: format!(
                "{} bits at bit {} do not fit in {} payload bytes",
                signal.length, signal.start_bit, available
            ),
        }
    }

    /// Extract raw signal value from CAN payload data
    ///
    /// Returns `None` when the signal does not fit in the payload.
    fn extract_signal_value(data: &[u8], signal: &SignalDefinition) -> Option<i64> {
        let start_bit = signal.start_bit as usize;
        let length = signal.length as usize;

        let raw_value = match signal.byte_order {
            ByteOrder::LittleEndian => Self::extract_little_endian(data, start_bit, length)?,
            ByteOrder::BigEndian => Self::extract_big_endian(data, start_bit, length)?,
        };

        let signed_value = match signal.value_type {
            ValueType::Unsigned => raw_value as i64,
            ValueType::Signed => Self::sign_extend(raw_value, length),
        };

        Some(signed_value)
    }

    /// Extract signal with little-endian (Intel) byte order
    ///
    /// The start bit points to the LSB; bits are numbered from LSB to MSB
    /// within each byte, byte 0 first.
    fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
        let required_bytes = (start_bit + length + 7) / 8;
        if required_bytes > data.len() {
            return None;
        }

        let mut result: u64 = 0;
        for i in 0..length {
            let bit_pos = start_bit + i;
            let bit_value = (data[bit_pos / 8] >> (bit_pos % 8)) & 0x01;
            result |= (bit_value as u64) << i;
        }

        Some(result)
    }

    /// Extract signal with big-endian (Motorola) byte order
    ///
    /// DBC numbering: the start bit is the MSB, given as `byte * 8 + bit` with
    /// bit 0 the LSB of a byte. Walking towards the LSB goes down within a byte
    /// and continues at bit 7 of the next byte.
    fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
        let mut result: u64 = 0;
        let mut pos = start_bit;

        for i in 0..length {
            let byte_idx = pos / 8;
            if byte_idx >= data.len() {
                return None;
            }
            let bit_value = (data[byte_idx] >> (pos % 8)) & 0x01;
            result = (result << 1) | bit_value as u64;

            if i + 1 < length {
                if pos % 8 == 0 {
                    pos += 15;
                } else {
                    pos -= 1;
                }
            }
        }

        Some(result)
    }

    /// Sign-extend a value from N bits to 64 bits
    fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length == 0 || bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}

/// Range check with a small relative tolerance for scaled values
fn within(value: f64, min: f64, max: f64) -> bool {
    let tolerance = 1e-9 * (1.0 + min.abs().max(max.abs()));
    value >= min - tolerance && value <= max + tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::database::MultiplexerInfo;

    fn signal(name: &str, start_bit: u16, length: u16, byte_order: ByteOrder) -> SignalDefinition {
        SignalDefinition {
            name: name.to_string(),
            start_bit,
            length,
            byte_order,
            value_type: ValueType::Unsigned,
            factor: 1.0,
            offset: 0.0,
            min: 0.0,
            max: 0.0,
            unit: None,
            multiplexer_info: None,
        }
    }

    fn message(signals: Vec<SignalDefinition>, mux: Option<&str>) -> MessageDefinition {
        MessageDefinition {
            id: 0x200,
            is_extended: false,
            name: "Test".to_string(),
            size: 8,
            sender: None,
            signals,
            is_multiplexed: mux.is_some(),
            multiplexer_signal: mux.map(str::to_string),
            source: "test.dbc".to_string(),
        }
    }

    #[test]
    fn test_extract_little_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(MessageDecoder::extract_little_endian(&data, 0, 8), Some(0xAB));
    }

    #[test]
    fn test_extract_little_endian_cross_byte() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(MessageDecoder::extract_little_endian(&data, 0, 16), Some(0xCDAB));
        assert_eq!(MessageDecoder::extract_little_endian(&data, 4, 8), Some(0xDA));
    }

    #[test]
    fn test_extract_little_endian_out_of_range() {
        let data = vec![0xAB];
        assert_eq!(MessageDecoder::extract_little_endian(&data, 4, 8), None);
    }

    #[test]
    fn test_extract_big_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(MessageDecoder::extract_big_endian(&data, 7, 8), Some(0xAB));
    }

    #[test]
    fn test_extract_big_endian_cross_byte() {
        let data = vec![0x12, 0x34];
        assert_eq!(MessageDecoder::extract_big_endian(&data, 7, 16), Some(0x1234));

        // Nibble of byte 0 followed by all of byte 1
        let data = vec![0xAB, 0xCD];
        assert_eq!(MessageDecoder::extract_big_endian(&data, 3, 12), Some(0xBCD));
        assert_eq!(MessageDecoder::extract_big_endian(&data, 3, 4), Some(0xB));
    }

    #[test]
    fn test_extract_big_endian_out_of_range() {
        let data = vec![0xAB];
        assert_eq!(MessageDecoder::extract_big_endian(&data, 7, 16), None);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(MessageDecoder::sign_extend(0x7F, 8), 127);
        assert_eq!(MessageDecoder::sign_extend(0xFF, 8), -1);
        assert_eq!(MessageDecoder::sign_extend(0x8000, 16), -32768);
    }

    #[test]
    fn test_decode_scaled_signal() {
        let mut speed = signal("EngineSpeed", 24, 16, ByteOrder::LittleEndian);
        speed.factor = 0.125;
        speed.max = 8031.875;

        // 0x1450 * 0.125 = 650 rpm
        let data = [0, 0, 0, 0x50, 0x14, 0, 0, 0];
        let decoded = MessageDecoder::decode_signal(&data, &speed).unwrap();
        assert_eq!(decoded.value, SignalValue::Float(650.0));
        assert_eq!(decoded.raw_value, 0x1450);
    }

    #[test]
    fn test_decode_rejects_out_of_range() {
        let mut speed = signal("EngineSpeed", 24, 16, ByteOrder::LittleEndian);
        speed.factor = 0.125;
        speed.max = 8031.875;

        // 0xFFFF is the J1939 "not available" pattern
        let data = [0, 0, 0, 0xFF, 0xFF, 0, 0, 0];
        let err = MessageDecoder::decode_signal(&data, &speed).unwrap_err();
        assert_eq!(err.signal, "EngineSpeed");
    }

    #[test]
    fn test_decode_rejects_short_payload() {
        let speed = signal("EngineSpeed", 24, 16, ByteOrder::LittleEndian);
        assert!(MessageDecoder::decode_signal(&[0, 0, 0], &speed).is_err());
    }

    #[test]
    fn test_decode_multiplexed_message() {
        let mode = signal("Mode", 0, 8, ByteOrder::LittleEndian);
        let mut a = signal("SignalA", 8, 8, ByteOrder::LittleEndian);
        a.multiplexer_info = Some(MultiplexerInfo {
            multiplexer_signal: "Mode".to_string(),
            multiplexer_values: vec![0],
        });
        let mut b = signal("SignalB", 8, 8, ByteOrder::LittleEndian);
        b.multiplexer_info = Some(MultiplexerInfo {
            multiplexer_signal: "Mode".to_string(),
            multiplexer_values: vec![1],
        });
        let msg = message(vec![mode, a, b], Some("Mode"));

        let decoded = MessageDecoder::decode_message(&[1, 42], &msg).unwrap();
        assert_eq!(decoded.multiplexer_value, Some(1));
        let signals: Vec<&DecodedSignal> = decoded.signals.iter().flatten().collect();
        let names: Vec<&str> = signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Mode", "SignalB"]);
        assert_eq!(signals[1].value, SignalValue::Integer(42));
    }

    #[test]
    fn test_invalid_signal_keeps_the_others() {
        let mut speed = signal("EngineSpeed", 24, 16, ByteOrder::LittleEndian);
        speed.factor = 0.125;
        speed.max = 8031.875;
        let mut torque = signal("ActualEnginePercentTorque", 16, 8, ByteOrder::LittleEndian);
        torque.offset = -125.0;
        torque.min = -125.0;
        torque.max = 125.0;
        let msg = message(vec![torque, speed], None);

        // Torque byte 0xFF is "not available" (130 %), speed is 650 rpm
        let decoded = MessageDecoder::decode_message(&[0, 0, 0xFF, 0x50, 0x14, 0, 0, 0], &msg).unwrap();

        assert!(decoded.has_valid_signal());
        let invalid: Vec<&str> = decoded.invalid_signals().map(|i| i.signal.as_str()).collect();
        assert_eq!(invalid, vec!["ActualEnginePercentTorque"]);
        let speed = decoded.signals[1].as_ref().unwrap();
        assert_eq!(speed.value, SignalValue::Float(650.0));
    }

    #[test]
    fn test_unreadable_multiplexer_fails_record() {
        let mode = signal("Mode", 8, 8, ByteOrder::LittleEndian);
        let msg = message(vec![mode], Some("Mode"));
        let err = MessageDecoder::decode_message(&[1], &msg).unwrap_err();
        assert_eq!(err.signal, "Mode");
    }

    #[test]
    fn test_boolean_signal() {
        let flag = signal("Flag", 3, 1, ByteOrder::LittleEndian);
        let decoded = MessageDecoder::decode_signal(&[0x08], &flag).unwrap();
        assert_eq!(decoded.value, SignalValue::Boolean(true));
    }
}
