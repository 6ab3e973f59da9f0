//! Option types for decoding and exporting sessions
//!
//! The library only needs a handful of switches. Everything that belongs to a
//! particular run (directories, file names, signal lists) lives in the
//! application layer.

use serde::{Deserialize, Serialize};

/// Options for applying a signal database to a raw session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Drop records that fail validation instead of aborting the decode
    #[serde(default)]
    pub ignore_invalid_signals: bool,
}

impl DecodeOptions {
    /// Create decode options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: drop invalid records instead of failing
    pub fn with_ignore_invalid_signals(mut self, enabled: bool) -> Self {
        self.ignore_invalid_signals = enabled;
        self
    }
}

/// Options for delimited text export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Render the time column as absolute calendar time instead of seconds
    #[serde(default)]
    pub time_as_date: bool,

    /// Rebase relative seconds so the first exported row is at zero
    #[serde(default)]
    pub time_from_zero: bool,

    /// Write all groups into one file on a shared time axis
    #[serde(default)]
    pub single_time_base: bool,

    /// Field delimiter (default: ',')
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            time_as_date: false,
            time_from_zero: false,
            single_time_base: false,
            delimiter: default_delimiter(),
        }
    }
}

impl ExportOptions {
    /// Create export options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: render timestamps as calendar time
    pub fn with_time_as_date(mut self, enabled: bool) -> Self {
        self.time_as_date = enabled;
        self
    }

    /// Builder method: rebase relative time to zero
    pub fn with_time_from_zero(mut self, enabled: bool) -> Self {
        self.time_from_zero = enabled;
        self
    }

    /// Builder method: resample all groups onto one time axis
    pub fn with_single_time_base(mut self, enabled: bool) -> Self {
        self.single_time_base = enabled;
        self
    }

    /// Builder method: set the field delimiter
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_options_builder() {
        let options = ExportOptions::new()
            .with_time_as_date(true)
            .with_single_time_base(true)
            .with_delimiter(';');

        assert!(options.time_as_date);
        assert!(!options.time_from_zero);
        assert!(options.single_time_base);
        assert_eq!(options.delimiter, ';');
    }

    #[test]
    fn test_defaults() {
        let decode = DecodeOptions::new();
        assert!(!decode.ignore_invalid_signals);

        let export = ExportOptions::default();
        assert_eq!(export.delimiter, ',');
        assert!(!export.time_as_date);
    }

    #[test]
    fn test_decode_options_builder() {
        let decode = DecodeOptions::new().with_ignore_invalid_signals(true);
        assert!(decode.ignore_invalid_signals);
    }
}
