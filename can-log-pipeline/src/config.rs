//! Configuration loading and parsing
//!
//! Every section and field is optional; the defaults reproduce the reference
//! J1939 run (engine speed against wheel-based vehicle speed).

use anyhow::{bail, Context, Result};
use can_log_session::{Comparison, DecodeOptions, ExportOptions, ValuePredicate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub signals: SignalsConfig,
    pub decode: DecodeOptions,
    pub export: ExportConfig,
    pub analysis: AnalysisConfig,
    pub report: ReportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            output: OutputConfig::default(),
            signals: SignalsConfig::default(),
            decode: DecodeOptions::new().with_ignore_invalid_signals(true),
            export: ExportConfig::default(),
            analysis: AnalysisConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub dir: PathBuf,
    pub log_extension: String,
    pub dbc_extension: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("input"),
            log_extension: "blf".to_string(),
            dbc_extension: "dbc".to_string(),
        }
    }
}

/// Output directory and file stems (extensions are added per format)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub concatenated: String,
    pub filtered: String,
    pub scaled: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            concatenated: "concatenated".to_string(),
            filtered: "filtered".to_string(),
            scaled: "scaled".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn stem(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalsConfig {
    /// Signals to decode and analyse; the first one is the analysed column
    pub names: Vec<String>,
    /// Raw channels kept by the structural filter
    pub filter_channels: Vec<String>,
    /// Channel whose first sample marks the split start
    pub split_channel: String,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            names: vec![
                "EngineSpeed".to_string(),
                "WheelBasedVehicleSpeed".to_string(),
            ],
            filter_channels: vec![
                "CAN_DataFrame.ID".to_string(),
                "CAN_DataFrame.DataBytes".to_string(),
            ],
            split_channel: "CAN_DataFrame.BusChannel".to_string(),
        }
    }
}

/// A section given in the file replaces the default options as a whole
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub concatenated: ExportOptions,
    pub scaled: ExportOptions,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            concatenated: ExportOptions::new().with_time_as_date(true),
            scaled: ExportOptions::new()
                .with_time_as_date(true)
                .with_single_time_base(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub ratio_column: String,
    pub time_start: String,
    pub time_end: String,
    pub predicate: ValuePredicate,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ratio_column: "ratio".to_string(),
            time_start: "2020-01-13 13:58:35".to_string(),
            time_end: "2020-01-13 13:59:56".to_string(),
            predicate: ValuePredicate::new(Comparison::Gt, 640.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Alert when max - min of the analysed column exceeds this
    pub max_spread: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { max_spread: 300.0 }
    }
}

impl AppConfig {
    fn validate(&self) -> Result<()> {
        if self.signals.names.len() < 2 {
            bail!(
                "At least two signals are required for the ratio column, got {:?}",
                self.signals.names
            );
        }
        Ok(())
    }

    /// Signal analysed by statistics and the alert
    pub fn primary_signal(&self) -> &str {
        &self.signals.names[0]
    }

    /// Divisor of the ratio column
    pub fn secondary_signal(&self) -> &str {
        &self.signals.names[1]
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .validate()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}
